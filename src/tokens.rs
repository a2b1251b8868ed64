use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Maximum length of a single normalized path token
const MAX_TOKEN_LEN: usize = 64;

/// Decompose Unicode text and strip combining diacritical marks
pub fn remove_accents(input: &str) -> String {
    input.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Normalize a string into a single safe path segment
///
/// Runs of path separators become `-`, runs of any other character outside
/// `[A-Za-z0-9._-]` become `_`, and the result is capped at 64 characters.
pub fn safe_folder_token(input: &str) -> String {
    let stripped = remove_accents(input);

    // Collapse runs of separators first so "a//b" and "a/b" agree
    let mut collapsed = String::with_capacity(stripped.len());
    let mut in_separator = false;
    for c in stripped.chars() {
        if c == '/' || c == '\\' {
            if !in_separator {
                collapsed.push('-');
                in_separator = true;
            }
        } else {
            collapsed.push(c);
            in_separator = false;
        }
    }

    let mut token = String::with_capacity(collapsed.len());
    let mut in_invalid = false;
    for c in collapsed.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            token.push(c);
            in_invalid = false;
        } else if !in_invalid {
            token.push('_');
            in_invalid = true;
        }
    }

    token.truncate(MAX_TOKEN_LEN);
    token
}

/// Concatenated capitalized words derived from a user name
///
/// Splits on runs of non-alphanumerics after accent removal, capitalizes each
/// word, and joins with no separator. Falls back to `User` when nothing
/// alphanumeric survives. Distinct raw names may normalize identically.
pub fn user_initials_token(name: &str) -> String {
    let stripped = remove_accents(name);
    let words: Vec<&str> = stripped
        .trim()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    if words.is_empty() {
        return "User".to_string();
    }

    let mut token = String::new();
    for word in words {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            token.push(first.to_ascii_uppercase());
            token.push_str(&chars.as_str().to_ascii_lowercase());
        }
    }

    token.truncate(MAX_TOKEN_LEN);
    token
}

/// Uppercased alphanumeric-only task token, `TASK` when empty after stripping
pub fn task_token(task: &str) -> String {
    let stripped = remove_accents(task);
    let mut token: String = stripped
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if token.is_empty() {
        return "TASK".to_string();
    }

    token.truncate(MAX_TOKEN_LEN);
    token
}
