use crate::tokens::{safe_folder_token, task_token, user_initials_token};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Zero-pad width for the checklist order index segment
pub const DEFAULT_ORDER_PAD_WIDTH: usize = 3;

/// Errors raised while validating identity fields or media slots
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("orderIndex must be a positive integer")]
    InvalidOrderIndex,

    #[error("Invalid phase: {0}")]
    InvalidPhase(String),

    #[error("Invalid kind: {0}")]
    InvalidKind(String),

    #[error("{0} index is required (>0)")]
    MissingMediaIndex(MediaKind),

    #[error("plans required")]
    EmptyPlan,

    #[error("Duplicate object key in batch: {0}")]
    DuplicateKey(String),
}

/// Checklist phase a media artifact belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Pre,
    Doing,
    Post,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Pre => "pre",
            Phase::Doing => "doing",
            Phase::Post => "post",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre" => Ok(Phase::Pre),
            "doing" => Ok(Phase::Doing),
            "post" => Ok(Phase::Post),
            other => Err(ValidationError::InvalidPhase(other.to_string())),
        }
    }
}

/// Kind of media artifact stored under a checklist phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
    Note,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Note => "note",
        }
    }

    /// File extension used by the key filename templates
    pub fn extension(&self) -> &'static str {
        match self {
            MediaKind::Photo => "jpg",
            MediaKind::Video => "mp4",
            MediaKind::Note => "txt",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "photo" => Ok(MediaKind::Photo),
            "video" => Ok(MediaKind::Video),
            "note" => Ok(MediaKind::Note),
            other => Err(ValidationError::InvalidKind(other.to_string())),
        }
    }
}

/// Identifies a unit of work within a project, performed by a named user,
/// at a given sequence position. Supplied per request, never persisted.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskIdentity {
    pub project_id: String,
    pub user_name: String,
    pub order_index: i64,
    pub task_name: String,
}

/// Build the deterministic base path for a task identity
///
/// Layout: `project/<projectToken>/OM/<userToken>/checklist/<idx>_<TASKTOKEN>`.
/// Pure function of the identity; identical inputs always yield identical
/// output.
pub fn build_base_path(identity: &TaskIdentity) -> Result<String, ValidationError> {
    build_base_path_padded(identity, DEFAULT_ORDER_PAD_WIDTH)
}

/// `build_base_path` with a configurable order-index pad width
pub fn build_base_path_padded(
    identity: &TaskIdentity,
    pad_width: usize,
) -> Result<String, ValidationError> {
    if identity.project_id.trim().is_empty() {
        return Err(ValidationError::MissingField("projectId"));
    }
    if identity.user_name.trim().is_empty() {
        return Err(ValidationError::MissingField("userName"));
    }
    if identity.task_name.trim().is_empty() {
        return Err(ValidationError::MissingField("taskName"));
    }
    if identity.order_index < 1 || identity.order_index > i64::from(u32::MAX) {
        return Err(ValidationError::InvalidOrderIndex);
    }

    let project = safe_folder_token(&identity.project_id);
    let user = user_initials_token(&identity.user_name);
    let task = task_token(&identity.task_name);

    Ok(format!(
        "project/{}/OM/{}/checklist/{:0width$}_{}",
        project,
        user,
        identity.order_index,
        task,
        width = pad_width
    ))
}

/// Build the object key for one media slot under a base path
///
/// Photo and video keys carry a 2-digit zero-padded index; a note is a
/// singleton per phase and ignores the index entirely.
pub fn build_object_key(
    base: &str,
    phase: Phase,
    kind: MediaKind,
    index: Option<u32>,
) -> Result<String, ValidationError> {
    match kind {
        MediaKind::Photo | MediaKind::Video => {
            let index = index
                .filter(|i| *i > 0)
                .ok_or(ValidationError::MissingMediaIndex(kind))?;
            Ok(format!(
                "{}/{}/{}_{:02}.{}",
                base,
                phase.as_str(),
                kind.as_str(),
                index,
                kind.extension()
            ))
        }
        MediaKind::Note => Ok(format!("{}/{}/note.txt", base, phase.as_str())),
    }
}

/// Components recovered from a well-formed object key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedArtifact {
    pub base: String,
    pub phase: Phase,
    pub kind: MediaKind,
    pub index: Option<u32>,
}

/// Parse an object key back into its phase, kind and index
///
/// Inverse of `build_object_key` for indices up to 99; wider indices break
/// the 2-digit filename template and are rejected.
pub fn parse_object_key(key: &str) -> Option<ParsedArtifact> {
    let (rest, filename) = key.rsplit_once('/')?;
    let (base, phase_str) = rest.rsplit_once('/')?;
    let phase = Phase::from_str(phase_str).ok()?;

    if filename == "note.txt" {
        return Some(ParsedArtifact {
            base: base.to_string(),
            phase,
            kind: MediaKind::Note,
            index: None,
        });
    }

    let (stem, extension) = filename.rsplit_once('.')?;
    let (kind_str, index_str) = stem.rsplit_once('_')?;
    let kind = MediaKind::from_str(kind_str).ok()?;
    if kind == MediaKind::Note || extension != kind.extension() {
        return None;
    }
    if index_str.len() != 2 || !index_str.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let index: u32 = index_str.parse().ok()?;
    if index == 0 {
        return None;
    }

    Some(ParsedArtifact {
        base: base.to_string(),
        phase,
        kind,
        index: Some(index),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> TaskIdentity {
        TaskIdentity {
            project_id: "Alpha".to_string(),
            user_name: "Anh Nguyen".to_string(),
            order_index: 2,
            task_name: "Kiem Tra".to_string(),
        }
    }

    #[test]
    fn test_build_base_path_layout() {
        let base = build_base_path(&identity()).unwrap();
        assert_eq!(base, "project/Alpha/OM/AnhNguyen/checklist/002_KIEMTRA");
    }

    #[test]
    fn test_build_base_path_deterministic() {
        let a = build_base_path(&identity()).unwrap();
        let b = build_base_path(&identity()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_build_base_path_pad_width() {
        let base = build_base_path_padded(&identity(), 5).unwrap();
        assert!(base.ends_with("/checklist/00002_KIEMTRA"));
    }

    #[test]
    fn test_build_base_path_rejects_bad_order_index() {
        let mut bad = identity();
        bad.order_index = 0;
        assert_eq!(
            build_base_path(&bad),
            Err(ValidationError::InvalidOrderIndex)
        );

        bad.order_index = -3;
        assert_eq!(
            build_base_path(&bad),
            Err(ValidationError::InvalidOrderIndex)
        );
    }

    #[test]
    fn test_build_base_path_rejects_empty_fields() {
        let mut bad = identity();
        bad.project_id = String::new();
        assert_eq!(
            build_base_path(&bad),
            Err(ValidationError::MissingField("projectId"))
        );

        let mut bad = identity();
        bad.user_name = String::new();
        assert_eq!(
            build_base_path(&bad),
            Err(ValidationError::MissingField("userName"))
        );

        let mut bad = identity();
        bad.task_name = String::new();
        assert_eq!(
            build_base_path(&bad),
            Err(ValidationError::MissingField("taskName"))
        );
    }

    #[test]
    fn test_build_object_key_photo() {
        let key = build_object_key("base", Phase::Pre, MediaKind::Photo, Some(1)).unwrap();
        assert_eq!(key, "base/pre/photo_01.jpg");
    }

    #[test]
    fn test_build_object_key_video() {
        let key = build_object_key("base", Phase::Post, MediaKind::Video, Some(12)).unwrap();
        assert_eq!(key, "base/post/video_12.mp4");
    }

    #[test]
    fn test_build_object_key_note_ignores_index() {
        let with_index = build_object_key("base", Phase::Doing, MediaKind::Note, Some(7)).unwrap();
        let without = build_object_key("base", Phase::Doing, MediaKind::Note, None).unwrap();
        assert_eq!(with_index, "base/doing/note.txt");
        assert_eq!(with_index, without);
    }

    #[test]
    fn test_build_object_key_requires_media_index() {
        assert_eq!(
            build_object_key("base", Phase::Pre, MediaKind::Photo, None),
            Err(ValidationError::MissingMediaIndex(MediaKind::Photo))
        );
        assert_eq!(
            build_object_key("base", Phase::Pre, MediaKind::Video, Some(0)),
            Err(ValidationError::MissingMediaIndex(MediaKind::Video))
        );
    }

    #[test]
    fn test_phase_and_kind_parsing() {
        assert_eq!("pre".parse::<Phase>().unwrap(), Phase::Pre);
        assert_eq!("note".parse::<MediaKind>().unwrap(), MediaKind::Note);
        assert_eq!(
            "unknown".parse::<Phase>(),
            Err(ValidationError::InvalidPhase("unknown".to_string()))
        );
        assert_eq!(
            "audio".parse::<MediaKind>(),
            Err(ValidationError::InvalidKind("audio".to_string()))
        );
    }

    #[test]
    fn test_parse_object_key_round_trip() {
        let base = build_base_path(&identity()).unwrap();
        for (phase, kind, index) in [
            (Phase::Pre, MediaKind::Photo, Some(1)),
            (Phase::Doing, MediaKind::Video, Some(99)),
            (Phase::Post, MediaKind::Note, None),
        ] {
            let key = build_object_key(&base, phase, kind, index).unwrap();
            let parsed = parse_object_key(&key).unwrap();
            assert_eq!(parsed.base, base);
            assert_eq!(parsed.phase, phase);
            assert_eq!(parsed.kind, kind);
            assert_eq!(parsed.index, index);
        }
    }

    #[test]
    fn test_parse_object_key_rejects_malformed() {
        assert!(parse_object_key("no-slashes").is_none());
        assert!(parse_object_key("base/unknown/photo_01.jpg").is_none());
        assert!(parse_object_key("base/pre/photo_00.jpg").is_none());
        assert!(parse_object_key("base/pre/photo_1.jpg").is_none());
        assert!(parse_object_key("base/pre/photo_01.mp4").is_none());
        assert!(parse_object_key("base/pre/audio_01.jpg").is_none());
    }
}
