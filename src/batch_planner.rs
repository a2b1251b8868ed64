use crate::object_keys::{
    build_base_path, build_object_key, MediaKind, Phase, TaskIdentity, ValidationError,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

/// One requested storage slot as it arrives on the wire
///
/// `kind` and `phase` stay as raw strings here so invalid values surface as
/// a descriptive validation error rather than a deserialization failure.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanRequestEntry {
    pub kind: String,
    pub phase: String,
    /// Explicit slot index; absent or non-positive means auto-assign
    #[serde(default)]
    pub index: Option<i64>,
}

/// A planned artifact with its resolved slot index and object key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedArtifact {
    pub kind: MediaKind,
    pub phase: Phase,
    pub index: Option<u32>,
    pub key: String,
}

/// Resolve every plan entry to a concrete object key, in input order
///
/// Photo/video entries without a usable explicit index draw the next value
/// from a per-`(phase, kind)` counter scoped to this call. Explicit indices
/// are used verbatim and do not seed the counter; any resulting key collision
/// aborts the whole batch. The first validation failure aborts with no
/// partial results.
pub fn plan_keys(
    identity: &TaskIdentity,
    plans: &[PlanRequestEntry],
) -> Result<Vec<PlannedArtifact>, ValidationError> {
    if plans.is_empty() {
        return Err(ValidationError::EmptyPlan);
    }

    let base = build_base_path(identity)?;

    let mut counters: HashMap<(Phase, MediaKind), u32> = HashMap::new();
    let mut seen_keys: HashSet<String> = HashSet::new();
    let mut results = Vec::with_capacity(plans.len());

    for entry in plans {
        let kind = MediaKind::from_str(&entry.kind)?;
        let phase = Phase::from_str(&entry.phase)?;

        let index = match kind {
            MediaKind::Photo | MediaKind::Video => {
                Some(resolve_index(&mut counters, phase, kind, entry.index))
            }
            MediaKind::Note => None,
        };

        let key = build_object_key(&base, phase, kind, index)?;
        if !seen_keys.insert(key.clone()) {
            return Err(ValidationError::DuplicateKey(key));
        }

        results.push(PlannedArtifact {
            kind,
            phase,
            index,
            key,
        });
    }

    Ok(results)
}

fn resolve_index(
    counters: &mut HashMap<(Phase, MediaKind), u32>,
    phase: Phase,
    kind: MediaKind,
    explicit: Option<i64>,
) -> u32 {
    if let Some(index) = explicit {
        if index > 0 && index <= i64::from(u32::MAX) {
            return index as u32;
        }
    }

    let slot = counters.entry((phase, kind)).or_insert(0);
    *slot += 1;
    *slot
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

    fn entry(kind: &str, phase: &str, index: Option<i64>) -> PlanRequestEntry {
        PlanRequestEntry {
            kind: kind.to_string(),
            phase: phase.to_string(),
            index,
        }
    }

    #[test]
    fn test_plan_keys_auto_assigns_in_order() {
        let plans = vec![
            entry("photo", "pre", None),
            entry("photo", "pre", None),
            entry("note", "pre", None),
        ];
        let results = plan_keys(&identity(), &plans).unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(
            results[0].key,
            "project/Alpha/OM/AnhNguyen/checklist/002_KIEMTRA/pre/photo_01.jpg"
        );
        assert_eq!(
            results[1].key,
            "project/Alpha/OM/AnhNguyen/checklist/002_KIEMTRA/pre/photo_02.jpg"
        );
        assert_eq!(
            results[2].key,
            "project/Alpha/OM/AnhNguyen/checklist/002_KIEMTRA/pre/note.txt"
        );
        assert_eq!(results[0].index, Some(1));
        assert_eq!(results[1].index, Some(2));
        assert_eq!(results[2].index, None);
    }

    #[test]
    fn test_plan_keys_counters_are_per_phase_and_kind() {
        let plans = vec![
            entry("photo", "pre", None),
            entry("video", "pre", None),
            entry("photo", "post", None),
            entry("photo", "pre", None),
        ];
        let results = plan_keys(&identity(), &plans).unwrap();

        assert_eq!(results[0].index, Some(1)); // pre/photo
        assert_eq!(results[1].index, Some(1)); // pre/video
        assert_eq!(results[2].index, Some(1)); // post/photo
        assert_eq!(results[3].index, Some(2)); // pre/photo again
    }

    #[test]
    fn test_plan_keys_explicit_index_used_verbatim() {
        let plans = vec![entry("photo", "doing", Some(7))];
        let results = plan_keys(&identity(), &plans).unwrap();
        assert_eq!(results[0].index, Some(7));
        assert!(results[0].key.ends_with("/doing/photo_07.jpg"));
    }

    #[test]
    fn test_plan_keys_non_positive_explicit_index_auto_assigns() {
        let plans = vec![
            entry("photo", "pre", Some(0)),
            entry("photo", "pre", Some(-4)),
        ];
        let results = plan_keys(&identity(), &plans).unwrap();
        assert_eq!(results[0].index, Some(1));
        assert_eq!(results[1].index, Some(2));
    }

    #[test]
    fn test_plan_keys_explicit_index_does_not_seed_counter() {
        // Explicit 2 first, then auto-assignment starts at 1 regardless
        let plans = vec![
            entry("photo", "pre", Some(2)),
            entry("photo", "pre", None),
        ];
        let results = plan_keys(&identity(), &plans).unwrap();
        assert_eq!(results[0].index, Some(2));
        assert_eq!(results[1].index, Some(1));
    }

    #[test]
    fn test_plan_keys_rejects_colliding_keys() {
        // Explicit 1 collides with the first auto-assigned slot
        let plans = vec![
            entry("photo", "pre", Some(1)),
            entry("photo", "pre", None),
        ];
        let err = plan_keys(&identity(), &plans).unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateKey(_)));
    }

    #[test]
    fn test_plan_keys_rejects_duplicate_notes() {
        let plans = vec![entry("note", "pre", None), entry("note", "pre", None)];
        let err = plan_keys(&identity(), &plans).unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateKey(_)));
    }

    #[test]
    fn test_plan_keys_rejects_empty_plans() {
        assert_eq!(
            plan_keys(&identity(), &[]),
            Err(ValidationError::EmptyPlan)
        );
    }

    #[test]
    fn test_plan_keys_rejects_invalid_enum_values() {
        let err = plan_keys(&identity(), &[entry("audio", "pre", None)]).unwrap_err();
        assert_eq!(err, ValidationError::InvalidKind("audio".to_string()));

        let err = plan_keys(&identity(), &[entry("photo", "later", None)]).unwrap_err();
        assert_eq!(err, ValidationError::InvalidPhase("later".to_string()));
    }

    #[test]
    fn test_plan_keys_propagates_identity_validation() {
        let mut bad = identity();
        bad.order_index = 0;
        let err = plan_keys(&bad, &[entry("photo", "pre", None)]).unwrap_err();
        assert_eq!(err, ValidationError::InvalidOrderIndex);
    }
}
