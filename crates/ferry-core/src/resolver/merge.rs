//! Field-level three-way merge

use serde_json::{Map, Value};
use std::collections::BTreeSet;
use thiserror::Error;

/// Why a three-way merge could not produce a value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeConflict {
    /// No common ancestor to compare against
    #[error("no common ancestor to merge against")]
    MissingBase,
    /// Both sides changed the same top-level key differently
    #[error("both sides changed field `{0}`")]
    Field(String),
    /// Non-object values changed differently on both sides
    #[error("both sides changed the value")]
    Value,
}

/// Merge `local` and `remote` against their common ancestor `base`.
///
/// Objects merge key by key over the keys present in either side: a key left
/// unchanged on one side takes the other side's value (including removal), and
/// identical changes collapse. Any key changed differently on both sides fails
/// the whole merge. Non-object values merge as a single field.
pub fn three_way_merge(
    base: Option<&Value>,
    local: &Value,
    remote: &Value,
) -> Result<Value, MergeConflict> {
    let base = base.ok_or(MergeConflict::MissingBase)?;

    match (local, remote) {
        (Value::Object(local_fields), Value::Object(remote_fields)) => {
            let empty = Map::new();
            let base_fields = base.as_object().unwrap_or(&empty);
            merge_fields(base_fields, local_fields, remote_fields).map(Value::Object)
        }
        _ => merge_slot(Some(base), Some(local), Some(remote))
            .map(|merged| merged.cloned().unwrap_or(Value::Null))
            .ok_or(MergeConflict::Value),
    }
}

fn merge_fields(
    base: &Map<String, Value>,
    local: &Map<String, Value>,
    remote: &Map<String, Value>,
) -> Result<Map<String, Value>, MergeConflict> {
    let keys: BTreeSet<&String> = local.keys().chain(remote.keys()).collect();

    let mut merged = Map::new();
    for key in keys {
        let picked = merge_slot(base.get(key), local.get(key), remote.get(key))
            .ok_or_else(|| MergeConflict::Field(key.clone()))?;
        if let Some(value) = picked {
            merged.insert(key.clone(), value.clone());
        }
    }
    Ok(merged)
}

/// Outer `None` means both sides diverged; inner `None` means the key is absent.
#[allow(clippy::option_option)]
fn merge_slot<'v>(
    base: Option<&'v Value>,
    local: Option<&'v Value>,
    remote: Option<&'v Value>,
) -> Option<Option<&'v Value>> {
    if local == remote {
        Some(local)
    } else if local == base {
        Some(remote)
    } else if remote == base {
        Some(local)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn non_overlapping_changes_merge() {
        let merged = three_way_merge(
            Some(&json!({"a": 1, "b": 1})),
            &json!({"a": 2, "b": 1}),
            &json!({"a": 1, "b": 2}),
        )
        .unwrap();
        assert_eq!(merged, json!({"a": 2, "b": 2}));
    }

    #[test]
    fn divergent_change_is_unresolved() {
        let result = three_way_merge(Some(&json!({"a": 1})), &json!({"a": 2}), &json!({"a": 3}));
        assert_eq!(result, Err(MergeConflict::Field("a".to_string())));
    }

    #[test]
    fn identical_change_collapses() {
        let merged = three_way_merge(
            Some(&json!({"a": 1, "b": 0})),
            &json!({"a": 5, "b": 0}),
            &json!({"a": 5, "b": 0}),
        )
        .unwrap();
        assert_eq!(merged, json!({"a": 5, "b": 0}));
    }

    #[test]
    fn added_keys_from_both_sides_are_kept() {
        let merged = three_way_merge(
            Some(&json!({"a": 1})),
            &json!({"a": 1, "x": true}),
            &json!({"a": 1, "y": false}),
        )
        .unwrap();
        assert_eq!(merged, json!({"a": 1, "x": true, "y": false}));
    }

    #[test]
    fn removal_on_one_side_applies_when_other_unchanged() {
        let merged = three_way_merge(
            Some(&json!({"a": 1, "b": 1})),
            &json!({"a": 1}),
            &json!({"a": 1, "b": 1}),
        )
        .unwrap();
        assert_eq!(merged, json!({"a": 1}));
    }

    #[test]
    fn removal_against_modification_is_unresolved() {
        let result = three_way_merge(
            Some(&json!({"a": 1, "b": 1})),
            &json!({"a": 1}),
            &json!({"a": 1, "b": 9}),
        );
        assert_eq!(result, Err(MergeConflict::Field("b".to_string())));
    }

    #[test]
    fn missing_base_is_unresolved() {
        let result = three_way_merge(None, &json!({"a": 2}), &json!({"b": 2}));
        assert_eq!(result, Err(MergeConflict::MissingBase));
    }

    #[test]
    fn scalar_values_merge_as_one_field() {
        assert_eq!(
            three_way_merge(Some(&json!(1)), &json!(1), &json!(2)),
            Ok(json!(2))
        );
        assert_eq!(
            three_way_merge(Some(&json!(1)), &json!(3), &json!(2)),
            Err(MergeConflict::Value)
        );
    }

    #[test]
    fn partial_merge_is_never_returned() {
        // `b` merges cleanly but `a` diverges; the whole merge must fail
        let result = three_way_merge(
            Some(&json!({"a": 1, "b": 1})),
            &json!({"a": 2, "b": 1}),
            &json!({"a": 3, "b": 2}),
        );
        assert!(result.is_err());
    }
}
