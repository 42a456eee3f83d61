//! Semantic checks not expressible via JSON Schema.

use std::collections::HashSet;

use crate::core::types::DispatchItem;

/// Longest sequence accepted when no limit is configured.
pub const DEFAULT_MAX_SEQUENCE_LEN: usize = 500;

/// Error message if a sequence of `len` items exceeds `max_len`.
pub fn check_sequence_len(len: usize, max_len: usize) -> Option<String> {
    (len > max_len).then(|| format!("sequence has {} items, limit is {}", len, max_len))
}

/// Check a loaded sequence:
/// - No empty ids
/// - No duplicate ids
pub fn validate_sequence(items: &[DispatchItem]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    for (index, item) in items.iter().enumerate() {
        if item.id.trim().is_empty() {
            errors.push(format!("item at position {} has an empty id", index));
            continue;
        }
        if !seen.insert(item.id.as_str()) {
            errors.push(format!("duplicate id '{}' at position {}", item.id, index));
        }
    }
    errors
}

/// Check that `ordered_ids` is a permutation of the ids in `known`.
///
/// Reports duplicates, unknown ids and ids missing from the new order, in
/// that order. Empty result means the order can be applied.
pub fn validate_ordered_ids(known: &[DispatchItem], ordered_ids: &[String]) -> Vec<String> {
    let mut errors = Vec::new();
    let known_ids: HashSet<&str> = known.iter().map(|item| item.id.as_str()).collect();
    let mut seen = HashSet::new();

    for id in ordered_ids {
        if !seen.insert(id.as_str()) {
            errors.push(format!("duplicate id '{}'", id));
        } else if !known_ids.contains(id.as_str()) {
            errors.push(format!("unknown id '{}'", id));
        }
    }

    for item in known {
        if !seen.contains(item.id.as_str()) {
            errors.push(format!("missing id '{}'", item.id));
        }
    }

    errors
}

/// Rebuild `known` in the order given by `ordered_ids`.
///
/// Returns `None` unless `ordered_ids` passes [`validate_ordered_ids`].
pub fn reorder_by_ids(known: &[DispatchItem], ordered_ids: &[String]) -> Option<Vec<DispatchItem>> {
    if !validate_ordered_ids(known, ordered_ids).is_empty() {
        return None;
    }
    ordered_ids
        .iter()
        .map(|id| known.iter().find(|item| &item.id == id).cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<DispatchItem> {
        vec![
            DispatchItem::new("a", true),
            DispatchItem::new("b", false),
            DispatchItem::new("c", false),
        ]
    }

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn sequence_reports_duplicates_and_empty_ids() {
        let items = vec![
            DispatchItem::new("a", false),
            DispatchItem::new(" ", false),
            DispatchItem::new("a", true),
        ];
        assert_eq!(
            validate_sequence(&items),
            vec![
                "item at position 1 has an empty id".to_string(),
                "duplicate id 'a' at position 2".to_string(),
            ]
        );
    }

    #[test]
    fn permutation_is_accepted() {
        assert!(validate_ordered_ids(&items(), &ids(&["a", "c", "b"])).is_empty());
    }

    #[test]
    fn duplicate_unknown_and_missing_are_reported() {
        let errors = validate_ordered_ids(&items(), &ids(&["a", "a", "z"]));
        assert_eq!(
            errors,
            vec![
                "duplicate id 'a'".to_string(),
                "unknown id 'z'".to_string(),
                "missing id 'b'".to_string(),
                "missing id 'c'".to_string(),
            ]
        );
    }

    #[test]
    fn reorder_by_ids_keeps_urgency_flags() {
        let reordered = reorder_by_ids(&items(), &ids(&["a", "c", "b"])).expect("valid order");
        assert_eq!(
            reordered,
            vec![
                DispatchItem::new("a", true),
                DispatchItem::new("c", false),
                DispatchItem::new("b", false),
            ]
        );
        assert!(reorder_by_ids(&items(), &ids(&["a"])).is_none());
    }

    #[test]
    fn length_limit_is_inclusive() {
        assert_eq!(check_sequence_len(3, 3), None);
        assert_eq!(
            check_sequence_len(4, 3),
            Some("sequence has 4 items, limit is 3".to_string())
        );
    }
}
