//! Adjacency constraint between neighboring dispatch items.

use crate::core::types::DispatchItem;

/// True if two adjacent items may exchange positions.
///
/// Urgent and non-urgent items never cross: a swap is refused when exactly
/// one side is urgent. Swaps within a same-urgency run are always allowed.
pub fn can_swap(a: &DispatchItem, b: &DispatchItem) -> bool {
    a.is_urgent == b.is_urgent
}
