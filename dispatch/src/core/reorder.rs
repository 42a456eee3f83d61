//! Single-step adjacent moves over an ordered sequence.

use crate::core::constraint::can_swap;
use crate::core::types::{DispatchItem, Direction};

/// Result of an accepted move request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Positions `from` and `to` were exchanged.
    Swapped { from: usize, to: usize },
    /// The item already sits at the boundary in the requested direction.
    NoOp,
}

impl MoveOutcome {
    pub fn changed(self) -> bool {
        matches!(self, Self::Swapped { .. })
    }
}

/// Reason a move request left the sequence untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveRejection {
    /// `index` does not address an item.
    OutOfRange { index: usize, len: usize },
    /// The neighbor at `neighbor` has different urgency than the item at `index`.
    Constraint { index: usize, neighbor: usize },
}

/// Index of the neighbor in `direction`, or `None` at the boundary.
pub fn neighbor_index(index: usize, direction: Direction, len: usize) -> Option<usize> {
    match direction {
        Direction::Up => index.checked_sub(1),
        Direction::Down => index.checked_add(1).filter(|&next| next < len),
    }
}

/// Move the item at `index` one step in `direction`.
///
/// The slice is only modified when the move is accepted and not a boundary
/// no-op.
pub fn apply_move(
    items: &mut [DispatchItem],
    index: usize,
    direction: Direction,
) -> Result<MoveOutcome, MoveRejection> {
    let len = items.len();
    if index >= len {
        return Err(MoveRejection::OutOfRange { index, len });
    }

    let Some(neighbor) = neighbor_index(index, direction, len) else {
        return Ok(MoveOutcome::NoOp);
    };

    if !can_swap(&items[index], &items[neighbor]) {
        return Err(MoveRejection::Constraint { index, neighbor });
    }

    items.swap(index, neighbor);
    Ok(MoveOutcome::Swapped {
        from: index,
        to: neighbor,
    })
}
