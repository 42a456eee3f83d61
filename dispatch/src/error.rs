//! Error taxonomy for a sequencing session.
//!
//! Every variant is handled at the UI boundary and turned into a
//! [`Notice`](crate::notice::Notice); none is meant to escape as a crash.

use thiserror::Error;

use crate::core::reorder::MoveRejection;
use crate::core::types::SequenceKey;
use crate::session::Phase;

#[derive(Debug, Error)]
pub enum SequenceError {
    /// Fetching the day's sequence failed. The session holds no items until
    /// the next successful load.
    #[error("load {key} failed: {source:#}")]
    Load {
        key: SequenceKey,
        #[source]
        source: anyhow::Error,
    },

    /// A move would cross the urgent/non-urgent boundary. Nothing changed.
    #[error("moving position {index} past position {neighbor} crosses the urgent boundary")]
    ConstraintViolation { index: usize, neighbor: usize },

    /// Persisting the order failed. Order and dirty flag are kept for retry.
    #[error("commit {key} failed: {source:#}")]
    Commit {
        key: SequenceKey,
        #[source]
        source: anyhow::Error,
    },

    #[error("position {index} is out of range for a sequence of {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// A load or commit is pending; reorder controls are disabled.
    #[error("session is busy ({phase:?})")]
    Busy { phase: Phase },

    /// No sequence has been loaded successfully yet.
    #[error("no sequence loaded")]
    NotLoaded,
}

impl SequenceError {
    /// Stable machine-readable label used in API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Load { .. } => "load_error",
            Self::ConstraintViolation { .. } => "constraint_violation",
            Self::Commit { .. } => "commit_error",
            Self::IndexOutOfRange { .. } => "index_out_of_range",
            Self::Busy { .. } => "busy",
            Self::NotLoaded => "not_loaded",
        }
    }
}

impl From<MoveRejection> for SequenceError {
    fn from(rejection: MoveRejection) -> Self {
        match rejection {
            MoveRejection::OutOfRange { index, len } => Self::IndexOutOfRange { index, len },
            MoveRejection::Constraint { index, neighbor } => {
                Self::ConstraintViolation { index, neighbor }
            }
        }
    }
}
