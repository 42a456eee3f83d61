//! Batch re-sequencing for `dispatch reorder`.
//!
//! Drives one [`SequenceSession`] through load, a list of moves and a commit,
//! the same way a screen would, and reports what happened.

use std::fmt;
use std::str::FromStr;

use tracing::info;

use crate::core::types::{Direction, SequenceKey};
use crate::error::SequenceError;
use crate::io::service::SequenceService;
use crate::session::{CommitOutcome, SequenceSession};

/// One requested move, written `up:<index>` or `down:<index>` (0-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveSpec {
    pub direction: Direction,
    pub index: usize,
}

impl FromStr for MoveSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (direction, index) = s
            .split_once(':')
            .ok_or_else(|| format!("invalid move '{}': expected up:<index> or down:<index>", s))?;
        let direction = direction.parse::<Direction>()?;
        let index = index
            .trim()
            .parse::<usize>()
            .map_err(|err| format!("invalid move index in '{}': {}", s, err))?;
        Ok(Self { direction, index })
    }
}

impl fmt::Display for MoveSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.direction, self.index)
    }
}

/// Summary of a completed re-sequencing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResequenceReport {
    pub key: SequenceKey,
    /// Moves that swapped two positions (boundary no-ops excluded).
    pub swaps: usize,
    /// `None` for dry runs.
    pub commit: Option<CommitOutcome>,
    /// Final order (persisted unless this was a dry run).
    pub order: Vec<String>,
}

/// Load `key`, apply `moves` in order and commit if anything changed.
///
/// Stops at the first rejected move; nothing is persisted in that case.
/// Sequences longer than `max_len` fail to load.
pub async fn resequence<S>(
    service: &S,
    key: SequenceKey,
    moves: &[MoveSpec],
    dry_run: bool,
    max_len: usize,
) -> Result<ResequenceReport, SequenceError>
where
    S: SequenceService + ?Sized,
{
    let mut session = SequenceSession::with_max_len(max_len);
    session.load(service, key.clone()).await?;

    let mut swaps = 0;
    for spec in moves {
        if session.move_item(spec.index, spec.direction)?.changed() {
            swaps += 1;
        }
    }

    let commit = if dry_run {
        None
    } else {
        Some(session.commit(service).await?)
    };
    info!(key = %key, swaps, ?commit, "resequence finished");

    Ok(ResequenceReport {
        key,
        swaps,
        commit,
        order: session.ordered_ids(),
    })
}
