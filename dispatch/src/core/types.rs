//! Shared deterministic types for dispatch sequencing.
//!
//! These types define the contract between the sequencing core, the editing
//! session and the remote data service. They carry no I/O.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One delivery request awaiting a position in a daily route.
///
/// Position is implicit: it is the item's index in its sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchItem {
    pub id: String,
    pub is_urgent: bool,
}

impl DispatchItem {
    pub fn new(id: impl Into<String>, is_urgent: bool) -> Self {
        Self {
            id: id.into(),
            is_urgent,
        }
    }
}

/// Scope of one sequence: a single assignee on a single calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceKey {
    pub assignee_id: String,
    pub date: NaiveDate,
}

impl SequenceKey {
    pub fn new(assignee_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            assignee_id: assignee_id.into(),
            date,
        }
    }
}

impl fmt::Display for SequenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.assignee_id, self.date)
    }
}

/// Whether the in-memory order has unsaved changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditState {
    /// No accepted swap since the last load or successful commit.
    #[default]
    Clean,
    /// At least one accepted swap since the last load or successful commit.
    Dirty,
}

/// Direction of a single-step adjacent move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Towards index 0.
    Up,
    /// Towards the last index.
    Down,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            other => Err(format!("unknown direction '{}': expected up or down", other)),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => f.write_str("up"),
            Self::Down => f.write_str("down"),
        }
    }
}
