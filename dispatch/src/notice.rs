//! User notifications for session outcomes.
//!
//! Errors never leave the UI boundary as failures; each one becomes a
//! [`Notice`] whose text comes from [`NoticeConfig`].

use serde::Serialize;

use crate::error::SequenceError;
use crate::io::config::NoticeConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// A message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    /// Transient notices hide themselves; others wait for the user to dismiss them.
    pub transient: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Notice {
    pub fn saved(texts: &NoticeConfig) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: texts.saved.clone(),
            transient: true,
            detail: None,
        }
    }

    pub fn for_error(err: &SequenceError, texts: &NoticeConfig) -> Self {
        let (level, message, transient) = match err {
            SequenceError::Load { .. } => (NoticeLevel::Error, &texts.load_failed, false),
            SequenceError::ConstraintViolation { .. } => {
                (NoticeLevel::Warning, &texts.constraint_violation, true)
            }
            SequenceError::Commit { .. } => (NoticeLevel::Error, &texts.commit_failed, false),
            SequenceError::IndexOutOfRange { .. } => {
                (NoticeLevel::Warning, &texts.out_of_range, true)
            }
            SequenceError::Busy { .. } => (NoticeLevel::Warning, &texts.busy, true),
            SequenceError::NotLoaded => (NoticeLevel::Warning, &texts.not_loaded, true),
        };
        let detail = match err {
            SequenceError::Load { .. } | SequenceError::Commit { .. } => Some(err.to_string()),
            _ => None,
        };
        Self {
            level,
            message: message.clone(),
            transient,
            detail,
        }
    }
}
