//! Sequence files on disk with schema + invariant validation.
//!
//! Layout: `<data_dir>/sequences/<assignee_id>/<YYYY-MM-DD>.json`, one file per
//! [`SequenceKey`]. A missing file is an empty sequence.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::NaiveDate;
use jsonschema::validator_for;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::service::SequenceService;
use crate::core::invariants::{
    DEFAULT_MAX_SEQUENCE_LEN, check_sequence_len, reorder_by_ids, validate_ordered_ids,
    validate_sequence,
};
use crate::core::types::{DispatchItem, SequenceKey};

pub const SEQUENCE_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/sequence/v1.schema.json"
));

/// On-disk representation of one sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSequence {
    pub assignee_id: String,
    pub date: NaiveDate,
    pub items: Vec<DispatchItem>,
}

impl StoredSequence {
    pub fn key(&self) -> SequenceKey {
        SequenceKey::new(self.assignee_id.clone(), self.date)
    }
}

/// File-backed [`SequenceService`].
#[derive(Debug, Clone)]
pub struct FileSequenceService {
    data_dir: PathBuf,
    max_len: usize,
}

impl FileSequenceService {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            max_len: DEFAULT_MAX_SEQUENCE_LEN,
        }
    }

    /// Refuse to read or write sequences longer than `max_len`.
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Directory holding every assignee's sequence files.
    pub fn sequences_dir(&self) -> PathBuf {
        self.data_dir.join("sequences")
    }

    /// File path for `key`. Rejects assignee ids that would escape the data dir.
    pub fn sequence_path(&self, key: &SequenceKey) -> Result<PathBuf> {
        let assignee = key.assignee_id.as_str();
        if assignee.trim().is_empty()
            || assignee == "."
            || assignee == ".."
            || assignee.contains(['/', '\\'])
        {
            bail!("invalid assignee id '{}'", assignee);
        }
        Ok(self
            .sequences_dir()
            .join(assignee)
            .join(format!("{}.json", key.date)))
    }

    /// Replace the stored items for `key` (used for seeding).
    pub fn write_sequence(&self, key: &SequenceKey, items: &[DispatchItem]) -> Result<()> {
        let errors = validate_sequence(items);
        if !errors.is_empty() {
            bail!("invalid sequence for {}: {}", key, errors.join("; "));
        }
        if let Some(error) = check_sequence_len(items.len(), self.max_len) {
            bail!("invalid sequence for {}: {}", key, error);
        }
        let path = self.sequence_path(key)?;
        let stored = StoredSequence {
            assignee_id: key.assignee_id.clone(),
            date: key.date,
            items: items.to_vec(),
        };
        write_stored(&path, &stored)
    }

    /// Read the stored items for `key`; empty if no file exists.
    pub fn read_sequence(&self, key: &SequenceKey) -> Result<Vec<DispatchItem>> {
        let path = self.sequence_path(key)?;
        if !path.exists() {
            debug!(key = %key, "no sequence file, treating as empty");
            return Ok(Vec::new());
        }
        let stored = load_stored(&path, self.max_len)?;
        if stored.key() != *key {
            bail!(
                "sequence file {} belongs to {}, expected {}",
                path.display(),
                stored.key(),
                key
            );
        }
        Ok(stored.items)
    }
}

#[async_trait]
impl SequenceService for FileSequenceService {
    async fn fetch_sequence(&self, key: &SequenceKey) -> Result<Vec<DispatchItem>> {
        let items = self
            .read_sequence(key)
            .with_context(|| format!("fetch sequence {}", key))?;
        debug!(key = %key, len = items.len(), "fetched sequence from disk");
        Ok(items)
    }

    async fn persist_sequence(&self, key: &SequenceKey, ordered_ids: &[String]) -> Result<()> {
        let known = self
            .read_sequence(key)
            .with_context(|| format!("persist sequence {}", key))?;
        let reordered = reorder_by_ids(&known, ordered_ids).ok_or_else(|| {
            anyhow!(
                "order rejected for {}: {}",
                key,
                validate_ordered_ids(&known, ordered_ids).join("; ")
            )
        })?;
        self.write_sequence(key, &reordered)?;
        debug!(key = %key, len = reordered.len(), "persisted sequence to disk");
        Ok(())
    }
}

/// Load and validate one sequence file (schema + invariants + length limit).
pub fn load_stored(path: &Path, max_len: usize) -> Result<StoredSequence> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read sequence {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse sequence {}", path.display()))?;
    validate_schema(&value)?;
    let stored: StoredSequence = serde_json::from_value(value)
        .with_context(|| format!("deserialize sequence {}", path.display()))?;
    let mut errors = validate_sequence(&stored.items);
    errors.extend(check_sequence_len(stored.items.len(), max_len));
    if !errors.is_empty() {
        bail!(
            "sequence invariants failed in {}: {}",
            path.display(),
            errors.join("; ")
        );
    }
    Ok(stored)
}

fn validate_schema(value: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(SEQUENCE_SCHEMA).context("parse sequence schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    if !compiled.is_valid(value) {
        let messages = compiled
            .iter_errors(value)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "sequence schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

/// Atomically write a sequence file (temp file + rename).
fn write_stored(path: &Path, stored: &StoredSequence) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("sequence path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut buf = serde_json::to_string_pretty(stored)?;
    buf.push('\n');
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp sequence {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace sequence {}", path.display()))?;
    Ok(())
}
