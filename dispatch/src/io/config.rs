//! Dispatch configuration stored under `.dispatch/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::invariants::DEFAULT_MAX_SEQUENCE_LEN;

/// Dispatch configuration (TOML).
///
/// Intended to be edited by humans. Missing fields fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DispatchConfig {
    /// Where sequence files live. Relative paths resolve against `.dispatch/`.
    pub data_dir: PathBuf,

    /// Longer sequences are refused on load and on write.
    pub max_sequence_len: usize,

    pub notices: NoticeConfig,
}

/// User-facing notification texts, one field per notice kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NoticeConfig {
    pub constraint_violation: String,
    pub load_failed: String,
    pub commit_failed: String,
    pub saved: String,
    pub busy: String,
    pub not_loaded: String,
    pub out_of_range: String,
}

impl Default for NoticeConfig {
    fn default() -> Self {
        Self {
            constraint_violation:
                "Not permitted: urgent and regular deliveries cannot swap places.".to_string(),
            load_failed: "Could not load the delivery sequence.".to_string(),
            commit_failed: "Could not save the delivery order. Your changes are kept; try again."
                .to_string(),
            saved: "Delivery order saved.".to_string(),
            busy: "Please wait for the current operation to finish.".to_string(),
            not_loaded: "Select an assignee and a date first.".to_string(),
            out_of_range: "That delivery is no longer in the list.".to_string(),
        }
    }
}

impl NoticeConfig {
    fn fields(&self) -> [(&'static str, &str); 7] {
        [
            ("constraint_violation", self.constraint_violation.as_str()),
            ("load_failed", self.load_failed.as_str()),
            ("commit_failed", self.commit_failed.as_str()),
            ("saved", self.saved.as_str()),
            ("busy", self.busy.as_str()),
            ("not_loaded", self.not_loaded.as_str()),
            ("out_of_range", self.out_of_range.as_str()),
        ]
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            max_sequence_len: DEFAULT_MAX_SEQUENCE_LEN,
            notices: NoticeConfig::default(),
        }
    }
}

impl DispatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(anyhow!("data_dir must not be empty"));
        }
        if self.max_sequence_len == 0 {
            return Err(anyhow!("max_sequence_len must be >= 1"));
        }
        for (name, text) in self.notices.fields() {
            if text.trim().is_empty() {
                return Err(anyhow!("notices.{} must not be empty", name));
            }
        }
        Ok(())
    }

    /// Absolute data directory for a `.dispatch/` directory.
    pub fn resolve_data_dir(&self, dispatch_dir: &Path) -> PathBuf {
        if self.data_dir.is_absolute() {
            self.data_dir.clone()
        } else {
            dispatch_dir.join(&self.data_dir)
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `DispatchConfig::default()`.
pub fn load_config(path: &Path) -> Result<DispatchConfig> {
    if !path.exists() {
        let cfg = DispatchConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: DispatchConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &DispatchConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
