//! Test-only helpers for building dispatch items and sequence stores.

use std::path::Path;

use anyhow::Result;
use chrono::NaiveDate;
use tempfile::TempDir;

use crate::core::types::{DispatchItem, SequenceKey};
use crate::io::file_store::FileSequenceService;
use crate::io::init::{InitOptions, init_dispatch, open_service};

/// Build items from `(id, is_urgent)` pairs, keeping their order.
pub fn items(spec: &[(&str, bool)]) -> Vec<DispatchItem> {
    spec.iter()
        .map(|(id, urgent)| DispatchItem::new(*id, *urgent))
        .collect()
}

/// Owned id list from string slices.
pub fn ids(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|id| id.to_string()).collect()
}

/// Sequence key for an ISO date (`YYYY-MM-DD`). Panics on a malformed date.
pub fn key(assignee_id: &str, date: &str) -> SequenceKey {
    let date: NaiveDate = date.parse().expect("test date must be YYYY-MM-DD");
    SequenceKey::new(assignee_id, date)
}

/// Temporary project with an initialized `.dispatch/` directory.
pub struct TestProject {
    dir: TempDir,
    service: FileSequenceService,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        init_dispatch(dir.path(), &InitOptions { force: false })?;
        let (_, service) = open_service(dir.path())?;
        Ok(Self { dir, service })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn service(&self) -> &FileSequenceService {
        &self.service
    }

    /// Store `spec` as the sequence for `key`.
    pub fn seed(&self, key: &SequenceKey, spec: &[(&str, bool)]) -> Result<()> {
        self.service.write_sequence(key, &items(spec))
    }
}
