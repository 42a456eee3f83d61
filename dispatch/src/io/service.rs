//! Remote data service contract for dispatch sequences.
//!
//! The [`SequenceService`] trait decouples the editing session from the
//! backend that stores sequences. [`FileSequenceService`](super::file_store::FileSequenceService)
//! keeps them on disk; [`InMemorySequenceService`] is a map-backed stand-in
//! for tests and demos, with fault injection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tracing::debug;

use crate::core::invariants::{reorder_by_ids, validate_ordered_ids, validate_sequence};
use crate::core::types::{DispatchItem, SequenceKey};

/// Backend that owns the persisted order of every sequence.
#[async_trait]
pub trait SequenceService: Send + Sync {
    /// Items for `key` in their last persisted order. Unknown keys yield an
    /// empty sequence.
    async fn fetch_sequence(&self, key: &SequenceKey) -> Result<Vec<DispatchItem>>;

    /// Replace the order for `key`.
    ///
    /// Fails unless `ordered_ids` is exactly a permutation of the stored ids.
    async fn persist_sequence(&self, key: &SequenceKey, ordered_ids: &[String]) -> Result<()>;
}

/// Map-backed service for tests and demos.
///
/// Not suitable for production: nothing survives the process.
#[derive(Debug, Default)]
pub struct InMemorySequenceService {
    sequences: RwLock<HashMap<SequenceKey, Vec<DispatchItem>>>,
    persisted: Mutex<Vec<(SequenceKey, Vec<String>)>>,
    fetches: Mutex<Vec<SequenceKey>>,
    fail_next_fetch: AtomicBool,
    fail_next_persist: AtomicBool,
}

fn poisoned<T>(_: PoisonError<T>) -> anyhow::Error {
    anyhow!("in-memory sequence store lock poisoned")
}

impl InMemorySequenceService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `items` for `key`, replacing any previous sequence.
    pub fn insert(&self, key: SequenceKey, items: Vec<DispatchItem>) -> Result<()> {
        let errors = validate_sequence(&items);
        if !errors.is_empty() {
            return Err(anyhow!("invalid sequence for {}: {}", key, errors.join("; ")));
        }
        self.sequences
            .write()
            .map_err(poisoned)?
            .insert(key, items);
        Ok(())
    }

    /// Current stored order for `key`, if any.
    pub fn stored(&self, key: &SequenceKey) -> Option<Vec<DispatchItem>> {
        self.sequences
            .read()
            .ok()
            .and_then(|sequences| sequences.get(key).cloned())
    }

    /// Every successful persist call in order of arrival.
    pub fn persisted(&self) -> Vec<(SequenceKey, Vec<String>)> {
        self.persisted
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Every fetch call in order of arrival, failed ones included.
    pub fn fetches(&self) -> Vec<SequenceKey> {
        self.fetches
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Make the next fetch fail once.
    pub fn fail_next_fetch(&self) {
        self.fail_next_fetch.store(true, Ordering::SeqCst);
    }

    /// Make the next persist fail once.
    pub fn fail_next_persist(&self) {
        self.fail_next_persist.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SequenceService for InMemorySequenceService {
    async fn fetch_sequence(&self, key: &SequenceKey) -> Result<Vec<DispatchItem>> {
        self.fetches.lock().map_err(poisoned)?.push(key.clone());
        if self.fail_next_fetch.swap(false, Ordering::SeqCst) {
            return Err(anyhow!("injected fetch failure for {}", key));
        }
        let sequences = self.sequences.read().map_err(poisoned)?;
        let items = sequences.get(key).cloned().unwrap_or_default();
        debug!(key = %key, len = items.len(), "fetched sequence from memory");
        Ok(items)
    }

    async fn persist_sequence(&self, key: &SequenceKey, ordered_ids: &[String]) -> Result<()> {
        if self.fail_next_persist.swap(false, Ordering::SeqCst) {
            return Err(anyhow!("injected persist failure for {}", key));
        }
        let mut sequences = self.sequences.write().map_err(poisoned)?;
        let known = sequences.get(key).map(Vec::as_slice).unwrap_or_default();
        let reordered = reorder_by_ids(known, ordered_ids).ok_or_else(|| {
            anyhow!(
                "order rejected for {}: {}",
                key,
                validate_ordered_ids(known, ordered_ids).join("; ")
            )
        })?;
        sequences.insert(key.clone(), reordered);
        self.persisted
            .lock()
            .map_err(poisoned)?
            .push((key.clone(), ordered_ids.to_vec()));
        debug!(key = %key, len = ordered_ids.len(), "persisted sequence in memory");
        Ok(())
    }
}
