//! Editing session for one screen: the sequence store, the reorder engine
//! and the commit operation.
//!
//! A [`SequenceSession`] is owned by exactly one screen. Load and commit are
//! split into `begin_*` / `finish_*` halves so the caller can await the
//! remote service without holding a lock on the session; [`SequenceSession::load`]
//! and [`SequenceSession::commit`] chain both halves for callers that own the
//! session outright.
//!
//! State machine:
//! - `Clean -> Dirty` on any accepted swap.
//! - `Dirty -> Clean` on a successful commit or a fresh load.
//! - Rejected swaps and failed commits cause no transition.

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::invariants::{DEFAULT_MAX_SEQUENCE_LEN, check_sequence_len, validate_sequence};
use crate::core::reorder::{MoveOutcome, apply_move};
use crate::core::types::{DispatchItem, Direction, EditState, SequenceKey};
use crate::error::SequenceError;
use crate::io::service::SequenceService;

/// What the session is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Nothing loaded, or the last load failed.
    #[default]
    Unloaded,
    /// A fetch is in flight.
    Loading,
    /// Items are loaded and may be reordered.
    Ready,
    /// A persist is in flight.
    Committing,
}

/// Handle for an issued load. Only the most recently issued ticket applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    token: u64,
    key: SequenceKey,
}

impl LoadTicket {
    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn key(&self) -> &SequenceKey {
        &self.key
    }
}

/// Result of completing a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Items replaced the in-memory sequence.
    Applied { len: usize },
    /// A newer load was issued meanwhile; the result was discarded.
    Stale,
}

/// Payload for the remote persist call, produced by [`SequenceSession::begin_commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRequest {
    pub key: SequenceKey,
    pub ordered_ids: Vec<String>,
}

/// Result of a commit request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The order was persisted and the session is clean again.
    Saved,
    /// The session was clean; no remote call was made.
    NothingToSave,
    /// No commit was in flight; the result was discarded.
    Stale,
}

#[derive(Debug)]
pub struct SequenceSession {
    key: Option<SequenceKey>,
    items: Vec<DispatchItem>,
    edit: EditState,
    phase: Phase,
    latest_token: u64,
    max_len: usize,
}

impl Default for SequenceSession {
    fn default() -> Self {
        Self {
            key: None,
            items: Vec::new(),
            edit: EditState::Clean,
            phase: Phase::Unloaded,
            latest_token: 0,
            max_len: DEFAULT_MAX_SEQUENCE_LEN,
        }
    }
}

impl SequenceSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session that fails loads returning more than `max_len` items.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            max_len,
            ..Self::default()
        }
    }

    /// Read-only view of the current order.
    pub fn sequence(&self) -> &[DispatchItem] {
        &self.items
    }

    pub fn key(&self) -> Option<&SequenceKey> {
        self.key.as_ref()
    }

    pub fn edit_state(&self) -> EditState {
        self.edit
    }

    pub fn is_dirty(&self) -> bool {
        self.edit == EditState::Dirty
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Ids in their current order.
    pub fn ordered_ids(&self) -> Vec<String> {
        self.items.iter().map(|item| item.id.clone()).collect()
    }

    /// Start loading the sequence for `key`.
    ///
    /// The current sequence is discarded immediately. Any earlier ticket that
    /// has not finished yet becomes stale.
    pub fn begin_load(&mut self, key: SequenceKey) -> Result<LoadTicket, SequenceError> {
        if self.phase == Phase::Committing {
            return Err(SequenceError::Busy { phase: self.phase });
        }
        self.latest_token += 1;
        debug!(key = %key, token = self.latest_token, "begin load");
        self.key = Some(key.clone());
        self.items.clear();
        self.edit = EditState::Clean;
        self.phase = Phase::Loading;
        Ok(LoadTicket {
            token: self.latest_token,
            key,
        })
    }

    /// Apply the fetch result for `ticket`.
    ///
    /// Results for stale tickets are dropped without touching the session,
    /// errors included.
    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        fetched: Result<Vec<DispatchItem>>,
    ) -> Result<LoadOutcome, SequenceError> {
        if ticket.token != self.latest_token {
            debug!(
                key = %ticket.key,
                token = ticket.token,
                latest = self.latest_token,
                "discarding stale load"
            );
            return Ok(LoadOutcome::Stale);
        }

        let checked = fetched.and_then(|items| {
            let mut errors = validate_sequence(&items);
            errors.extend(check_sequence_len(items.len(), self.max_len));
            if errors.is_empty() {
                Ok(items)
            } else {
                Err(anyhow::anyhow!("invalid sequence: {}", errors.join("; ")))
            }
        });

        match checked {
            Ok(items) => {
                let len = items.len();
                info!(key = %ticket.key, len, "sequence loaded");
                self.items = items;
                self.edit = EditState::Clean;
                self.phase = Phase::Ready;
                Ok(LoadOutcome::Applied { len })
            }
            Err(source) => {
                warn!(key = %ticket.key, error = %format!("{:#}", source), "load failed");
                self.items.clear();
                self.edit = EditState::Clean;
                self.phase = Phase::Unloaded;
                Err(SequenceError::Load {
                    key: ticket.key,
                    source,
                })
            }
        }
    }

    /// Fetch and apply the sequence for `key` in one step.
    pub async fn load<S>(
        &mut self,
        service: &S,
        key: SequenceKey,
    ) -> Result<LoadOutcome, SequenceError>
    where
        S: SequenceService + ?Sized,
    {
        let ticket = self.begin_load(key)?;
        let fetched = service.fetch_sequence(ticket.key()).await;
        self.finish_load(ticket, fetched)
    }

    pub fn move_up(&mut self, index: usize) -> Result<MoveOutcome, SequenceError> {
        self.move_item(index, Direction::Up)
    }

    pub fn move_down(&mut self, index: usize) -> Result<MoveOutcome, SequenceError> {
        self.move_item(index, Direction::Down)
    }

    /// Move the item at `index` one step. Only accepted swaps mark the
    /// session dirty.
    pub fn move_item(
        &mut self,
        index: usize,
        direction: Direction,
    ) -> Result<MoveOutcome, SequenceError> {
        self.ensure_ready()?;
        let outcome = apply_move(&mut self.items, index, direction).inspect_err(|rejection| {
            debug!(index, %direction, ?rejection, "move rejected");
        })?;
        if outcome.changed() {
            self.edit = EditState::Dirty;
        }
        debug!(index, %direction, ?outcome, "move applied");
        Ok(outcome)
    }

    /// Start persisting the current order.
    ///
    /// Returns `Ok(None)` when there is nothing to save. Otherwise the session
    /// enters [`Phase::Committing`] until [`finish_commit`](Self::finish_commit).
    pub fn begin_commit(&mut self) -> Result<Option<CommitRequest>, SequenceError> {
        self.ensure_ready()?;
        if !self.is_dirty() {
            debug!("commit skipped: no unsaved changes");
            return Ok(None);
        }
        let key = self.key.clone().ok_or(SequenceError::NotLoaded)?;
        self.phase = Phase::Committing;
        debug!(key = %key, len = self.items.len(), "begin commit");
        Ok(Some(CommitRequest {
            key,
            ordered_ids: self.ordered_ids(),
        }))
    }

    /// Record the persist result for `request`.
    ///
    /// On failure the order and dirty flag are left as they were so the user
    /// can retry. A result arriving when no commit is in flight changes
    /// nothing.
    pub fn finish_commit(
        &mut self,
        request: CommitRequest,
        persisted: Result<()>,
    ) -> Result<CommitOutcome, SequenceError> {
        if self.phase != Phase::Committing {
            warn!(
                key = %request.key,
                phase = ?self.phase,
                "discarding commit result: no commit in flight"
            );
            return Ok(CommitOutcome::Stale);
        }
        self.phase = Phase::Ready;
        match persisted {
            Ok(()) => {
                info!(key = %request.key, len = request.ordered_ids.len(), "sequence committed");
                self.edit = EditState::Clean;
                Ok(CommitOutcome::Saved)
            }
            Err(source) => {
                warn!(key = %request.key, error = %format!("{:#}", source), "commit failed");
                Err(SequenceError::Commit {
                    key: request.key,
                    source,
                })
            }
        }
    }

    /// Persist the current order if it has unsaved changes.
    pub async fn commit<S>(&mut self, service: &S) -> Result<CommitOutcome, SequenceError>
    where
        S: SequenceService + ?Sized,
    {
        let Some(request) = self.begin_commit()? else {
            return Ok(CommitOutcome::NothingToSave);
        };
        let persisted = service
            .persist_sequence(&request.key, &request.ordered_ids)
            .await;
        self.finish_commit(request, persisted)
    }

    fn ensure_ready(&self) -> Result<(), SequenceError> {
        match self.phase {
            Phase::Ready => Ok(()),
            Phase::Unloaded => Err(SequenceError::NotLoaded),
            Phase::Loading | Phase::Committing => Err(SequenceError::Busy { phase: self.phase }),
        }
    }
}
