//! Shared application state for the UI server.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;
use dispatch::io::config::{DispatchConfig, NoticeConfig};
use dispatch::io::service::SequenceService;
use dispatch::session::SequenceSession;
use tokio::sync::{Mutex, RwLock, broadcast};

/// Events broadcast to SSE clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A session saved a new order through this server.
    SequenceCommitted {
        assignee_id: String,
        date: NaiveDate,
    },
    /// A sequence file changed on disk.
    SequenceChanged {
        assignee_id: String,
        date: NaiveDate,
    },
}

/// One screen's editing session.
pub type SessionHandle = Arc<Mutex<SequenceSession>>;

/// Shared state accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Backend that loads and persists sequences.
    pub service: Arc<dyn SequenceService>,
    /// Notification texts.
    pub notices: Arc<NoticeConfig>,
    /// Loads returning more items than this fail.
    pub max_sequence_len: usize,
    /// Directory holding sequence files (watched for external changes).
    pub data_dir: PathBuf,
    /// Broadcast sender for change events.
    pub event_tx: Arc<broadcast::Sender<ChangeEvent>>,
    sessions: Arc<RwLock<HashMap<u64, SessionHandle>>>,
    next_session_id: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(service: Arc<dyn SequenceService>, cfg: DispatchConfig, data_dir: PathBuf) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            service,
            notices: Arc::new(cfg.notices),
            max_sequence_len: cfg.max_sequence_len,
            data_dir,
            event_tx: Arc::new(event_tx),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            next_session_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Path to the sequences directory.
    pub fn sequences_dir(&self) -> PathBuf {
        self.data_dir.join("sequences")
    }

    /// Open a fresh session and return its id.
    pub async fn create_session(&self) -> u64 {
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let session = SequenceSession::with_max_len(self.max_sequence_len);
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(session)));
        id
    }

    pub async fn session(&self, id: u64) -> Option<SessionHandle> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Drop a session. Returns false if it did not exist.
    pub async fn close_session(&self, id: u64) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }
}
