//! HTTP route handlers for the sequencing API.
//!
//! Every error is answered with a JSON body carrying a [`Notice`] for the
//! screen to display. Remote calls run with the session lock released; the
//! session's load tickets make late results from superseded loads harmless.
//! A commit runs to completion in its own task even if the request that
//! started it goes away.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use chrono::NaiveDate;
use dispatch::core::types::{DispatchItem, Direction, EditState, SequenceKey};
use dispatch::error::SequenceError;
use dispatch::notice::Notice;
use dispatch::session::{CommitOutcome, LoadOutcome, Phase, SequenceSession};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::state::{AppState, ChangeEvent, SessionHandle};

/// Build the API router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", get(get_session).delete(close_session))
        .route("/sessions/{id}/load", post(load_sequence))
        .route("/sessions/{id}/move", post(move_item))
        .route("/sessions/{id}/commit", post(commit_sequence))
}

async fn health() -> &'static str {
    "ok"
}

/// Snapshot of a session for the screen.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    id: u64,
    key: Option<SequenceKey>,
    items: Vec<DispatchItem>,
    edit_state: EditState,
    phase: Phase,
    /// Reorder controls are enabled only when a sequence is loaded and idle.
    can_reorder: bool,
    can_commit: bool,
}

impl SessionView {
    fn of(id: u64, session: &SequenceSession) -> Self {
        let ready = session.phase() == Phase::Ready;
        Self {
            id,
            key: session.key().cloned(),
            items: session.sequence().to_vec(),
            edit_state: session.edit_state(),
            phase: session.phase(),
            can_reorder: ready,
            can_commit: ready && session.is_dirty(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadRequest {
    assignee_id: String,
    date: NaiveDate,
}

#[derive(Debug, Serialize)]
struct LoadResponse {
    /// False when a newer load superseded this one.
    applied: bool,
    session: SessionView,
}

#[derive(Debug, Deserialize)]
struct MoveRequest {
    index: usize,
    direction: Direction,
}

#[derive(Debug, Serialize)]
struct MoveResponse {
    swapped: bool,
    session: SessionView,
}

#[derive(Debug, Serialize)]
struct CommitResponse {
    saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    notice: Option<Notice>,
    session: SessionView,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    notice: Option<Notice>,
}

/// Error response: status code plus a JSON body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn unknown_session(id: u64) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: ErrorBody {
                error: "unknown_session",
                message: format!("session {} does not exist", id),
                notice: None,
            },
        }
    }

    fn internal(message: String) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorBody {
                error: "internal",
                message,
                notice: None,
            },
        }
    }

    fn sequence(state: &AppState, err: SequenceError) -> Self {
        let status = match &err {
            SequenceError::Load { .. } | SequenceError::Commit { .. } => StatusCode::BAD_GATEWAY,
            SequenceError::ConstraintViolation { .. }
            | SequenceError::Busy { .. }
            | SequenceError::NotLoaded => StatusCode::CONFLICT,
            SequenceError::IndexOutOfRange { .. } => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            body: ErrorBody {
                error: err.kind(),
                message: err.to_string(),
                notice: Some(Notice::for_error(&err, &state.notices)),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

async fn lookup(state: &AppState, id: u64) -> Result<SessionHandle, ApiError> {
    state
        .session(id)
        .await
        .ok_or_else(|| ApiError::unknown_session(id))
}

/// POST /api/sessions - open a new editing session.
async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionView>) {
    let id = state.create_session().await;
    debug!(session = id, "session created");
    (
        StatusCode::CREATED,
        Json(SessionView::of(id, &SequenceSession::new())),
    )
}

/// GET /api/sessions/:id - current session snapshot.
async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<SessionView>, ApiError> {
    let handle = lookup(&state, id).await?;
    let session = handle.lock().await;
    Ok(Json(SessionView::of(id, &session)))
}

/// DELETE /api/sessions/:id - discard a session and any unsaved order.
async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    if state.close_session(id).await {
        debug!(session = id, "session closed");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::unknown_session(id))
    }
}

/// POST /api/sessions/:id/load - select assignee and date, fetch their sequence.
async fn load_sequence(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<LoadRequest>,
) -> Result<Json<LoadResponse>, ApiError> {
    let handle = lookup(&state, id).await?;
    let key = SequenceKey::new(request.assignee_id, request.date);

    let ticket = {
        let mut session = handle.lock().await;
        session
            .begin_load(key)
            .map_err(|err| ApiError::sequence(&state, err))?
    };

    let fetched = state.service.fetch_sequence(ticket.key()).await;

    let mut session = handle.lock().await;
    let outcome = session
        .finish_load(ticket, fetched)
        .map_err(|err| ApiError::sequence(&state, err))?;
    Ok(Json(LoadResponse {
        applied: matches!(outcome, LoadOutcome::Applied { .. }),
        session: SessionView::of(id, &session),
    }))
}

/// POST /api/sessions/:id/move - move one item a single step.
async fn move_item(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<MoveRequest>,
) -> Result<Json<MoveResponse>, ApiError> {
    let handle = lookup(&state, id).await?;
    let mut session = handle.lock().await;
    let outcome = session
        .move_item(request.index, request.direction)
        .map_err(|err| ApiError::sequence(&state, err))?;
    Ok(Json(MoveResponse {
        swapped: outcome.changed(),
        session: SessionView::of(id, &session),
    }))
}

/// POST /api/sessions/:id/commit - persist the current order if it changed.
async fn commit_sequence(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<CommitResponse>, ApiError> {
    let handle = lookup(&state, id).await?;

    let request = {
        let mut session = handle.lock().await;
        match session
            .begin_commit()
            .map_err(|err| ApiError::sequence(&state, err))?
        {
            Some(request) => request,
            None => {
                return Ok(Json(CommitResponse {
                    saved: false,
                    notice: None,
                    session: SessionView::of(id, &session),
                }));
            }
        }
    };

    let service = Arc::clone(&state.service);
    let events = Arc::clone(&state.event_tx);
    let task = tokio::spawn(async move {
        let key = request.key.clone();
        let persisted = service
            .persist_sequence(&request.key, &request.ordered_ids)
            .await;
        let mut session = handle.lock().await;
        let outcome = session.finish_commit(request, persisted);
        if matches!(outcome, Ok(CommitOutcome::Saved)) {
            info!(session = id, key = %key, "sequence committed");
            let _ = events.send(ChangeEvent::SequenceCommitted {
                assignee_id: key.assignee_id,
                date: key.date,
            });
        }
        (outcome, SessionView::of(id, &session))
    });

    let (outcome, view) = task.await.map_err(|err| {
        error!(session = id, error = %err, "commit task failed");
        ApiError::internal(format!("commit task failed: {}", err))
    })?;
    let saved = outcome.map_err(|err| ApiError::sequence(&state, err))? == CommitOutcome::Saved;
    Ok(Json(CommitResponse {
        saved,
        notice: saved.then(|| Notice::saved(&state.notices)),
        session: view,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request};
    use dispatch::io::config::DispatchConfig;
    use dispatch::io::service::{InMemorySequenceService, SequenceService};
    use dispatch::test_support::{ids, items, key};
    use serde_json::{Value, json};
    use tokio::sync::Notify;
    use tower::ServiceExt;

    use super::*;

    /// In-memory service whose fetches for one assignee, and optionally
    /// every persist, wait until released.
    #[derive(Default)]
    struct HeldService {
        inner: InMemorySequenceService,
        hold_fetch_for: Mutex<Option<String>>,
        fetch_release: Notify,
        hold_persist: AtomicBool,
        persist_release: Notify,
    }

    #[async_trait]
    impl SequenceService for HeldService {
        async fn fetch_sequence(&self, key: &SequenceKey) -> anyhow::Result<Vec<DispatchItem>> {
            let held = self
                .hold_fetch_for
                .lock()
                .expect("hold lock")
                .as_deref()
                == Some(key.assignee_id.as_str());
            let fetched = self.inner.fetch_sequence(key).await;
            if held {
                self.fetch_release.notified().await;
            }
            fetched
        }

        async fn persist_sequence(
            &self,
            key: &SequenceKey,
            ordered_ids: &[String],
        ) -> anyhow::Result<()> {
            if self.hold_persist.load(Ordering::SeqCst) {
                self.persist_release.notified().await;
            }
            self.inner.persist_sequence(key, ordered_ids).await
        }
    }

    fn app(service: Arc<dyn SequenceService>) -> (Router, AppState) {
        let state = AppState::new(
            service,
            DispatchConfig::default(),
            std::env::temp_dir().join("dispatch-ui-tests"),
        );
        let router = Router::new()
            .nest("/api", api_router())
            .with_state(state.clone());
        (router, state)
    }

    fn seeded() -> Arc<InMemorySequenceService> {
        let service = InMemorySequenceService::new();
        service
            .insert(
                key("driver-1", "2024-06-01"),
                items(&[("A", true), ("B", true), ("C", false)]),
            )
            .expect("insert");
        Arc::new(service)
    }

    async fn call(
        router: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .expect("request");
        let response = router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    async fn loaded_session(router: &Router) -> u64 {
        let (status, body) = call(router, Method::POST, "/api/sessions", None).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["id"].as_u64().expect("id");
        let (status, body) = call(
            router,
            Method::POST,
            &format!("/api/sessions/{}/load", id),
            Some(json!({ "assigneeId": "driver-1", "date": "2024-06-01" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["applied"], json!(true));
        id
    }

    #[tokio::test]
    async fn move_then_commit_persists_and_broadcasts() {
        let service = seeded();
        let (router, state) = app(service.clone());
        let mut events = state.event_tx.subscribe();
        let id = loaded_session(&router).await;

        let (status, body) = call(
            &router,
            Method::POST,
            &format!("/api/sessions/{}/move", id),
            Some(json!({ "index": 1, "direction": "up" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["swapped"], json!(true));
        assert_eq!(body["session"]["editState"], json!("dirty"));
        assert_eq!(body["session"]["canCommit"], json!(true));

        let (status, body) = call(
            &router,
            Method::POST,
            &format!("/api/sessions/{}/commit", id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["saved"], json!(true));
        assert_eq!(body["notice"]["level"], json!("success"));
        assert_eq!(body["session"]["editState"], json!("clean"));

        assert_eq!(
            service.persisted(),
            vec![(key("driver-1", "2024-06-01"), ids(&["B", "A", "C"]))]
        );
        assert_eq!(
            events.try_recv().expect("event"),
            ChangeEvent::SequenceCommitted {
                assignee_id: "driver-1".to_string(),
                date: key("driver-1", "2024-06-01").date,
            }
        );
    }

    #[tokio::test]
    async fn cross_boundary_move_returns_conflict_with_notice() {
        let (router, _) = app(seeded());
        let id = loaded_session(&router).await;

        let (status, body) = call(
            &router,
            Method::POST,
            &format!("/api/sessions/{}/move", id),
            Some(json!({ "index": 1, "direction": "down" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], json!("constraint_violation"));
        assert_eq!(body["notice"]["level"], json!("warning"));
        assert_eq!(body["notice"]["transient"], json!(true));

        let (_, body) = call(&router, Method::GET, &format!("/api/sessions/{}", id), None).await;
        assert_eq!(body["editState"], json!("clean"));
        assert_eq!(body["items"][2]["id"], json!("C"));
    }

    #[tokio::test]
    async fn clean_commit_makes_no_backend_call() {
        let service = seeded();
        let (router, _) = app(service.clone());
        let id = loaded_session(&router).await;

        let (status, body) = call(
            &router,
            Method::POST,
            &format!("/api/sessions/{}/commit", id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["saved"], json!(false));
        assert!(body.get("notice").is_none());
        assert!(service.persisted().is_empty());
    }

    #[tokio::test]
    async fn failed_commit_keeps_session_dirty() {
        let service = seeded();
        let (router, _) = app(service.clone());
        let id = loaded_session(&router).await;
        call(
            &router,
            Method::POST,
            &format!("/api/sessions/{}/move", id),
            Some(json!({ "index": 0, "direction": "down" })),
        )
        .await;

        service.fail_next_persist();
        let (status, body) = call(
            &router,
            Method::POST,
            &format!("/api/sessions/{}/commit", id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], json!("commit_error"));
        assert_eq!(body["notice"]["transient"], json!(false));

        let (_, body) = call(&router, Method::GET, &format!("/api/sessions/{}", id), None).await;
        assert_eq!(body["editState"], json!("dirty"));
        assert_eq!(body["phase"], json!("ready"));
    }

    #[tokio::test]
    async fn failed_load_disables_reordering() {
        let service = seeded();
        let (router, _) = app(service.clone());
        let (_, body) = call(&router, Method::POST, "/api/sessions", None).await;
        let id = body["id"].as_u64().expect("id");

        service.fail_next_fetch();
        let (status, body) = call(
            &router,
            Method::POST,
            &format!("/api/sessions/{}/load", id),
            Some(json!({ "assigneeId": "driver-1", "date": "2024-06-01" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], json!("load_error"));

        let (_, body) = call(&router, Method::GET, &format!("/api/sessions/{}", id), None).await;
        assert_eq!(body["canReorder"], json!(false));
        assert_eq!(body["phase"], json!("unloaded"));
    }

    #[tokio::test]
    async fn sessions_are_independent_and_closable() {
        let (router, _) = app(seeded());
        let first = loaded_session(&router).await;
        let second = loaded_session(&router).await;
        assert_ne!(first, second);

        call(
            &router,
            Method::POST,
            &format!("/api/sessions/{}/move", first),
            Some(json!({ "index": 1, "direction": "up" })),
        )
        .await;
        let (_, body) = call(&router, Method::GET, &format!("/api/sessions/{}", second), None).await;
        assert_eq!(body["editState"], json!("clean"));

        let (status, _) = call(
            &router,
            Method::DELETE,
            &format!("/api/sessions/{}", first),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, body) = call(&router, Method::GET, &format!("/api/sessions/{}", first), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], json!("unknown_session"));
    }

    async fn wait_for_phase(router: &Router, id: u64, phase: &str) -> Value {
        for _ in 0..100 {
            let (_, body) =
                call(router, Method::GET, &format!("/api/sessions/{}", id), None).await;
            if body["phase"] == json!(phase) {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("session {} never reached phase {}", id, phase);
    }

    #[tokio::test]
    async fn commit_completes_after_request_is_dropped() {
        let service = Arc::new(HeldService::default());
        service
            .inner
            .insert(
                key("driver-1", "2024-06-01"),
                items(&[("A", true), ("B", true), ("C", false)]),
            )
            .expect("insert");
        service.hold_persist.store(true, Ordering::SeqCst);
        let (router, _) = app(service.clone());
        let id = loaded_session(&router).await;
        call(
            &router,
            Method::POST,
            &format!("/api/sessions/{}/move", id),
            Some(json!({ "index": 1, "direction": "up" })),
        )
        .await;

        let commit_uri = format!("/api/sessions/{}/commit", id);
        let commit = call(&router, Method::POST, &commit_uri, None);
        assert!(
            tokio::time::timeout(Duration::from_millis(50), commit)
                .await
                .is_err()
        );

        service.persist_release.notify_one();
        let body = wait_for_phase(&router, id, "ready").await;
        assert_eq!(body["editState"], json!("clean"));
        assert_eq!(
            service.inner.persisted(),
            vec![(key("driver-1", "2024-06-01"), ids(&["B", "A", "C"]))]
        );

        let (status, _) = call(
            &router,
            Method::POST,
            &format!("/api/sessions/{}/move", id),
            Some(json!({ "index": 0, "direction": "down" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn superseded_load_reports_not_applied() {
        let service = Arc::new(HeldService::default());
        service
            .inner
            .insert(key("driver-1", "2024-06-01"), items(&[("old", false)]))
            .expect("insert");
        service
            .inner
            .insert(
                key("driver-2", "2024-06-01"),
                items(&[("new-1", true), ("new-2", false)]),
            )
            .expect("insert");
        *service.hold_fetch_for.lock().expect("hold lock") = Some("driver-1".to_string());
        let (router, _) = app(service.clone());
        let (_, body) = call(&router, Method::POST, "/api/sessions", None).await;
        let id = body["id"].as_u64().expect("id");

        let first = {
            let router = router.clone();
            tokio::spawn(async move {
                call(
                    &router,
                    Method::POST,
                    &format!("/api/sessions/{}/load", id),
                    Some(json!({ "assigneeId": "driver-1", "date": "2024-06-01" })),
                )
                .await
            })
        };
        for _ in 0..100 {
            if !service.inner.fetches().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(service.inner.fetches().len(), 1);

        let (status, body) = call(
            &router,
            Method::POST,
            &format!("/api/sessions/{}/load", id),
            Some(json!({ "assigneeId": "driver-2", "date": "2024-06-01" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["applied"], json!(true));

        service.fetch_release.notify_one();
        let (status, body) = first.await.expect("first load");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["applied"], json!(false));
        assert_eq!(body["session"]["key"]["assigneeId"], json!("driver-2"));
        assert_eq!(body["session"]["items"][0]["id"], json!("new-1"));
        assert_eq!(body["session"]["phase"], json!("ready"));
    }
}
