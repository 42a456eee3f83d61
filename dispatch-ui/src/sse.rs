//! Server-Sent Events stream and sequence file watcher.

use std::collections::BTreeSet;
use std::convert::Infallible;
use std::path::Path;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use chrono::NaiveDate;
use futures::stream::Stream;
use notify::{Event as NotifyEvent, EventKind, PollWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::state::{AppState, ChangeEvent};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SsePayload {
    #[serde(rename = "type")]
    event_type: &'static str,
    assignee_id: String,
    date: NaiveDate,
}

impl From<&ChangeEvent> for SsePayload {
    fn from(event: &ChangeEvent) -> Self {
        match event {
            ChangeEvent::SequenceCommitted { assignee_id, date } => SsePayload {
                event_type: "sequence_committed",
                assignee_id: assignee_id.clone(),
                date: *date,
            },
            ChangeEvent::SequenceChanged { assignee_id, date } => SsePayload {
                event_type: "sequence_changed",
                assignee_id: assignee_id.clone(),
                date: *date,
            },
        }
    }
}

/// SSE endpoint handler.
pub async fn events_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.event_tx.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("connected").data("{}"));

        loop {
            match rx.recv().await {
                Ok(change_event) => {
                    let payload = SsePayload::from(&change_event);
                    if let Ok(json) = serde_json::to_string(&payload) {
                        yield Ok(Event::default().event("change").data(json));
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "SSE client lagged, some events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

/// Start the sequence file watcher in a background task.
pub fn start_file_watcher(state: AppState) {
    tokio::spawn(async move {
        if let Err(e) = run_file_watcher(state).await {
            warn!(error = %e, "file watcher failed");
        }
    });
}

async fn run_file_watcher(state: AppState) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::channel::<NotifyEvent>(100);

    let mut watcher = PollWatcher::new(
        move |res: Result<NotifyEvent, notify::Error>| {
            if let Ok(event) = res {
                let _ = tx.try_send(event);
            }
        },
        notify::Config::default().with_poll_interval(Duration::from_millis(250)),
    )?;

    let sequences_dir = state.sequences_dir();
    std::fs::create_dir_all(&sequences_dir)?;
    watcher.watch(&sequences_dir, RecursiveMode::Recursive)?;
    info!(path = %sequences_dir.display(), "watching sequences directory");

    // Batch events so one atomic write (temp file + rename) yields one change.
    let mut pending_events: Vec<NotifyEvent> = Vec::new();
    let mut flush_tick = tokio::time::interval(Duration::from_millis(100));
    flush_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            Some(event) = rx.recv() => {
                pending_events.push(event);
            }
            _ = flush_tick.tick() => {
                if pending_events.is_empty() {
                    continue;
                }
                process_events(&state, &pending_events);
                pending_events.clear();
            }
        }
    }
}

fn process_events(state: &AppState, events: &[NotifyEvent]) {
    let sequences_dir = state.sequences_dir();
    let mut changed: BTreeSet<(String, NaiveDate)> = BTreeSet::new();

    for event in events {
        if !matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) {
            continue;
        }
        for path in &event.paths {
            if let Some(key) = parse_sequence_path(&sequences_dir, path) {
                changed.insert(key);
            }
        }
    }

    for (assignee_id, date) in changed {
        debug!(assignee_id = %assignee_id, date = %date, "broadcasting sequence change");
        let _ = state
            .event_tx
            .send(ChangeEvent::SequenceChanged { assignee_id, date });
    }
}

/// Map `<sequences_dir>/<assignee>/<YYYY-MM-DD>.json` to its key parts.
fn parse_sequence_path(sequences_dir: &Path, path: &Path) -> Option<(String, NaiveDate)> {
    let rel = path.strip_prefix(sequences_dir).ok()?;
    let mut components = rel.components();

    let assignee_id = components.next()?.as_os_str().to_str()?.to_string();
    let file_name = components.next()?.as_os_str().to_str()?;
    if components.next().is_some() {
        return None;
    }
    let date = file_name.strip_suffix(".json")?.parse::<NaiveDate>().ok()?;

    Some((assignee_id, date))
}
