/// Task change feed (SSE)
///
/// Pushes a notification whenever one of the caller's tasks is inserted,
/// updated or deleted. Events carry ids only; clients refetch the list.
///
/// # Endpoint
///
/// `GET /v1/tasks/changes`
///
/// # SSE Event Format
///
/// ```text
/// event: subscribed
/// data: 8c6c3b1a-6f5e-4d7a-9d6b-2f9a3c1e5b7d
///
/// event: change
/// data: {"kind":"insert","task_id":"...","user_id":"..."}
///
/// event: resync
/// data: 12
/// ```
///
/// `resync` means the subscriber fell behind and dropped that many events;
/// the client should refetch.
///
/// # Example
///
/// ```bash
/// curl -N -H "Authorization: Bearer <token>" http://localhost:8080/v1/tasks/changes
/// ```

use crate::{app::AppState, middleware::session::CurrentSession};
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    Stream, StreamExt as _,
};
use worklog_shared::events::ChangeEvent;

/// Keep-alive comment interval
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(25);

/// Stream change events for the caller's tasks
///
/// # Errors
///
/// - 401 Unauthorized: Missing or invalid session
pub async fn task_changes(
    State(state): State<AppState>,
    CurrentSession(auth): CurrentSession,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let user_id = auth.user_id;

    // Subscribe before announcing so nothing published in between is lost
    let receiver = state.changes.subscribe();

    tracing::info!(
        user_id = %user_id,
        subscribers = state.changes.subscriber_count(),
        "Change feed subscribed"
    );

    let subscribed = Event::default()
        .event("subscribed")
        .data(user_id.to_string());

    let updates = BroadcastStream::new(receiver).filter_map(move |item| match item {
        Ok(event) if event.user_id == user_id => change_event(&event),
        Ok(_) => None,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(user_id = %user_id, skipped, "Change feed subscriber lagged");
            Some(Event::default().event("resync").data(skipped.to_string()))
        }
    });

    let stream = tokio_stream::once(subscribed)
        .chain(updates)
        .map(Ok::<_, Infallible>);

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}

fn change_event(event: &ChangeEvent) -> Option<Event> {
    match event.to_payload() {
        Ok(payload) => Some(Event::default().event("change").data(payload)),
        Err(e) => {
            tracing::warn!(error = %e, task_id = %event.task_id, "Dropping unencodable change event");
            None
        }
    }
}
