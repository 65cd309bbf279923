use axum::{
    Router,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use futures::StreamExt;
use futures::stream::{self, Stream};
use std::{convert::Infallible, sync::Arc, time::Duration};
use tokio::sync::broadcast;
use tracing::warn;

use crate::events::NotificationEvent;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/events", get(sse_handler))
}

/// Relays bus events to the client, leading with a snapshot of the queue so
/// new subscribers can render current state without waiting for the next tick.
async fn sse_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.event_bus.subscribe();

    let catch_up = state
        .engine
        .snapshot()
        .await
        .map(|snapshot| as_sse(&NotificationEvent::QueueUpdated(snapshot)))
        .ok();

    let live = stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Ok(event) => Some((as_sse(&event), rx)),
            Err(broadcast::error::RecvError::Lagged(count)) => {
                warn!(skipped = count, "event subscriber lagged");

                Some((
                    Ok(Event::default().event("warning").data("Missed some events")),
                    rx,
                ))
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    });

    Sse::new(stream::iter(catch_up).chain(live))
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

fn as_sse(event: &NotificationEvent) -> Result<Event, Infallible> {
    let json = serde_json::to_string(event).unwrap_or_default();
    Ok(Event::default().data(json))
}
