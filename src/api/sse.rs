//! Server-Sent Events for session changes

use crate::chat::SessionEvent;
use crate::conversation::TranscriptEntry;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Snapshot sent first on every new stream
#[derive(Debug, Clone)]
pub struct InitEvent {
    pub transcript: Vec<TranscriptEntry>,
    pub awaiting_response: bool,
}

/// Convert a session's broadcast channel into an SSE stream
pub fn sse_stream(
    init: InitEvent,
    broadcast_rx: tokio::sync::broadcast::Receiver<SessionEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init = futures::stream::once(async move { Ok(init_to_axum(init)) });

    let updates = BroadcastStream::new(broadcast_rx).filter_map(|result| match result {
        Ok(event) => Some(Ok(session_event_to_axum(event))),
        Err(_) => None, // Skip lagged messages
    });

    Sse::new(init.chain(updates)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn init_to_axum(init: InitEvent) -> Event {
    let data = json!({
        "type": "init",
        "transcript": init.transcript,
        "awaiting_response": init.awaiting_response,
    });
    Event::default().event("init").data(data.to_string())
}

fn session_event_to_axum(event: SessionEvent) -> Event {
    let (event_type, data) = event_payload(event);
    Event::default().event(event_type).data(data.to_string())
}

fn event_payload(event: SessionEvent) -> (&'static str, serde_json::Value) {
    match event {
        SessionEvent::Message { entry } => (
            "message",
            json!({
                "type": "message",
                "message": entry
            }),
        ),
        SessionEvent::Reset => ("reset", json!({ "type": "reset" })),
        SessionEvent::AwaitingChanged { awaiting } => (
            "awaiting",
            json!({
                "type": "awaiting",
                "awaiting_response": awaiting
            }),
        ),
    }
}
