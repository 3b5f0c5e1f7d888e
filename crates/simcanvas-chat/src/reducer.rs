//! Streaming update reducer.
//!
//! Turns inbound simulation frames into a single [`ChatUpdate`] so every frame
//! is at most one store transition. Malformed frames are logged and dropped.

use serde_json::Value;
use tracing::{debug, warn};

use simcanvas_core::simulation::Chapter;
use simcanvas_core::types::Message;

use crate::store::{ChatStore, ChatUpdate};

/// Error text stored when the connection itself fails.
pub const CONNECTION_ERROR: &str = "WebSocket connection error";

/// Lifecycle events of a streaming connection.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Opened,
    /// One inbound text frame.
    Frame(String),
    Error(String),
    Closed,
}

/// Build the update a frame stages, or `None` if it is unparseable or stages nothing.
pub fn reduce_frame(text: &str) -> Option<ChatUpdate> {
    let frame: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!(%e, "Error parsing stream frame");
            return None;
        }
    };
    let Some(frame) = frame.as_object() else {
        warn!("Ignoring non-object stream frame");
        return None;
    };

    let mut update = ChatUpdate::default();

    if let Some(progress) = frame.get("progress").and_then(Value::as_f64) {
        update.progress = Some(progress.round().clamp(0.0, 100.0) as u8);
    }

    if let Some(chapters) = frame.get("chapters").and_then(Value::as_array) {
        let messages = chapters
            .iter()
            .filter_map(|raw| match serde_json::from_value::<Chapter>(raw.clone()) {
                Ok(chapter) => Some(Message::chapter(chapter.number, chapter.content)),
                Err(e) => {
                    debug!(%e, "Skipping malformed chapter");
                    None
                }
            })
            .collect();
        update.messages = Some(messages);
        update.loading = Some(false);
    }

    if let Some(error) = frame.get("error").and_then(error_text) {
        update.error = Some(Some(error));
        update.loading = Some(false);
    }

    if update.is_empty() { None } else { Some(update) }
}

/// Null and empty strings mean "no error".
fn error_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Apply one frame to the store. Returns whether the store changed.
pub fn apply_frame(store: &mut ChatStore, text: &str) -> bool {
    match reduce_frame(text) {
        Some(update) => {
            store.batch_update(update);
            true
        }
        None => false,
    }
}

/// Apply a connection lifecycle event to the store.
pub fn apply_stream_event(store: &mut ChatStore, event: StreamEvent) {
    match event {
        StreamEvent::Opened => debug!("Stream opened"),
        StreamEvent::Frame(text) => {
            apply_frame(store, &text);
        }
        StreamEvent::Error(message) => {
            store.set_error(Some(message));
            store.set_loading(false);
        }
        StreamEvent::Closed => debug!("Stream closed"),
    }
}
