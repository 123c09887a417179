//! Progress events emitted to the caller while a turn runs.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// One progress event of a turn, in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TurnEvent {
    /// Human-readable phase change ("Recognizing speech...").
    Status { message: String },
    /// What the recognizer heard.
    PartialTranscript { text: String },
    /// One generated fragment, forwarded as soon as it arrives.
    TextChunk { text: String },
    /// Generation finished; `text` is the full reply.
    GenerationComplete { text: String },
    /// The turn was aborted.
    Error { message: String },
}

impl TurnEvent {
    pub fn status(message: impl Into<String>) -> Self {
        TurnEvent::Status {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        TurnEvent::Error {
            message: message.into(),
        }
    }

    /// Serialize to a single-line JSON string.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialize from a JSON string.
    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

/// Receives turn events. Emission must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: TurnEvent);
}

impl EventSink for tokio::sync::mpsc::UnboundedSender<TurnEvent> {
    fn emit(&self, event: TurnEvent) {
        // A caller that stopped listening does not stop the turn
        if self.send(event).is_err() {
            tracing::trace!("event receiver closed");
        }
    }
}

/// Sink discarding every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: TurnEvent) {}
}

/// Sink collecting events in memory, for tests.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    events: Arc<Mutex<Vec<TurnEvent>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TurnEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: TurnEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}
