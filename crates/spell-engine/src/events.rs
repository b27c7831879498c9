//! Pass event stream for observing execution progress.
//!
//! The engine reports lifecycle transitions through an [`EventSink`]. Sinks
//! are fire-and-forget from the engine's point of view: a failing sink never
//! fails a pass.

use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Error returned when an event could not be delivered.
#[derive(Debug, Clone)]
pub struct EventError {
    pub message: String,
}

impl EventError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The receiving end of the sink has gone away.
    pub fn channel_closed() -> Self {
        Self::new("event channel closed")
    }
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event delivery failed: {}", self.message)
    }
}

impl std::error::Error for EventError {}

/// Lifecycle events emitted while a pass executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PassEvent {
    /// A pass began over a compiled spell.
    #[serde(rename_all = "camelCase")]
    PassStarted { spell_id: String, pass_id: String },

    /// The pass drained: every node reached a terminal state.
    #[serde(rename_all = "camelCase")]
    PassCompleted {
        spell_id: String,
        pass_id: String,
        completed: usize,
        failed: usize,
    },

    /// A node's worker was dispatched.
    #[serde(rename_all = "camelCase")]
    NodeStarted { node_id: String, pass_id: String },

    /// A node reached COMPLETED, either by running its worker or from cache.
    #[serde(rename_all = "camelCase")]
    NodeCompleted {
        node_id: String,
        pass_id: String,
        from_cache: bool,
    },

    /// A node reached FAILED.
    #[serde(rename_all = "camelCase")]
    NodeFailed {
        node_id: String,
        pass_id: String,
        error: String,
    },

    /// A node surfaced a human-readable result through its display channel.
    #[serde(rename_all = "camelCase")]
    NodeDisplay {
        node_id: String,
        pass_id: String,
        message: String,
    },
}

/// Receives pass events from the engine.
pub trait EventSink: Send + Sync {
    fn send(&self, event: PassEvent) -> Result<(), EventError>;
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: PassEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// Sink that collects events into a vector, for tests and inspection.
#[derive(Debug, Default)]
pub struct VecEventSink {
    events: Mutex<Vec<PassEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every event received so far.
    pub fn events(&self) -> Vec<PassEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: PassEvent) -> Result<(), EventError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}
