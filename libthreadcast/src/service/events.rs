//! Event system for composition progress
//!
//! An in-process bus built on `tokio::sync::broadcast`. The orchestrator
//! emits an event at each step of a save or schedule so any number of
//! observers (CLI output, a UI, audit logging) can follow along. Emitting
//! never blocks; with no subscribers the event is dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::ErrorKind;

/// Event receiver type alias
pub type EventReceiver = broadcast::Receiver<Event>;

/// Broadcast bus for composition events
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per lagging subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events emitted after this call
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: Event) {
        // Err only means nobody is listening
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Whether a composition writes a new post or an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComposeMode {
    Create,
    Update,
}

/// Events emitted by the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Validation passed and the write is about to be issued
    ComposeStarted {
        mode: ComposeMode,
        edit_ref: Option<String>,
        /// Number of raw events being submitted
        segments: usize,
    },

    /// The create or update call succeeded
    PostPersisted { post_id: String, draft: bool },

    /// The scheduling trigger accepted the post
    PostScheduled { post_id: String },

    /// A composition ended in error
    ComposeFailed {
        kind: ErrorKind,
        post_id: Option<String>,
        error: String,
    },
}
