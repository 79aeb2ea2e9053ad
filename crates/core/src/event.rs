//! Domain event system: decoupled notifications about conversation state.
//!
//! Events are published when the log or summary list changes, or when a
//! best-effort step fails quietly. Observers (history viewers, diagnostics)
//! subscribe without the engine knowing about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A turn was appended to the log
    TurnAppended {
        index: usize,
        failed: bool,
        timestamp: DateTime<Utc>,
    },

    /// A summary was appended
    SummaryCreated {
        round_number: u32,
        turns_covered: usize,
        timestamp: DateTime<Utc>,
    },

    /// Summary generation failed; a placeholder was recorded instead
    SummarizationFailed {
        round_number: u32,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// Screen capture or analysis failed; the send continued without it
    CaptureFailed {
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// A provider request failed
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
