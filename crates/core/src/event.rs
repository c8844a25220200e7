//! Progress events: the observational stream a research request emits.
//!
//! One event is published at each state transition of the research loop.
//! Subscribers (a CLI timeline, a streaming transport) only observe; nothing
//! flows back into the loop.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All progress events a research request can emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Search queries were produced for an iteration
    Generating {
        iteration: u32,
        queries: Vec<String>,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        rationale: String,
    },

    /// A fan-out finished
    Researching {
        iteration: u32,
        source_count: usize,
        sample_labels: Vec<String>,
        failed_tasks: usize,
    },

    /// A reflection produced a verdict
    Reflecting {
        loop_count: u32,
        is_sufficient: bool,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        knowledge_gap: String,
        follow_up_queries: Vec<String>,
    },

    /// Answer synthesis started
    Finalizing { summary_count: usize },

    /// An answer was produced
    Done { cited_sources: usize },

    /// The request ended without an answer
    Errored { kind: String, message: String },
}

impl ProgressEvent {
    /// Short name of the phase this event reports.
    pub fn phase(&self) -> &'static str {
        match self {
            Self::Generating { .. } => "generating",
            Self::Researching { .. } => "researching",
            Self::Reflecting { .. } => "reflecting",
            Self::Finalizing { .. } => "finalizing",
            Self::Done { .. } => "done",
            Self::Errored { .. } => "errored",
        }
    }
}

/// A broadcast-based event bus for progress events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<ProgressEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: ProgressEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ProgressEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
