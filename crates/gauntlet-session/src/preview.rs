//! Live preview side channel
//!
//! Mirrors the in-flight conversation and the partially streamed response
//! to observers. Nothing here is persisted; updates are best effort and a
//! failing observer never affects the evaluation or other observers.

use chrono::{DateTime, Utc};
use gauntlet_core::{ObserverId, ObserverSet, Turn};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Snapshot of the conversation currently being evaluated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivePreviewSnapshot {
    pub session_id: String,
    pub model_id: String,
    pub scenario_id: String,
    /// Zero-based index of the user turn in flight
    pub turn_index: usize,
    /// Completed turns so far, including the pending user message
    pub conversation: Vec<Turn>,
    /// Response text received so far for the pending turn
    pub partial_response: String,
    pub is_streaming: bool,
    pub updated_at: DateTime<Utc>,
}

impl LivePreviewSnapshot {
    pub fn new(
        session_id: impl Into<String>,
        model_id: impl Into<String>,
        scenario_id: impl Into<String>,
        turn_index: usize,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            model_id: model_id.into(),
            scenario_id: scenario_id.into(),
            turn_index,
            conversation: Vec::new(),
            partial_response: String::new(),
            is_streaming: false,
            updated_at: Utc::now(),
        }
    }
}

/// Fan-out of live preview snapshots
#[derive(Debug, Default)]
pub struct LivePreviewHub {
    observers: ObserverSet<LivePreviewSnapshot>,
    latest: Mutex<Option<LivePreviewSnapshot>>,
}

impl LivePreviewHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a preview observer
    pub fn subscribe<F>(&mut self, observer: F) -> ObserverId
    where
        F: Fn(&LivePreviewSnapshot) + Send + Sync + 'static,
    {
        self.observers.add(observer)
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }

    /// Deliver a snapshot to every observer once
    pub fn publish(&self, snapshot: LivePreviewSnapshot) {
        self.observers.notify(&snapshot);
        if let Ok(mut latest) = self.latest.lock() {
            *latest = Some(snapshot);
        }
    }

    /// Most recently published snapshot
    pub fn latest(&self) -> Option<LivePreviewSnapshot> {
        self.latest.lock().ok().and_then(|latest| latest.clone())
    }

    /// Forget the latest snapshot
    pub fn clear(&self) {
        if let Ok(mut latest) = self.latest.lock() {
            *latest = None;
        }
    }
}
