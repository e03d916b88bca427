//! Evaluation session data structures
//!
//! Defines the durable unit of state for a run:
//! - EvaluationSession: models, scenarios, progress markers and results
//! - SessionStatus: lifecycle with resume transitions
//! - ErrorRecord: entries of the session error log
//! - SessionSummary: lightweight info for listing
//! - ConversationSnapshot: per-turn conversation documents

use chrono::{DateTime, Utc};
use gauntlet_core::{ModelResult, ModelUnderTest, RunConfig, Scenario, Turn};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Paused,
    Completed,
    Cancelled,
    Error,
}

impl SessionStatus {
    /// Whether a session in this status can be resumed
    pub fn is_resumable(&self) -> bool {
        !matches!(self, SessionStatus::Completed)
    }

    /// Whether moving to `next` is allowed
    ///
    /// Statuses only move forward, except resuming a paused, cancelled or
    /// failed session back to `running`.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        if *self == next {
            return true;
        }
        match (self, next) {
            (Running, Paused | Completed | Cancelled | Error) => true,
            (Paused, Running | Cancelled | Error) => true,
            (Cancelled, Running) => true,
            (Error, Running) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Running => "running",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Entry of the session error log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_id: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn new(model_id: impl Into<String>, scenario_id: Option<String>, message: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            scenario_id,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Durable state of one evaluation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationSession {
    /// Unique session identifier
    pub session_id: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,

    /// Current lifecycle status
    pub status: SessionStatus,

    /// Models in run order
    pub models: Vec<ModelUnderTest>,

    /// Scenario battery in run order
    pub scenarios: Vec<Scenario>,

    /// Models that reached a terminal result, in completion order
    #[serde(default)]
    pub completed_model_ids: Vec<String>,

    /// Model being evaluated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_model_id: Option<String>,

    /// Scenario being evaluated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_scenario_id: Option<String>,

    /// Results of completed models
    #[serde(default)]
    pub partial_results: Vec<ModelResult>,

    /// Errors recorded during the run
    #[serde(default)]
    pub error_log: Vec<ErrorRecord>,

    /// Timeout and retry settings the run was started with
    pub config: RunConfig,
}

impl EvaluationSession {
    /// Create a running session with a generated id
    pub fn new(models: Vec<ModelUnderTest>, scenarios: Vec<Scenario>, config: RunConfig) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            status: SessionStatus::Running,
            models,
            scenarios,
            completed_model_ids: Vec::new(),
            current_model_id: None,
            current_scenario_id: None,
            partial_results: Vec::new(),
            error_log: Vec::new(),
            config,
        }
    }

    /// Update the modified timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Whether a model already has a terminal result
    pub fn is_model_completed(&self, model_id: &str) -> bool {
        self.completed_model_ids.iter().any(|id| id == model_id)
    }

    /// Models without a terminal result, in run order
    pub fn remaining_models(&self) -> Vec<ModelUnderTest> {
        self.models
            .iter()
            .filter(|m| !self.is_model_completed(&m.id))
            .cloned()
            .collect()
    }

    /// Record a terminal model result
    ///
    /// Returns `false` and leaves the session untouched if the model already
    /// has a result.
    pub fn record_model_result(&mut self, result: ModelResult) -> bool {
        if self.is_model_completed(&result.model_id) {
            return false;
        }
        if self.current_model_id.as_deref() == Some(result.model_id.as_str()) {
            self.current_model_id = None;
            self.current_scenario_id = None;
        }
        self.completed_model_ids.push(result.model_id.clone());
        self.partial_results.push(result);
        self.touch();
        true
    }

    /// Move to a new status if the transition is allowed
    pub fn transition(&mut self, next: SessionStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        if next != SessionStatus::Running {
            self.current_scenario_id = None;
        }
        self.touch();
        true
    }

    /// Result recorded for a model
    pub fn result_for(&self, model_id: &str) -> Option<&ModelResult> {
        self.partial_results.iter().find(|r| r.model_id == model_id)
    }

    /// Lightweight summary for listings
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id.clone(),
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            total_models: self.models.len(),
            completed_models: self.completed_model_ids.len(),
            total_scenarios: self.scenarios.len(),
            error_count: self.error_log.len(),
        }
    }
}

/// Session info for listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub total_models: usize,
    pub completed_models: usize,
    pub total_scenarios: usize,
    pub error_count: usize,
}

/// Conversation state after one turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSnapshot {
    pub model_id: String,
    pub scenario_id: String,
    /// Zero-based index of the user turn just answered
    pub turn_index: usize,
    pub conversation: Vec<Turn>,
    pub captured_at: DateTime<Utc>,
}
