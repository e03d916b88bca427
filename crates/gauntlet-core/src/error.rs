//! Error types for Gauntlet
//!
//! The taxonomy mirrors how far an error is allowed to travel:
//! - scenario-level errors (`TurnTimeout`, `BackendCrash`, `Backend`) are caught
//!   by the scenario executor and recorded in the scenario result
//! - model-level errors (`ScenarioLogic`, initialisation failures) escape the
//!   scenario and drive the orchestrator's retry loop
//! - `Availability` skips a model without retrying it
//! - `OrchestratorFatal` and `Storage` abort the run

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for Gauntlet operations
pub type GauntletResult<T> = Result<T, GauntletError>;

/// Which per-turn timer rejected a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutKind {
    /// No chunk arrived within the stall window
    Stall,
    /// The hard ceiling on total turn duration was reached
    Overall,
}

impl TimeoutKind {
    /// Short tag recorded in scenario errors
    pub fn tag(&self) -> &'static str {
        match self {
            TimeoutKind::Stall => "stall",
            TimeoutKind::Overall => "timeout",
        }
    }
}

impl fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Main error type for Gauntlet
#[derive(Error, Debug, Clone)]
pub enum GauntletError {
    /// Pre-flight availability probe failed
    #[error("Model '{model_id}' unavailable: {message}")]
    Availability { model_id: String, message: String },

    /// A turn was rejected by the stall or overall timer
    #[error("Turn {kind} after {elapsed_ms} ms")]
    TurnTimeout { kind: TimeoutKind, elapsed_ms: u64 },

    /// Network or connection-class backend failure
    #[error("Backend crashed: {0}")]
    BackendCrash(String),

    /// Backend reported an error that is not connection related
    #[error("Backend error: {0}")]
    Backend(String),

    /// Unexpected failure while executing a scenario
    #[error("Scenario logic error: {0}")]
    ScenarioLogic(String),

    /// Orchestration bookkeeping failed (report generation, session store)
    #[error("Fatal orchestration error: {0}")]
    OrchestratorFatal(String),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session persistence errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Operation was cancelled by a forced shutdown
    #[error("Operation was cancelled")]
    Cancelled,
}

/// Substrings that mark a backend failure as connection-class
const CRASH_MARKERS: &[&str] = &[
    "connection",
    "connect error",
    "network",
    "refused",
    "reset by peer",
    "broken pipe",
    "unexpected eof",
    "socket",
    "dns",
];

impl GauntletError {
    /// Create an availability error
    pub fn availability(model_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Availability {
            model_id: model_id.into(),
            message: message.into(),
        }
    }

    /// Create a turn timeout error
    pub fn turn_timeout(kind: TimeoutKind, elapsed_ms: u64) -> Self {
        Self::TurnTimeout { kind, elapsed_ms }
    }

    /// Create a backend crash error
    pub fn backend_crash(message: impl Into<String>) -> Self {
        Self::BackendCrash(message.into())
    }

    /// Create a scenario logic error
    pub fn scenario_logic(message: impl Into<String>) -> Self {
        Self::ScenarioLogic(message.into())
    }

    /// Create a fatal orchestration error
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::OrchestratorFatal(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Classify a raw backend failure message
    ///
    /// Connection-class failures become `BackendCrash`, everything else `Backend`.
    pub fn from_backend_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if CRASH_MARKERS.iter().any(|marker| lower.contains(marker)) {
            Self::BackendCrash(message)
        } else {
            Self::Backend(message)
        }
    }

    /// Timer that produced this error, if it is a turn timeout
    pub fn timeout_kind(&self) -> Option<TimeoutKind> {
        match self {
            Self::TurnTimeout { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether this is a connection-class backend failure
    pub fn is_crash(&self) -> bool {
        matches!(self, Self::BackendCrash(_))
    }

    /// Whether the scenario executor records this error instead of propagating it
    pub fn is_scenario_level(&self) -> bool {
        matches!(
            self,
            Self::TurnTimeout { .. } | Self::BackendCrash(_) | Self::Backend(_) | Self::Http(_)
        )
    }

    /// Whether this error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::OrchestratorFatal(_) | Self::Storage(_))
    }
}

impl From<std::io::Error> for GauntletError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for GauntletError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error.to_string())
    }
}

impl From<reqwest::Error> for GauntletError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_connect() || error.is_request() {
            Self::BackendCrash(error.to_string())
        } else {
            Self::Http(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_tags_are_distinguishable() {
        let stall = GauntletError::turn_timeout(TimeoutKind::Stall, 60_000);
        let overall = GauntletError::turn_timeout(TimeoutKind::Overall, 360_000);

        assert_eq!(stall.timeout_kind(), Some(TimeoutKind::Stall));
        assert_eq!(overall.timeout_kind(), Some(TimeoutKind::Overall));
        assert!(stall.to_string().contains("stall"));
        assert!(overall.to_string().contains("timeout"));
    }

    #[test]
    fn test_backend_message_classification() {
        assert!(GauntletError::from_backend_message("Connection refused (os error 111)").is_crash());
        assert!(GauntletError::from_backend_message("stream ended: unexpected EOF").is_crash());
        assert!(!GauntletError::from_backend_message("model returned 400: bad prompt").is_crash());
    }

    #[test]
    fn test_error_levels() {
        assert!(GauntletError::backend_crash("x").is_scenario_level());
        assert!(!GauntletError::scenario_logic("x").is_scenario_level());
        assert!(GauntletError::fatal("x").is_fatal());
        assert!(GauntletError::storage("disk full").is_fatal());
        assert!(!GauntletError::availability("m", "down").is_fatal());
    }
}
