//! Progress snapshot delivered to observers

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Phase of a run as seen by the progress tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressPhase {
    Idle,
    Running,
    Completed,
    Cancelled,
    Error,
}

impl ProgressPhase {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            ProgressPhase::Completed | ProgressPhase::Cancelled | ProgressPhase::Error
        )
    }
}

impl fmt::Display for ProgressPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProgressPhase::Idle => "idle",
            ProgressPhase::Running => "running",
            ProgressPhase::Completed => "completed",
            ProgressPhase::Cancelled => "cancelled",
            ProgressPhase::Error => "error",
        };
        f.write_str(s)
    }
}

/// Derived view of a run's progress; never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    pub phase: ProgressPhase,
    /// `floor((completed + current fraction) / total × 100)`
    pub global_progress_pct: u32,
    pub current_model: Option<String>,
    pub current_scenario: Option<String>,
    pub model_progress_pct: f64,
    pub scenario_progress_pct: f64,
    pub per_model: BTreeMap<String, f64>,
    pub total_models: usize,
    pub completed_models: usize,
    pub elapsed_secs: f64,
    /// `None` until a model finished evaluation
    pub estimated_remaining_secs: Option<f64>,
    pub success_count: usize,
    pub fail_count: usize,
    pub skip_count: usize,
    pub error_count: usize,
    pub is_cancellation_requested: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}
