//! Scenario and model results

use serde::{Deserialize, Serialize};

use super::Turn;
use crate::error::GauntletError;

/// Outcome of one scenario against one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// Scenario identifier
    pub scenario_id: String,

    /// Fraction of credited responses, in `[0, 1]`
    pub success_rate: f64,

    /// Mean latency of completed turns in milliseconds
    pub average_latency_ms: f64,

    /// Whether every response carried the expected task syntax
    pub task_execution_success: bool,

    /// A turn was rejected by the stall or overall timer
    pub timed_out: bool,

    /// The backend failed with a connection-class error
    pub crashed: bool,

    /// Errors recorded during the scenario
    #[serde(default)]
    pub errors: Vec<String>,

    /// Full conversation, scripted turns and model responses
    #[serde(default)]
    pub conversation_log: Vec<Turn>,
}

impl ScenarioResult {
    /// Create an empty result for a scenario
    pub fn new(scenario_id: impl Into<String>) -> Self {
        Self {
            scenario_id: scenario_id.into(),
            success_rate: 0.0,
            average_latency_ms: 0.0,
            task_execution_success: false,
            timed_out: false,
            crashed: false,
            errors: Vec::new(),
            conversation_log: Vec::new(),
        }
    }

    /// Record a scenario-level error, setting the timeout/crash flags it implies
    pub fn record_error(&mut self, error: &GauntletError) {
        if let Some(kind) = error.timeout_kind() {
            self.timed_out = true;
            self.errors.push(format!("[{}] {}", kind.tag(), error));
        } else if error.is_crash() {
            self.crashed = true;
            self.errors.push(format!("[crash] {}", error));
        } else {
            self.errors.push(error.to_string());
        }
        self.task_execution_success = false;
    }

    /// Apply a score while keeping the result invariants
    ///
    /// `task_execution_success` implies `success_rate == 1.0`, and is never set
    /// on a result that timed out or crashed.
    pub fn apply_score(&mut self, success_rate: f64, task_execution_success: bool) {
        self.success_rate = success_rate.clamp(0.0, 1.0);
        self.task_execution_success =
            task_execution_success && !self.timed_out && !self.crashed && self.success_rate >= 1.0;
        if self.task_execution_success {
            self.success_rate = 1.0;
        }
    }

    /// Whether the scenario ended without a timeout or crash
    pub fn completed_cleanly(&self) -> bool {
        !self.timed_out && !self.crashed
    }
}

/// Outcome of evaluating one model across the whole battery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResult {
    /// Model identifier
    pub model_id: String,

    /// The model finished its battery without timeouts or crashes
    pub success: bool,

    /// The model was skipped without running scenarios
    pub skipped: bool,

    /// Why the model was skipped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,

    /// Results of the last attempt only
    #[serde(default)]
    pub scenario_results: Vec<ScenarioResult>,

    /// Number of retries performed
    pub retry_count: u32,

    /// Wall-clock time spent on this model across all attempts
    pub total_duration_ms: u64,
}

impl ModelResult {
    /// Result for a model whose attempt ran every scenario
    pub fn completed(
        model_id: impl Into<String>,
        scenario_results: Vec<ScenarioResult>,
        retry_count: u32,
        total_duration_ms: u64,
    ) -> Self {
        let success = !scenario_results.is_empty()
            && scenario_results.iter().all(ScenarioResult::completed_cleanly);
        Self {
            model_id: model_id.into(),
            success,
            skipped: false,
            skip_reason: None,
            scenario_results,
            retry_count,
            total_duration_ms,
        }
    }

    /// Result for a model whose retries were exhausted
    pub fn failed(model_id: impl Into<String>, retry_count: u32, total_duration_ms: u64) -> Self {
        Self {
            model_id: model_id.into(),
            success: false,
            skipped: false,
            skip_reason: None,
            scenario_results: Vec::new(),
            retry_count,
            total_duration_ms,
        }
    }

    /// Result for a model that never ran
    pub fn skipped(model_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            success: false,
            skipped: true,
            skip_reason: Some(reason.into()),
            scenario_results: Vec::new(),
            retry_count: 0,
            total_duration_ms: 0,
        }
    }

    /// Mean success rate across scenarios
    pub fn average_success_rate(&self) -> f64 {
        if self.scenario_results.is_empty() {
            return 0.0;
        }
        self.scenario_results.iter().map(|r| r.success_rate).sum::<f64>()
            / self.scenario_results.len() as f64
    }

    /// Mean turn latency across scenarios that produced at least one response
    pub fn average_latency_ms(&self) -> f64 {
        let measured: Vec<f64> = self
            .scenario_results
            .iter()
            .filter(|r| r.average_latency_ms > 0.0)
            .map(|r| r.average_latency_ms)
            .collect();
        if measured.is_empty() {
            0.0
        } else {
            measured.iter().sum::<f64>() / measured.len() as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TimeoutKind;

    #[test]
    fn test_timeout_blocks_task_success() {
        let mut result = ScenarioResult::new("s1");
        result.record_error(&GauntletError::turn_timeout(TimeoutKind::Stall, 60_000));
        result.apply_score(1.0, true);

        assert!(result.timed_out);
        assert!(!result.task_execution_success);
        assert!(result.errors[0].starts_with("[stall]"));
    }

    #[test]
    fn test_task_success_requires_full_rate() {
        let mut result = ScenarioResult::new("s1");
        result.apply_score(0.5, true);
        assert!(!result.task_execution_success);

        result.apply_score(1.0, true);
        assert!(result.task_execution_success);
        assert_eq!(result.success_rate, 1.0);
    }

    #[test]
    fn test_crash_is_recorded() {
        let mut result = ScenarioResult::new("s1");
        result.record_error(&GauntletError::backend_crash("connection reset"));
        assert!(result.crashed);
        assert!(!result.timed_out);
    }

    #[test]
    fn test_model_result_success() {
        let clean = ScenarioResult::new("s1");
        let mut timed_out = ScenarioResult::new("s2");
        timed_out.timed_out = true;

        assert!(ModelResult::completed("m", vec![clean.clone()], 0, 10).success);
        assert!(!ModelResult::completed("m", vec![clean, timed_out], 0, 10).success);
        assert!(!ModelResult::completed("m", vec![], 0, 10).success);

        let skipped = ModelResult::skipped("m", "probe failed");
        assert!(skipped.skipped);
        assert_eq!(skipped.skip_reason.as_deref(), Some("probe failed"));
    }
}
