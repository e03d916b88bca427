//! Report generation for evaluation sessions
//!
//! Aggregates a session into an [`EvaluationReport`] and renders it as JSON,
//! Markdown, or a plain terminal table.

mod json;
mod markdown;

pub use json::JsonReporter;
pub use markdown::MarkdownReporter;

use chrono::{DateTime, Utc};
use gauntlet_core::{GauntletResult, ModelResult, ReportFormat};
use gauntlet_session::{EvaluationSession, SessionStatus};
use serde::{Deserialize, Serialize};

/// Per-model aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub model_id: String,
    pub display_name: String,
    pub success: bool,
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    pub scenarios_run: usize,
    pub average_success_rate: f64,
    pub average_latency_ms: f64,
    pub task_successes: usize,
    pub timeouts: usize,
    pub crashes: usize,
    pub retry_count: u32,
    pub total_duration_ms: u64,
}

impl ModelSummary {
    fn from_result(result: &ModelResult, display_name: &str) -> Self {
        let scenarios = &result.scenario_results;
        Self {
            model_id: result.model_id.clone(),
            display_name: display_name.to_string(),
            success: result.success,
            skipped: result.skipped,
            skip_reason: result.skip_reason.clone(),
            scenarios_run: scenarios.len(),
            average_success_rate: result.average_success_rate(),
            average_latency_ms: result.average_latency_ms(),
            task_successes: scenarios.iter().filter(|s| s.task_execution_success).count(),
            timeouts: scenarios.iter().filter(|s| s.timed_out).count(),
            crashes: scenarios.iter().filter(|s| s.crashed).count(),
            retry_count: result.retry_count,
            total_duration_ms: result.total_duration_ms,
        }
    }

    /// Short status label
    pub fn status_label(&self) -> &'static str {
        if self.skipped {
            "SKIP"
        } else if self.success {
            "PASS"
        } else {
            "FAIL"
        }
    }
}

/// Aggregate report of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub session_id: String,
    pub status: SessionStatus,
    pub generated_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub total_models: usize,
    pub completed_models: usize,
    pub successful_models: usize,
    pub failed_models: usize,
    pub skipped_models: usize,
    pub total_scenarios: usize,
    pub overall_success_rate: f64,
    pub error_count: usize,
    pub models: Vec<ModelSummary>,
}

impl EvaluationReport {
    /// Build a report from a session, labelled with `status`
    pub fn from_session(session: &EvaluationSession, status: SessionStatus) -> Self {
        let models: Vec<ModelSummary> = session
            .models
            .iter()
            .filter_map(|model| {
                session
                    .result_for(&model.id)
                    .map(|result| ModelSummary::from_result(result, &model.display_name))
            })
            .collect();

        let evaluated: Vec<&ModelSummary> = models.iter().filter(|m| !m.skipped).collect();
        let overall_success_rate = if evaluated.is_empty() {
            0.0
        } else {
            evaluated.iter().map(|m| m.average_success_rate).sum::<f64>() / evaluated.len() as f64
        };

        Self {
            session_id: session.session_id.clone(),
            status,
            generated_at: Utc::now(),
            started_at: session.created_at,
            total_models: session.models.len(),
            completed_models: models.len(),
            successful_models: models.iter().filter(|m| m.success).count(),
            failed_models: models.iter().filter(|m| !m.success && !m.skipped).count(),
            skipped_models: models.iter().filter(|m| m.skipped).count(),
            total_scenarios: session.scenarios.len(),
            overall_success_rate,
            error_count: session.error_log.len(),
            models,
        }
    }
}

/// File name of a rendered report inside the session directory
pub fn report_file_name(format: ReportFormat) -> String {
    format!("report.{}", format.extension())
}

/// Render a report in the given format
pub fn generate_report(report: &EvaluationReport, format: ReportFormat) -> GauntletResult<String> {
    match format {
        ReportFormat::Json => JsonReporter::generate(report),
        ReportFormat::Markdown => Ok(MarkdownReporter::generate(report)),
    }
}

/// Render a plain table for terminal output
pub fn generate_table(report: &EvaluationReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("\n{:=<78}\n", "= Gauntlet Evaluation Results "));
    output.push_str(&format!(
        "Session: {} | Status: {}\n",
        report.session_id, report.status
    ));
    output.push_str(&format!(
        "Models: {}/{} done ({} pass, {} fail, {} skip) | Scenarios: {}\n",
        report.completed_models,
        report.total_models,
        report.successful_models,
        report.failed_models,
        report.skipped_models,
        report.total_scenarios
    ));
    output.push_str(&format!("{:=<78}\n", ""));
    output.push_str(&format!(
        "{:<28} {:>6} {:>8} {:>10} {:>6} {:>6} {:>7}\n",
        "Model", "Status", "Rate", "Latency", "T/O", "Crash", "Retry"
    ));
    output.push_str(&format!("{:-<78}\n", ""));

    for model in &report.models {
        let name = if model.display_name.chars().count() > 26 {
            let truncated: String = model.display_name.chars().take(23).collect();
            format!("{}...", truncated)
        } else {
            model.display_name.clone()
        };
        output.push_str(&format!(
            "{:<28} {:>6} {:>7.1}% {:>8.0}ms {:>6} {:>6} {:>7}\n",
            name,
            model.status_label(),
            model.average_success_rate * 100.0,
            model.average_latency_ms,
            model.timeouts,
            model.crashes,
            model.retry_count
        ));
    }

    output.push_str(&format!("{:=<78}\n", ""));
    output
}


#[cfg(test)]
mod tests {
    use super::test_support::sample_session;
    use super::*;

    #[test]
    fn test_report_aggregates() {
        let session = sample_session();
        let report = EvaluationReport::from_session(&session, SessionStatus::Completed);

        assert_eq!(report.total_models, 3);
        assert_eq!(report.completed_models, 3);
        assert_eq!(report.successful_models, 1);
        assert_eq!(report.failed_models, 1);
        assert_eq!(report.skipped_models, 1);
        assert_eq!(report.overall_success_rate, 0.75);

        let gpt = report.models.iter().find(|m| m.model_id == "gpt-4o").unwrap();
        assert_eq!(gpt.timeouts, 1);
        assert_eq!(gpt.retry_count, 1);
        assert_eq!(gpt.status_label(), "FAIL");
    }

    #[test]
    fn test_table_lists_every_model() {
        let report = EvaluationReport::from_session(&sample_session(), SessionStatus::Cancelled);
        let table = generate_table(&report);

        assert!(table.contains("Status: cancelled"));
        assert!(table.contains("offline-model"));
        assert!(table.contains("SKIP"));
        assert_eq!(report_file_name(ReportFormat::Markdown), "report.md");
    }
}
