//! Markdown report generation

use super::EvaluationReport;

/// Markdown report generator
pub struct MarkdownReporter;

impl MarkdownReporter {
    /// Generate a Markdown report
    pub fn generate(report: &EvaluationReport) -> String {
        let mut md = String::new();

        md.push_str("# Gauntlet Evaluation Report\n\n");

        md.push_str("## Overview\n\n");
        md.push_str(&format!("- **Session**: `{}`\n", report.session_id));
        md.push_str(&format!("- **Status**: {}\n", report.status));
        md.push_str(&format!(
            "- **Started**: {}\n",
            report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        md.push_str(&format!(
            "- **Generated**: {}\n",
            report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        md.push_str(&format!("- **Scenarios per model**: {}\n\n", report.total_scenarios));

        md.push_str("## Summary\n\n");
        md.push_str("| Metric | Value |\n|--------|-------|\n");
        md.push_str(&format!(
            "| Models evaluated | {}/{} |\n",
            report.completed_models, report.total_models
        ));
        md.push_str(&format!("| Passed | {} |\n", report.successful_models));
        md.push_str(&format!("| Failed | {} |\n", report.failed_models));
        md.push_str(&format!("| Skipped | {} |\n", report.skipped_models));
        md.push_str(&format!(
            "| Overall success rate | {:.1}% |\n",
            report.overall_success_rate * 100.0
        ));
        md.push_str(&format!("| Errors logged | {} |\n\n", report.error_count));

        md.push_str("## Models\n\n");
        md.push_str("| Model | Status | Success Rate | Tasks | Avg Latency | Timeouts | Crashes | Retries | Duration |\n");
        md.push_str("|-------|--------|--------------|-------|-------------|----------|---------|---------|----------|\n");

        for model in &report.models {
            let status_emoji = match model.status_label() {
                "PASS" => "✅",
                "SKIP" => "⏭️",
                _ => "❌",
            };
            md.push_str(&format!(
                "| {} | {} | {:.1}% | {}/{} | {:.0}ms | {} | {} | {} | {:.1}s |\n",
                model.display_name,
                status_emoji,
                model.average_success_rate * 100.0,
                model.task_successes,
                model.scenarios_run,
                model.average_latency_ms,
                model.timeouts,
                model.crashes,
                model.retry_count,
                model.total_duration_ms as f64 / 1000.0
            ));
        }
        md.push('\n');

        let failed: Vec<_> = report
            .models
            .iter()
            .filter(|m| !m.success && !m.skipped)
            .collect();
        if !failed.is_empty() {
            md.push_str("## Failed Models\n\n");
            for model in failed {
                md.push_str(&format!("### {}\n\n", model.display_name));
                md.push_str(&format!("- **Scenarios run**: {}\n", model.scenarios_run));
                md.push_str(&format!("- **Timeouts**: {}\n", model.timeouts));
                md.push_str(&format!("- **Crashes**: {}\n", model.crashes));
                md.push_str(&format!("- **Retries**: {}\n\n", model.retry_count));
            }
        }

        let skipped: Vec<_> = report.models.iter().filter(|m| m.skipped).collect();
        if !skipped.is_empty() {
            md.push_str("## Skipped Models\n\n");
            for model in skipped {
                md.push_str(&format!(
                    "- **{}**: {}\n",
                    model.display_name,
                    model.skip_reason.as_deref().unwrap_or("no reason recorded")
                ));
            }
            md.push('\n');
        }

        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::test_support::sample_session;
    use gauntlet_session::SessionStatus;

    #[test]
    fn test_markdown_generation() {
        let report = EvaluationReport::from_session(&sample_session(), SessionStatus::Completed);
        let md = MarkdownReporter::generate(&report);

        assert!(md.contains("# Gauntlet Evaluation Report"));
        assert!(md.contains("| Passed | 1 |"));
        assert!(md.contains("## Failed Models"));
        assert!(md.contains("### gpt-4o"));
        assert!(md.contains("- **offline-model**: probe failed"));
    }
}
