//! JSON report generation

use gauntlet_core::GauntletResult;

use super::EvaluationReport;

/// JSON report generator
pub struct JsonReporter;

impl JsonReporter {
    /// Generate a pretty-printed JSON report
    pub fn generate(report: &EvaluationReport) -> GauntletResult<String> {
        let json = serde_json::to_string_pretty(report)?;
        Ok(json)
    }

    /// Generate a single-line JSON report
    pub fn generate_compact(report: &EvaluationReport) -> GauntletResult<String> {
        let json = serde_json::to_string(report)?;
        Ok(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::test_support::sample_session;
    use gauntlet_session::SessionStatus;

    #[test]
    fn test_json_generation() {
        let report = EvaluationReport::from_session(&sample_session(), SessionStatus::Completed);
        let json = JsonReporter::generate(&report).unwrap();

        assert!(json.contains("\"status\": \"completed\""));
        assert!(json.contains("llama3"));

        let parsed: EvaluationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.models.len(), 3);
        assert!(!JsonReporter::generate_compact(&report).unwrap().contains('\n'));
    }
}
