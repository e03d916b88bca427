//! Task-marker scoring of agent responses
//!
//! When any response of a scenario uses task syntax, scoring is strict: a
//! response earns credit only if it carries a marker and mentions one of
//! the hints its user turn declared. Without any marker in the scenario,
//! substantive non-error responses earn half credit and the scenario can
//! never count as a task execution success.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Closed set of task-syntax markers, matched case-insensitively
pub const TASK_MARKERS: &[&str] = &["<task>", "[TASK]", "```task", "@task("];

/// Minimum non-whitespace characters of a substantive response
pub const MIN_SUBSTANTIVE_CHARS: usize = 20;

/// Credit granted per substantive response in lenient mode
pub const LENIENT_CREDIT: f64 = 0.5;

/// Response openings that mark an error reply
const ERROR_PREFIXES: &[&str] = &["error", "[error", "failed to", "exception", "traceback"];

static TASK_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives: Vec<String> = TASK_MARKERS.iter().map(|m| regex::escape(m)).collect();
    Regex::new(&format!("(?i){}", alternatives.join("|"))).expect("task marker pattern is valid")
});

/// Whether the text contains a task marker
pub fn has_task_marker(text: &str) -> bool {
    TASK_MARKER_RE.is_match(text)
}

/// Whether a response counts as a real answer in lenient mode
pub fn is_substantive(text: &str) -> bool {
    let trimmed = text.trim_start().to_lowercase();
    if ERROR_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
        return false;
    }
    text.chars().filter(|c| !c.is_whitespace()).count() >= MIN_SUBSTANTIVE_CHARS
}

/// Scoring path taken for a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMode {
    Strict,
    Lenient,
}

/// One response with the hints of the user turn it answers
#[derive(Debug, Clone, Copy)]
pub struct ScoredResponse<'a> {
    pub text: &'a str,
    pub hints: &'a [String],
}

impl ScoredResponse<'_> {
    fn mentions_hint(&self) -> bool {
        if self.hints.is_empty() {
            return true;
        }
        let text = self.text.to_lowercase();
        self.hints.iter().any(|h| text.contains(&h.to_lowercase()))
    }
}

/// Outcome of scoring a scenario's responses
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub mode: ScoringMode,
    pub success_rate: f64,
    pub task_execution_success: bool,
}

/// Score responses; unanswered turns are passed as empty text
pub fn score_responses(responses: &[ScoredResponse<'_>]) -> Score {
    if responses.is_empty() {
        return Score {
            mode: ScoringMode::Lenient,
            success_rate: 0.0,
            task_execution_success: false,
        };
    }

    let total = responses.len() as f64;
    if responses.iter().any(|r| has_task_marker(r.text)) {
        let credited = responses
            .iter()
            .filter(|r| has_task_marker(r.text) && r.mentions_hint())
            .count() as f64;
        let success_rate = credited / total;
        Score {
            mode: ScoringMode::Strict,
            success_rate,
            task_execution_success: success_rate >= 1.0,
        }
    } else {
        let substantive = responses.iter().filter(|r| is_substantive(r.text)).count() as f64;
        Score {
            mode: ScoringMode::Lenient,
            success_rate: LENIENT_CREDIT * substantive / total,
            task_execution_success: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resp<'a>(text: &'a str, hints: &'a [String]) -> ScoredResponse<'a> {
        ScoredResponse { text, hints }
    }

    #[test]
    fn test_marker_detection_is_case_insensitive() {
        assert!(has_task_marker("Sure. <TASK>deploy</TASK>"));
        assert!(has_task_marker("[task] rotate logs"));
        assert!(has_task_marker("```Task\nrun\n```"));
        assert!(has_task_marker("@TASK(cleanup)"));
        assert!(!has_task_marker("I would run the task now"));
    }

    #[test]
    fn test_strict_mode_requires_marker_and_hint() {
        let hints = vec!["backup".to_string()];
        let none: Vec<String> = Vec::new();
        let responses = [
            resp("<task>create backup of db</task>", &hints),
            resp("<task>restart service</task>", &hints),
            resp("no marker but backup mentioned", &hints),
            resp("<task>anything</task>", &none),
        ];

        let score = score_responses(&responses);
        assert_eq!(score.mode, ScoringMode::Strict);
        assert_eq!(score.success_rate, 0.5);
        assert!(!score.task_execution_success);
    }

    #[test]
    fn test_strict_mode_full_credit() {
        let none: Vec<String> = Vec::new();
        let score = score_responses(&[resp("<task>a</task>", &none), resp("[TASK] b", &none)]);
        assert_eq!(score.success_rate, 1.0);
        assert!(score.task_execution_success);
    }

    #[test]
    fn test_lenient_mode_half_credit() {
        let none: Vec<String> = Vec::new();
        let responses = [
            resp("Here is a detailed plan for the migration.", &none),
            resp("Error: model crashed while generating output", &none),
            resp("ok", &none),
            resp("", &none),
        ];

        let score = score_responses(&responses);
        assert_eq!(score.mode, ScoringMode::Lenient);
        assert_eq!(score.success_rate, 0.125);
        assert!(!score.task_execution_success);
    }

    #[test]
    fn test_no_responses() {
        let score = score_responses(&[]);
        assert_eq!(score.success_rate, 0.0);
        assert!(!score.task_execution_success);
    }
}
