//! Evaluation configuration
//!
//! Timeouts, retry policy and output options for a run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::defaults;

/// The subset of configuration persisted with a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Per-turn timeout base in milliseconds
    pub timeout_ms: u64,

    /// Maximum retries per model
    pub max_retries: u32,

    /// Fixed delay between retries in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout_ms: defaults::TIMEOUT_MS,
            max_retries: defaults::MAX_RETRIES,
            retry_delay_ms: defaults::RETRY_DELAY_MS,
        }
    }
}

/// Report output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Json,
    Markdown,
}

impl ReportFormat {
    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(ReportFormat::Json),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            _ => None,
        }
    }

    /// File extension used when writing the report
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Markdown => "md",
        }
    }
}

/// Configuration for evaluation runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Per-turn timeout base in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum retries per model
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed delay between retries in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Window without chunks after which a turn is considered stalled
    #[serde(default = "default_stall_timeout_ms")]
    pub stall_timeout_ms: u64,

    /// Pause between models
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Upper bound on the availability probe of local models
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// System prompt template; `{role}` is replaced by the scenario agent role
    #[serde(default = "default_system_prompt")]
    pub system_prompt_template: String,

    /// Root directory for session documents
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Whether to write reports when a run finishes
    #[serde(default = "default_write_report")]
    pub write_report: bool,

    /// Report formats written at the end of a run
    #[serde(default = "default_report_formats")]
    pub report_formats: Vec<ReportFormat>,
}

fn default_timeout_ms() -> u64 {
    defaults::TIMEOUT_MS
}

fn default_max_retries() -> u32 {
    defaults::MAX_RETRIES
}

fn default_retry_delay_ms() -> u64 {
    defaults::RETRY_DELAY_MS
}

fn default_stall_timeout_ms() -> u64 {
    defaults::STALL_TIMEOUT_MS
}

fn default_cooldown_ms() -> u64 {
    defaults::COOLDOWN_MS
}

fn default_probe_timeout_ms() -> u64 {
    defaults::PROBE_TIMEOUT_MS
}

fn default_system_prompt() -> String {
    defaults::SYSTEM_PROMPT_TEMPLATE.to_string()
}

fn default_write_report() -> bool {
    true
}

fn default_report_formats() -> Vec<ReportFormat> {
    vec![ReportFormat::Json, ReportFormat::Markdown]
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            stall_timeout_ms: default_stall_timeout_ms(),
            cooldown_ms: default_cooldown_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            system_prompt_template: default_system_prompt(),
            output_dir: None,
            write_report: default_write_report(),
            report_formats: default_report_formats(),
        }
    }
}

impl EvalConfig {
    /// Build from a persisted run configuration, other fields at defaults
    pub fn from_run_config(run: RunConfig) -> Self {
        Self {
            timeout_ms: run.timeout_ms,
            max_retries: run.max_retries,
            retry_delay_ms: run.retry_delay_ms,
            ..Default::default()
        }
    }

    /// Replace the persisted part of the configuration
    pub fn apply_run_config(&mut self, run: &RunConfig) {
        self.timeout_ms = run.timeout_ms;
        self.max_retries = run.max_retries;
        self.retry_delay_ms = run.retry_delay_ms;
    }

    /// Set the per-turn timeout
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Set max retries
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set retry delay
    pub fn with_retry_delay_ms(mut self, ms: u64) -> Self {
        self.retry_delay_ms = ms;
        self
    }

    /// Set the stall window
    pub fn with_stall_timeout_ms(mut self, ms: u64) -> Self {
        self.stall_timeout_ms = ms;
        self
    }

    /// Set the inter-model cooldown
    pub fn with_cooldown_ms(mut self, ms: u64) -> Self {
        self.cooldown_ms = ms;
        self
    }

    /// Set the output directory
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Disable report writing
    pub fn without_report(mut self) -> Self {
        self.write_report = false;
        self
    }

    /// The part of the configuration persisted in the session
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            timeout_ms: self.timeout_ms,
            max_retries: self.max_retries,
            retry_delay_ms: self.retry_delay_ms,
        }
    }

    /// Stall window as a duration
    pub fn stall_window(&self) -> Duration {
        Duration::from_millis(self.stall_timeout_ms)
    }

    /// Hard ceiling for one turn: `max(3 × timeout, 3 minutes)`
    pub fn overall_turn_timeout(&self) -> Duration {
        let scaled = Duration::from_millis(self.timeout_ms.saturating_mul(3));
        scaled.max(Duration::from_millis(defaults::MIN_OVERALL_TURN_MS))
    }

    /// Delay between retries
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Pause between models
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Bound on the availability probe
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Render the system prompt for a scenario role
    pub fn system_prompt_for(&self, role: &str) -> String {
        self.system_prompt_template.replace("{role}", role)
    }

    /// Effective session root directory
    pub fn sessions_dir(&self) -> Option<PathBuf> {
        self.output_dir.clone().or_else(defaults::sessions_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EvalConfig::default();
        assert_eq!(config.timeout_ms, 120_000);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.retry_delay_ms, 1_000);
        assert_eq!(config.stall_timeout_ms, 60_000);
        assert!(config.write_report);
    }

    #[test]
    fn test_overall_turn_timeout_has_floor() {
        let short = EvalConfig::default().with_timeout_ms(10_000);
        assert_eq!(short.overall_turn_timeout(), Duration::from_secs(180));

        let long = EvalConfig::default().with_timeout_ms(120_000);
        assert_eq!(long.overall_turn_timeout(), Duration::from_secs(360));
    }

    #[test]
    fn test_run_config_round_trip() {
        let config = EvalConfig::default()
            .with_timeout_ms(5_000)
            .with_max_retries(4)
            .with_retry_delay_ms(250);
        let rebuilt = EvalConfig::from_run_config(config.run_config());
        assert_eq!(rebuilt.run_config(), config.run_config());
    }

    #[test]
    fn test_system_prompt_template() {
        let config = EvalConfig::default();
        let prompt = config.system_prompt_for("reviewer");
        assert!(prompt.contains("reviewer"));
        assert!(!prompt.contains("{role}"));
    }
}
