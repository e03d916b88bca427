//! Run file describing models, backends and evaluation settings

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use super::EvalConfig;
use crate::error::{GauntletError, GauntletResult};
use crate::types::{ModelKind, ModelUnderTest};

/// Connection settings of an OpenAI-compatible endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL including the API version prefix, e.g. `http://localhost:11434/v1`
    pub base_url: String,

    /// Environment variable holding the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Sampling temperature sent with each request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl BackendConfig {
    /// Resolve the API key from the environment
    pub fn api_key(&self) -> Option<String> {
        self.api_key_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.is_empty())
    }
}

/// A model entry in the run file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Unique model identifier
    pub id: String,

    /// Human readable name (defaults to the id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Local or remote
    pub kind: ModelKind,

    /// Key into `backends`
    pub backend_ref: String,

    /// Name the backend knows the model by (defaults to the id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
}

impl ModelEntry {
    /// Model description used by the orchestrator
    pub fn to_model(&self) -> ModelUnderTest {
        ModelUnderTest::new(
            &self.id,
            self.display_name.clone().unwrap_or_else(|| self.id.clone()),
            self.kind,
            &self.backend_ref,
        )
    }

    /// Name sent to the backend
    pub fn remote_name(&self) -> &str {
        self.model_name.as_deref().unwrap_or(&self.id)
    }
}

/// Top-level run file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunFile {
    /// Evaluation settings
    #[serde(default)]
    pub evaluation: EvalConfig,

    /// Named backend endpoints
    #[serde(default)]
    pub backends: BTreeMap<String, BackendConfig>,

    /// Models to evaluate, in order
    #[serde(default)]
    pub models: Vec<ModelEntry>,

    /// Directory holding scenario files (built-in battery when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenarios_dir: Option<PathBuf>,
}

impl RunFile {
    /// Models in run order
    pub fn models_under_test(&self) -> Vec<ModelUnderTest> {
        self.models.iter().map(ModelEntry::to_model).collect()
    }

    /// Entries that use a given backend
    pub fn models_for_backend<'a>(&'a self, backend: &'a str) -> impl Iterator<Item = &'a ModelEntry> {
        self.models.iter().filter(move |m| m.backend_ref == backend)
    }

    /// Check ids are unique and every backend reference resolves
    pub fn validate(&self) -> GauntletResult<()> {
        let mut seen = HashSet::new();
        for model in &self.models {
            if !seen.insert(model.id.as_str()) {
                return Err(GauntletError::config(format!(
                    "duplicate model id '{}'",
                    model.id
                )));
            }
            if !self.backends.contains_key(&model.backend_ref) {
                return Err(GauntletError::config(format!(
                    "model '{}' references unknown backend '{}'",
                    model.id, model.backend_ref
                )));
            }
        }
        if self.evaluation.stall_timeout_ms == 0 || self.evaluation.timeout_ms == 0 {
            return Err(GauntletError::config("timeouts must be greater than zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RunFile {
        toml::from_str(
            r#"
[evaluation]
max_retries = 1

[backends.ollama]
base_url = "http://localhost:11434/v1"

[[models]]
id = "llama3"
kind = "local"
backend_ref = "ollama"
model_name = "llama3:8b"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_and_validate() {
        let run = sample();
        assert!(run.validate().is_ok());
        assert_eq!(run.evaluation.max_retries, 1);
        assert_eq!(run.evaluation.timeout_ms, 120_000);

        let models = run.models_under_test();
        assert_eq!(models[0].display_name, "llama3");
        assert_eq!(run.models[0].remote_name(), "llama3:8b");
    }

    #[test]
    fn test_backend_sampling_settings() {
        let run: RunFile = toml::from_str(
            r#"
[backends.remote]
base_url = "https://api.example.com/v1"
api_key_env = "EXAMPLE_API_KEY"
temperature = 0.25
"#,
        )
        .unwrap();
        assert_eq!(
            run.backends["remote"],
            BackendConfig {
                base_url: "https://api.example.com/v1".to_string(),
                api_key_env: Some("EXAMPLE_API_KEY".to_string()),
                temperature: Some(0.25),
            }
        );
        assert_ne!(run.backends["remote"], sample().backends["ollama"]);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let mut run = sample();
        run.models[0].backend_ref = "missing".to_string();
        assert!(matches!(run.validate(), Err(GauntletError::Config(_))));
    }

    #[test]
    fn test_duplicate_model_rejected() {
        let mut run = sample();
        run.models.push(run.models[0].clone());
        assert!(run.validate().is_err());
    }
}
