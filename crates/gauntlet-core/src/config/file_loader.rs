//! File-based run configuration loading

use std::fs;
use std::path::Path;

use super::RunFile;
use crate::error::{GauntletError, GauntletResult};

/// Load a run file
///
/// Supports JSON, TOML, and YAML formats based on file extension.
pub fn load_from_file(path: &Path) -> GauntletResult<RunFile> {
    if !path.exists() {
        return Err(GauntletError::config(format!(
            "run file not found: {}",
            path.display()
        )));
    }

    let content = fs::read_to_string(path).map_err(|e| {
        GauntletError::config(format!("failed to read '{}': {}", path.display(), e))
    })?;

    parse_run_file(&content, path.extension().and_then(|s| s.to_str()))
        .map_err(|e| GauntletError::config(format!("{} ({})", e, path.display())))
}

/// Parse run file content in the format named by `extension`
pub fn parse_run_file(content: &str, extension: Option<&str>) -> GauntletResult<RunFile> {
    let run: RunFile = match extension {
        Some("toml") => toml::from_str(content)
            .map_err(|e| GauntletError::config(format!("failed to parse TOML run file: {}", e)))?,
        Some("yaml") | Some("yml") => serde_yaml::from_str(content)
            .map_err(|e| GauntletError::config(format!("failed to parse YAML run file: {}", e)))?,
        _ => serde_json::from_str(content)
            .map_err(|e| GauntletError::config(format!("failed to parse JSON run file: {}", e)))?,
    };
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_yaml_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run.yaml");
        fs::write(
            &path,
            r#"
evaluation:
  timeout_ms: 30000
backends:
  remote:
    base_url: https://api.example.com/v1
    api_key_env: EXAMPLE_API_KEY
models:
  - id: example-large
    kind: remote
    backend_ref: remote
"#,
        )
        .unwrap();

        let run = load_from_file(&path).unwrap();
        assert_eq!(run.evaluation.timeout_ms, 30_000);
        assert_eq!(run.models.len(), 1);
        assert_eq!(
            run.backends["remote"].api_key_env.as_deref(),
            Some("EXAMPLE_API_KEY")
        );
    }

    #[test]
    fn test_load_from_json_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run.json");
        fs::write(&path, r#"{"evaluation": {"max_retries": 5}}"#).unwrap();

        let run = load_from_file(&path).unwrap();
        assert_eq!(run.evaluation.max_retries, 5);
        assert!(run.models.is_empty());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = load_from_file(Path::new("/nonexistent/gauntlet.toml"));
        assert!(matches!(result, Err(GauntletError::Config(_))));
    }

    #[test]
    fn test_invalid_toml() {
        let result = parse_run_file("evaluation = [", Some("toml"));
        assert!(result.is_err());
    }
}
