//! Shared setup: run file, session storage and backend registry

use anyhow::{Context, Result, bail};
use gauntlet_core::config::{self, RunFile, apply_env_overrides};
use gauntlet_core::{BackendRegistry, FakeBackend, ModelKind, ModelUnderTest, OpenAiCompatibleBackend};
use gauntlet_session::LocalSessionStorage;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use crate::args::Cli;

/// Load the run file named on the command line
///
/// A missing file is only an error when `required` is set; otherwise the
/// defaults are used, still subject to environment overrides.
pub fn load_run_file(cli: &Cli, required: bool) -> Result<RunFile> {
    let mut run = if cli.config.exists() {
        config::load_run_file(&cli.config)
            .with_context(|| format!("failed to load run file {}", cli.config.display()))?
    } else if required {
        bail!(
            "run file {} not found (use --config or --dry-run)",
            cli.config.display()
        );
    } else {
        let mut run = RunFile::default();
        apply_env_overrides(&mut run.evaluation)?;
        run
    };

    if let Some(dir) = &cli.sessions_dir {
        run.evaluation.output_dir = Some(dir.clone());
    }
    Ok(run)
}

/// Session storage rooted at the configured sessions directory
pub fn open_storage(run: &RunFile) -> Result<Arc<LocalSessionStorage>> {
    let Some(dir) = run.evaluation.sessions_dir() else {
        bail!("cannot determine the sessions directory; pass --sessions-dir");
    };
    tracing::debug!(path = %dir.display(), "Using session storage");
    Ok(Arc::new(LocalSessionStorage::with_path(dir)))
}

/// One HTTP backend per `[backends]` entry, with per-model name mapping
pub fn build_registry(run: &RunFile) -> Result<BackendRegistry> {
    let mut registry = BackendRegistry::new();
    for (name, backend_config) in &run.backends {
        let mut backend = OpenAiCompatibleBackend::new(name, backend_config)
            .with_context(|| format!("failed to create backend '{}'", name))?;
        for entry in run.models_for_backend(name) {
            backend = backend.with_model_name(&entry.id, entry.remote_name());
        }
        registry.register(name, Arc::new(backend));
    }
    Ok(registry)
}

/// Scripted backends for every backend a model refers to
pub fn dry_run_registry(models: &[ModelUnderTest]) -> BackendRegistry {
    let names: BTreeSet<&str> = models.iter().map(|m| m.backend_ref.as_str()).collect();
    let mut registry = BackendRegistry::new();
    for name in names {
        registry.register(name, Arc::new(FakeBackend::new(name)));
    }
    registry
}

/// Models to evaluate, optionally narrowed to `only`
pub fn select_models(run: &RunFile, only: &[String], dry_run: bool) -> Result<Vec<ModelUnderTest>> {
    let mut models = run.models_under_test();
    if models.is_empty() && dry_run {
        models = demo_models();
    }
    if models.is_empty() {
        bail!("no models configured; add [[models]] to the run file");
    }
    if only.is_empty() {
        return Ok(models);
    }

    for id in only {
        if !models.iter().any(|m| &m.id == id) {
            bail!("unknown model id '{}'", id);
        }
    }
    models.retain(|m| only.contains(&m.id));
    Ok(models)
}

fn demo_models() -> Vec<ModelUnderTest> {
    vec![
        ModelUnderTest::new("demo-local", "Demo (local)", ModelKind::Local, "demo"),
        ModelUnderTest::new("demo-remote", "Demo (remote)", ModelKind::Remote, "demo"),
    ]
}

/// Scenario directory: command line first, then the run file
pub fn scenarios_dir<'a>(run: &'a RunFile, cli_dir: Option<&'a Path>) -> Option<&'a Path> {
    cli_dir.or(run.scenarios_dir.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_core::config::parse_run_file;

    fn run_file() -> RunFile {
        parse_run_file(
            r#"
[backends.ollama]
base_url = "http://localhost:11434/v1"

[[models]]
id = "llama3"
kind = "local"
backend_ref = "ollama"
model_name = "llama3:8b"

[[models]]
id = "qwen"
kind = "local"
backend_ref = "ollama"
"#,
            Some("toml"),
        )
        .unwrap()
    }

    #[test]
    fn test_load_run_file_from_disk() {
        use clap::Parser;

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("gauntlet.toml");
        std::fs::write(
            &path,
            "[backends.ollama]\nbase_url = \"http://localhost:11434/v1\"\n\n\
             [[models]]\nid = \"llama3\"\nkind = \"local\"\nbackend_ref = \"ollama\"\n",
        )
        .unwrap();
        let sessions = dir.path().join("sessions");

        let args: Vec<std::ffi::OsString> = vec![
            "gauntlet".into(),
            "--config".into(),
            path.clone().into_os_string(),
            "--sessions-dir".into(),
            sessions.clone().into_os_string(),
            "sessions".into(),
            "list".into(),
        ];
        let cli = Cli::parse_from(args);
        let run = load_run_file(&cli, true).unwrap();
        assert_eq!(run.models.len(), 1);
        assert_eq!(run.evaluation.output_dir.as_deref(), Some(sessions.as_path()));

        let missing = Cli::parse_from(["gauntlet", "--config", "/nonexistent/gauntlet.toml", "sessions", "list"]);
        assert!(load_run_file(&missing, true).is_err());
        assert!(load_run_file(&missing, false).unwrap().models.is_empty());
    }

    #[test]
    fn test_registry_has_one_backend_per_entry() {
        let registry = build_registry(&run_file()).unwrap();
        assert_eq!(registry.names(), vec!["ollama"]);
    }

    #[test]
    fn test_select_models() {
        let run = run_file();
        assert_eq!(select_models(&run, &[], false).unwrap().len(), 2);

        let only = select_models(&run, &["qwen".to_string()], false).unwrap();
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].id, "qwen");

        assert!(select_models(&run, &["missing".to_string()], false).is_err());
    }

    #[test]
    fn test_dry_run_falls_back_to_demo_models() {
        let models = select_models(&RunFile::default(), &[], true).unwrap();
        assert_eq!(models.len(), 2);
        let registry = dry_run_registry(&models);
        assert_eq!(registry.len(), 1);
        assert!(select_models(&RunFile::default(), &[], false).is_err());
    }
}
