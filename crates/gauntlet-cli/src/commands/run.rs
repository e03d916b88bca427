//! `run` and `resume`: evaluate models in a session

use anyhow::{Context, Result, bail};
use console::Term;
use gauntlet_core::{BackendRegistry, GauntletError, ModelResult};
use gauntlet_eval::scenarios::select;
use gauntlet_eval::{EvaluationOrchestrator, EvaluationReport, ScenarioLoader, generate_table};
use gauntlet_session::{SessionStatus, SessionStorage};
use std::path::PathBuf;

use super::setup;
use crate::args::Cli;
use crate::console::CliConsole;
use crate::progress::RunProgress;
use crate::signal_handler::SignalHandler;

/// Options of the `run` command
pub struct RunOptions {
    pub scenarios_dir: Option<PathBuf>,
    pub scenarios: Vec<String>,
    pub models: Vec<String>,
    pub dry_run: bool,
    pub no_report: bool,
}

/// Evaluate the configured models in a new session
pub async fn run(cli: &Cli, options: RunOptions) -> Result<()> {
    let console = CliConsole::new(cli.verbose);
    let mut run_file = setup::load_run_file(cli, !options.dry_run)?;
    if options.no_report {
        run_file.evaluation.write_report = false;
    }

    let models = setup::select_models(&run_file, &options.models, options.dry_run)?;
    let scenarios = match setup::scenarios_dir(&run_file, options.scenarios_dir.as_deref()) {
        Some(dir) => ScenarioLoader::new(dir).load_all()?,
        None => ScenarioLoader::builtin()?,
    };
    let scenarios = select(scenarios, &options.scenarios)?;
    if scenarios.is_empty() {
        bail!("no scenarios to run");
    }
    match setup::scenarios_dir(&run_file, options.scenarios_dir.as_deref()) {
        Some(dir) => console.info(&format!("Scenarios from {}", dir.display())),
        None => console.info("Using the built-in scenario battery"),
    }

    let registry = if options.dry_run {
        console.warn("Dry run: using scripted backends");
        setup::dry_run_registry(&models)
    } else {
        setup::build_registry(&run_file)?
    };
    let storage = setup::open_storage(&run_file)?;
    console.info(&format!("Sessions stored in {}", storage.base_path().display()));

    console.print_header("Gauntlet Evaluation");
    console.field("Models", models.len());
    console.field("Scenarios", scenarios.len());
    console.field("Max retries", run_file.evaluation.max_retries);
    console.field("Turn timeout", format!("{} ms", run_file.evaluation.timeout_ms));
    println!();

    let mut orchestrator = EvaluationOrchestrator::new(run_file.evaluation.clone(), registry, storage);
    let mut watch = RunWatch::attach(&mut orchestrator);
    let outcome = orchestrator.run(models, scenarios).await;
    watch.detach();
    finish(&console, &orchestrator, outcome)
}

/// Continue a stored session
pub async fn resume(cli: &Cli, session_id: Option<String>, dry_run: bool) -> Result<()> {
    let console = CliConsole::new(cli.verbose);
    let run_file = setup::load_run_file(cli, false)?;
    let storage = setup::open_storage(&run_file)?;
    console.info(&format!("Sessions stored in {}", storage.base_path().display()));

    let session_id = match session_id {
        Some(id) => id,
        None => latest_resumable(storage.as_ref()).await?,
    };
    let session = storage
        .load_session(&session_id)
        .await
        .with_context(|| format!("cannot load session {}", session_id))?;

    let registry = if dry_run {
        console.warn("Dry run: using scripted backends");
        setup::dry_run_registry(&session.models)
    } else {
        registry_for_resume(&run_file, &session.models)?
    };

    console.print_header("Resuming Gauntlet Evaluation");
    console.field("Session", &session_id);
    console.field("Status", session.status);
    console.field(
        "Completed",
        format!("{}/{}", session.completed_model_ids.len(), session.models.len()),
    );
    println!();

    let mut orchestrator = EvaluationOrchestrator::new(run_file.evaluation.clone(), registry, storage);
    let mut watch = RunWatch::attach(&mut orchestrator);
    let outcome = orchestrator.resume(&session_id).await;
    watch.detach();
    finish(&console, &orchestrator, outcome)
}

/// Progress bar and Ctrl+C handling around one orchestrator call
struct RunWatch {
    progress: RunProgress,
    signals: SignalHandler,
}

impl RunWatch {
    fn attach(orchestrator: &mut EvaluationOrchestrator) -> Self {
        let progress = RunProgress::new(Term::stderr().is_term());
        let observer = progress.clone();
        orchestrator.on_progress(move |state| observer.update(state));

        let mut signals = SignalHandler::new();
        if let Err(e) = signals.start(orchestrator.cancel_handle()) {
            tracing::warn!("Ctrl+C handling unavailable: {}", e);
        }
        Self { progress, signals }
    }

    fn detach(&mut self) {
        self.signals.stop();
        self.progress.finish();
    }
}

fn finish(
    console: &CliConsole,
    orchestrator: &EvaluationOrchestrator,
    outcome: Result<Vec<ModelResult>, GauntletError>,
) -> Result<()> {
    let session = orchestrator.store().session();
    let session_id = orchestrator.store().session_id().unwrap_or("-").to_string();

    match outcome {
        Ok(results) => {
            if let Some(session) = session {
                let report = EvaluationReport::from_session(session, session.status);
                println!("{}", generate_table(&report));
                match session.status {
                    SessionStatus::Cancelled | SessionStatus::Paused => console.warn(&format!(
                        "{} after {} model(s). Resume with: gauntlet resume {}",
                        if session.status == SessionStatus::Paused { "Paused" } else { "Cancelled" },
                        results.len(),
                        session_id
                    )),
                    _ => console.success(&format!(
                        "Evaluated {} model(s) in session {}",
                        results.len(),
                        session_id
                    )),
                }
            }
            Ok(())
        }
        Err(e) => {
            console.error(&format!("Evaluation aborted: {}", e));
            if console.is_verbose() {
                eprintln!("{:?}", e);
            }
            if session.is_some() {
                console.warn(&format!(
                    "Completed models were saved. Resume with: gauntlet resume {}",
                    session_id
                ));
            }
            Err(e.into())
        }
    }
}

async fn latest_resumable(storage: &dyn SessionStorage) -> Result<String> {
    let sessions = storage.list_sessions().await?;
    sessions
        .into_iter()
        .find(|s| s.status.is_resumable() && s.completed_models < s.total_models)
        .map(|s| s.session_id)
        .context("no resumable session found")
}

/// Registry for a stored session; every referenced backend must still exist
fn registry_for_resume(
    run_file: &gauntlet_core::RunFile,
    models: &[gauntlet_core::ModelUnderTest],
) -> Result<BackendRegistry> {
    let registry = setup::build_registry(run_file)?;
    for model in models {
        if registry.resolve(model).is_none() {
            tracing::warn!(
                model_id = %model.id,
                backend = %model.backend_ref,
                "Backend missing from run file; model will be skipped"
            );
        }
    }
    Ok(registry)
}
