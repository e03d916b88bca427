//! Gauntlet evaluation engine
//!
//! Drives AI model variants through scripted multi-turn scenarios under a
//! strict per-turn timeout and retry discipline.
//!
//! # Features
//!
//! - **Orchestration**: single-flight evaluation of every model, bounded
//!   retries, availability probes for local models, cooperative and forced
//!   cancellation, resumable sessions
//! - **Streaming aggregation**: per-turn stall and overall timers around a
//!   streamed backend response
//! - **Scoring**: task-marker detection with strict and lenient modes
//! - **Progress**: derived progress state with ETA, pushed to observers
//! - **Reports**: JSON and Markdown summaries written into the session
//!
//! # Example
//!
//! ```rust,ignore
//! use gauntlet_eval::{EvaluationOrchestrator, ScenarioLoader};
//!
//! let scenarios = ScenarioLoader::builtin()?;
//! let mut orchestrator = EvaluationOrchestrator::new(config, backends, storage);
//! let results = orchestrator.run(models, scenarios).await?;
//! ```

pub mod aggregator;
pub mod executor;
pub mod orchestrator;
pub mod progress;
pub mod report;
pub mod scenarios;
pub mod scoring;

// Re-exports for convenience
pub use aggregator::{AggregatedResponse, ResponseAggregator, TurnState, TurnTimers};
pub use executor::{NoopObserver, ScenarioExecutor, ScenarioObserver};
pub use orchestrator::{CancelHandle, EvaluationOrchestrator};
pub use progress::{ProgressPhase, ProgressState, ProgressTracker};
pub use report::{EvaluationReport, JsonReporter, MarkdownReporter, ModelSummary, generate_report, generate_table};
pub use scenarios::ScenarioLoader;
pub use scoring::{Score, ScoringMode, score_responses};
