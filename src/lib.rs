//! Gauntlet: drive model variants through scripted multi-turn scenarios
//!
//! Facade over the workspace crates:
//!
//! - [`core`]: domain types, configuration, errors and model backends
//! - [`session`]: resumable session documents and their storage
//! - [`eval`]: the orchestrator, streaming aggregation, scoring, progress
//!   and reports

pub use gauntlet_core as core;
pub use gauntlet_eval as eval;
pub use gauntlet_session as session;

pub use gauntlet_core::{EvalConfig, GauntletError, GauntletResult, ModelResult, ModelUnderTest, Scenario};
pub use gauntlet_eval::{CancelHandle, EvaluationOrchestrator, EvaluationReport, ScenarioLoader};
pub use gauntlet_session::{LocalSessionStorage, SessionStatus, SessionStorage};
