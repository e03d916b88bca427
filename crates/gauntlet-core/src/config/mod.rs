//! Configuration loading and defaults

pub mod defaults;
mod env_loader;
mod eval_config;
mod file_loader;
mod run_file;

pub use env_loader::{apply_env_overrides, apply_overrides_from};
pub use eval_config::{EvalConfig, ReportFormat, RunConfig};
pub use file_loader::{load_from_file, parse_run_file};
pub use run_file::{BackendConfig, ModelEntry, RunFile};

use crate::error::GauntletResult;
use std::path::Path;

/// Load a run file, apply environment overrides and validate it
pub fn load_run_file(path: &Path) -> GauntletResult<RunFile> {
    let mut run = load_from_file(path)?;
    apply_env_overrides(&mut run.evaluation)?;
    run.validate()?;
    Ok(run)
}
