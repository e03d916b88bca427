//! Command routing logic for CLI

use anyhow::Result;

use crate::args::{Cli, Commands};
use crate::commands::{self, run::RunOptions};

/// Route CLI commands to their respective handlers
pub async fn route(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Run {
            scenarios_dir,
            scenarios,
            models,
            dry_run,
            no_report,
        } => {
            let options = RunOptions {
                scenarios_dir: scenarios_dir.clone(),
                scenarios: scenarios.clone(),
                models: models.clone(),
                dry_run: *dry_run,
                no_report: *no_report,
            };
            commands::run::run(&cli, options).await
        }
        Commands::Resume { session_id, dry_run } => {
            commands::run::resume(&cli, session_id.clone(), *dry_run).await
        }
        Commands::Sessions { action } => commands::sessions::execute(&cli, action).await,
        Commands::Report { session_id, format } => {
            commands::report::execute(&cli, session_id, format).await
        }
        Commands::Scenarios { action } => commands::scenarios::execute(&cli, action).await,
    }
}
