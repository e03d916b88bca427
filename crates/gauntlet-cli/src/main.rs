//! Gauntlet command-line interface
//!
//! Runs model evaluation sessions and inspects their results.
//!
//! # Commands
//!
//! - `gauntlet run` evaluates every configured model against the scenario
//!   battery. Ctrl+C once stops after the current scenario, twice aborts
//!   the in-flight turn. SIGTERM stops like Ctrl+C but leaves the session
//!   paused.
//! - `gauntlet resume [<id>]` continues a paused, cancelled or failed session.
//! - `gauntlet sessions list|show|delete|cleanup` manages stored sessions.
//! - `gauntlet report <id>` prints the report of a session.
//! - `gauntlet scenarios list|validate` inspects scenario batteries.
//!
//! Pass `--dry-run` to `run` to exercise the whole pipeline against scripted
//! in-process backends.

#![allow(clippy::collapsible_if)]

mod args;
mod commands;
mod console;
mod progress;
mod router;
mod signal_handler;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use args::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);
    router::route(cli).await
}

/// Logs go to stderr; `RUST_LOG` wins over `--verbose`
fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}
