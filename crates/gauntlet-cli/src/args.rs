//! CLI argument definitions using clap
//!
//! - gauntlet run                    # Evaluate every configured model
//! - gauntlet run --dry-run          # Same pipeline, scripted backends
//! - gauntlet resume [<id>]          # Continue an unfinished session
//! - gauntlet sessions list          # Stored sessions, newest first
//! - gauntlet report <id>            # Print a session report

use clap::{Parser, Subcommand};
use gauntlet_core::config::defaults::RUN_FILE;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gauntlet")]
#[command(about = "Gauntlet - drive model variants through scripted multi-turn scenarios")]
#[command(version)]
pub struct Cli {
    /// Path to the run file (TOML, YAML or JSON)
    #[arg(long, short = 'c', global = true, default_value = RUN_FILE)]
    pub config: PathBuf,

    /// Directory holding session documents
    #[arg(long, global = true)]
    pub sessions_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate models against the scenario battery in a new session
    Run {
        /// Scenario directory (overrides the run file; built-in battery when absent)
        #[arg(long)]
        scenarios_dir: Option<PathBuf>,

        /// Only run these scenario ids, in this order
        #[arg(long = "scenario", value_delimiter = ',')]
        scenarios: Vec<String>,

        /// Only evaluate these model ids
        #[arg(long = "model", value_delimiter = ',')]
        models: Vec<String>,

        /// Use scripted in-process backends instead of the configured ones
        #[arg(long)]
        dry_run: bool,

        /// Do not write reports into the session directory
        #[arg(long)]
        no_report: bool,
    },

    /// Continue a session with the models it has not finished
    Resume {
        /// Session id (most recent resumable session when omitted)
        session_id: Option<String>,

        /// Use scripted in-process backends instead of the configured ones
        #[arg(long)]
        dry_run: bool,
    },

    /// Manage stored sessions
    Sessions {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Print the report of a session
    Report {
        /// Session id
        session_id: String,

        /// Output format: table, json or markdown
        #[arg(long, short, default_value = "table")]
        format: String,
    },

    /// Inspect scenario batteries
    Scenarios {
        #[command(subcommand)]
        action: ScenarioAction,
    },
}

#[derive(Subcommand, Clone)]
pub enum SessionAction {
    /// List stored sessions, newest first
    List {
        /// Maximum number of sessions to show
        #[arg(long, short = 'n', default_value_t = 20)]
        limit: usize,
    },

    /// Show one session in detail
    Show {
        session_id: String,
    },

    /// Delete a session and everything stored for it
    Delete {
        session_id: String,
    },

    /// Delete sessions not updated for a number of days
    Cleanup {
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
}

#[derive(Subcommand, Clone)]
pub enum ScenarioAction {
    /// List the scenarios a run would use
    List {
        /// Scenario directory (built-in battery when absent)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Load and validate every scenario file in a directory
    Validate {
        dir: PathBuf,
    },
}
