//! `scenarios`: list and validate scenario batteries

use anyhow::{Result, bail};
use colored::*;
use gauntlet_eval::ScenarioLoader;
use std::path::Path;

use super::setup;
use crate::args::{Cli, ScenarioAction};

pub async fn execute(cli: &Cli, action: &ScenarioAction) -> Result<()> {
    match action {
        ScenarioAction::List { dir } => {
            let run_file = setup::load_run_file(cli, false)?;
            let scenarios = match setup::scenarios_dir(&run_file, dir.as_deref()) {
                Some(dir) => ScenarioLoader::new(dir).load_all()?,
                None => ScenarioLoader::builtin()?,
            };
            if scenarios.is_empty() {
                println!("No scenarios found.");
                return Ok(());
            }

            println!("{:<25} {:<35} {:<6} {}", "ID", "Name", "Turns", "Role");
            println!("{:-<80}", "");
            for scenario in &scenarios {
                println!(
                    "{:<25} {:<35} {:<6} {}",
                    scenario.id,
                    truncate(&scenario.name, 33),
                    scenario.user_turn_count(),
                    scenario.agent_role
                );
            }
            println!("\nTotal: {} scenarios", scenarios.len());
            Ok(())
        }
        ScenarioAction::Validate { dir } => validate(dir),
    }
}

fn validate(dir: &Path) -> Result<()> {
    let checks = ScenarioLoader::new(dir).check_files()?;
    if checks.is_empty() {
        bail!("no scenario files in {}", dir.display());
    }

    let mut failures = 0;
    for check in &checks {
        let shown = check.path.strip_prefix(dir).unwrap_or(&check.path);
        match &check.outcome {
            Ok(ids) => println!("{} {} ({})", "✓".green(), shown.display(), ids.join(", ")),
            Err(e) => {
                failures += 1;
                println!("{} {}: {}", "✗".red(), shown.display(), e);
            }
        }
    }

    // Cross-file rules such as unique ids
    if failures == 0 {
        ScenarioLoader::new(dir).load_all()?;
        println!("\nAll {} file(s) valid", checks.len());
        Ok(())
    } else {
        bail!("{} of {} scenario file(s) invalid", failures, checks.len())
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}
