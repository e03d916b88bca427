//! `sessions`: inspect and maintain stored sessions

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use colored::*;
use gauntlet_session::{SessionStatus, SessionStorage};

use super::setup;
use crate::args::{Cli, SessionAction};
use crate::console::{CliConsole, format_duration};

pub async fn execute(cli: &Cli, action: &SessionAction) -> Result<()> {
    let run_file = setup::load_run_file(cli, false)?;
    let storage = setup::open_storage(&run_file)?;
    let console = CliConsole::new(cli.verbose);

    match action {
        SessionAction::List { limit } => list(storage.as_ref(), *limit).await,
        SessionAction::Show { session_id } => show(storage.as_ref(), session_id).await,
        SessionAction::Delete { session_id } => {
            if !storage.exists(session_id).await? {
                bail!("session {} not found", session_id);
            }
            storage.delete_session(session_id).await?;
            console.success(&format!("Deleted session {}", session_id));
            Ok(())
        }
        SessionAction::Cleanup { days } => {
            if *days < 0 {
                bail!("--days must not be negative");
            }
            let removed = storage.cleanup_older_than(chrono::Duration::days(*days)).await?;
            console.success(&format!(
                "Removed {} session(s) older than {} day(s)",
                removed, days
            ));
            Ok(())
        }
    }
}

async fn list(storage: &dyn SessionStorage, limit: usize) -> Result<()> {
    let sessions = storage.list_sessions().await?;
    if sessions.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }

    println!(
        "{:<38} {:<10} {:<8} {:<10} {:<8} {}",
        "ID", "Status", "Models", "Scenarios", "Errors", "Updated"
    );
    println!("{:-<90}", "");
    for summary in sessions.iter().take(limit) {
        println!(
            "{:<38} {:<10} {:<8} {:<10} {:<8} {}",
            summary.session_id,
            paint_status(summary.status),
            format!("{}/{}", summary.completed_models, summary.total_models),
            summary.total_scenarios,
            summary.error_count,
            format_relative_time(summary.updated_at).dimmed()
        );
    }
    if sessions.len() > limit {
        println!("\n... and {} more", sessions.len() - limit);
    }
    Ok(())
}

async fn show(storage: &dyn SessionStorage, session_id: &str) -> Result<()> {
    let session = storage.load_session(session_id).await?;

    println!("{}", format!("Session {}", session.session_id).bold());
    println!("  Status:    {}", paint_status(session.status));
    println!("  Created:   {}", session.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  Updated:   {}", format_relative_time(session.updated_at));
    println!(
        "  Config:    timeout {} ms, {} retries, {} ms delay",
        session.config.timeout_ms, session.config.max_retries, session.config.retry_delay_ms
    );
    println!(
        "  Progress:  {}/{} models, {} scenarios",
        session.completed_model_ids.len(),
        session.models.len(),
        session.scenarios.len()
    );
    if let Some(current) = &session.current_model_id {
        let scenario = session.current_scenario_id.as_deref().unwrap_or("-");
        println!("  Current:   {} / {}", current, scenario);
    }

    if !session.partial_results.is_empty() {
        println!("\n{}", "Results".bold());
        for result in &session.partial_results {
            let label = if result.skipped {
                "SKIP".yellow()
            } else if result.success {
                "PASS".green()
            } else {
                "FAIL".red()
            };
            println!(
                "  {} {:<30} {:>6.1}%  retries {}  {}",
                label,
                result.model_id,
                result.average_success_rate() * 100.0,
                result.retry_count,
                format_duration(result.total_duration_ms as f64 / 1000.0)
            );
        }
    }

    let remaining: Vec<_> = session
        .models
        .iter()
        .filter(|m| !session.completed_model_ids.contains(&m.id))
        .map(|m| m.id.as_str())
        .collect();
    if !remaining.is_empty() {
        println!("\n{} {}", "Remaining:".bold(), remaining.join(", "));
    }

    if !session.error_log.is_empty() {
        println!("\n{}", "Errors".bold());
        for record in &session.error_log {
            let scope = match &record.scenario_id {
                Some(scenario) => format!("{}/{}", record.model_id, scenario),
                None => record.model_id.clone(),
            };
            println!(
                "  {} {} {}",
                record.timestamp.format("%H:%M:%S").to_string().dimmed(),
                scope.cyan(),
                record.message
            );
        }
    }
    Ok(())
}

fn paint_status(status: SessionStatus) -> ColoredString {
    let text = format!("{:<10}", status);
    match status {
        SessionStatus::Completed => text.green(),
        SessionStatus::Running => text.cyan(),
        SessionStatus::Paused | SessionStatus::Cancelled => text.yellow(),
        SessionStatus::Error => text.red(),
    }
}

/// Format relative time like "5 mins ago"
fn format_relative_time(time: DateTime<Utc>) -> String {
    let duration = Utc::now().signed_duration_since(time);

    if duration.num_seconds() < 60 {
        "just now".to_string()
    } else if duration.num_minutes() < 60 {
        let mins = duration.num_minutes();
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if duration.num_hours() < 24 {
        let hours = duration.num_hours();
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else {
        let days = duration.num_days();
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_relative_time() {
        assert_eq!(format_relative_time(Utc::now()), "just now");
        assert_eq!(
            format_relative_time(Utc::now() - chrono::Duration::minutes(5)),
            "5 mins ago"
        );
        assert_eq!(
            format_relative_time(Utc::now() - chrono::Duration::hours(1)),
            "1 hour ago"
        );
        assert_eq!(
            format_relative_time(Utc::now() - chrono::Duration::days(3)),
            "3 days ago"
        );
    }
}
