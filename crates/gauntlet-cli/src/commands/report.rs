//! `report`: render the report of a stored session

use anyhow::{Result, bail};
use gauntlet_core::ReportFormat;
use gauntlet_eval::{EvaluationReport, generate_report, generate_table};
use gauntlet_session::SessionStorage;

use super::setup;
use crate::args::Cli;

pub async fn execute(cli: &Cli, session_id: &str, format: &str) -> Result<()> {
    let run_file = setup::load_run_file(cli, false)?;
    let storage = setup::open_storage(&run_file)?;
    let session = storage.load_session(session_id).await?;
    let report = EvaluationReport::from_session(&session, session.status);
    println!("{}", render(&report, format)?);
    Ok(())
}

fn render(report: &EvaluationReport, format: &str) -> Result<String> {
    if format.eq_ignore_ascii_case("table") {
        return Ok(generate_table(report));
    }
    match ReportFormat::parse(format) {
        Some(format) => Ok(generate_report(report, format)?),
        None => bail!("unknown report format '{}' (expected table, json or markdown)", format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_session::{EvaluationSession, SessionStatus};

    fn empty_report() -> EvaluationReport {
        let session = EvaluationSession::new(Vec::new(), Vec::new(), Default::default());
        EvaluationReport::from_session(&session, SessionStatus::Completed)
    }

    #[test]
    fn test_render_formats() {
        let report = empty_report();
        assert!(render(&report, "json").unwrap().trim_start().starts_with('{'));
        assert!(render(&report, "md").unwrap().contains("# Gauntlet Evaluation Report"));
        assert!(render(&report, "TABLE").is_ok());
        assert!(render(&report, "xml").is_err());
    }
}
