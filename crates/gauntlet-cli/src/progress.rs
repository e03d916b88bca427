//! Terminal progress display for a run

use colored::*;
use gauntlet_eval::{ProgressPhase, ProgressState};
use indicatif::{ProgressBar, ProgressStyle};

use crate::console::format_duration;

/// Progress bar driven by the orchestrator's progress observer
#[derive(Clone)]
pub struct RunProgress {
    bar: ProgressBar,
}

impl RunProgress {
    pub fn new(visible: bool) -> Self {
        let bar = if visible {
            ProgressBar::new(100)
        } else {
            ProgressBar::hidden()
        };
        let style = ProgressStyle::with_template("{bar:30.cyan/blue} {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        bar.set_style(style);
        Self { bar }
    }

    /// Observer callback; cheap enough to run on every mutation
    pub fn update(&self, state: &ProgressState) {
        self.bar.set_position(u64::from(state.global_progress_pct));
        self.bar.set_message(status_line(state));
        if state.phase.is_finished() {
            self.bar.finish_with_message(finish_line(state));
        }
    }

    pub fn finish(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

/// One-line description of the run's current position
pub fn status_line(state: &ProgressState) -> String {
    let mut line = format!(
        "[{}/{}]",
        state.completed_models, state.total_models
    );
    if let Some(model) = &state.current_model {
        line.push_str(&format!(" {}", model));
        if let Some(scenario) = &state.current_scenario {
            line.push_str(&format!(" / {} ({:.0}%)", scenario, state.scenario_progress_pct));
        }
    }
    if let Some(eta) = state.estimated_remaining_secs {
        line.push_str(&format!(" · ETA {}", format_duration(eta)));
    }
    if state.is_cancellation_requested {
        line.push_str(" · stopping");
    }
    line
}

fn finish_line(state: &ProgressState) -> String {
    let phase = match state.phase {
        ProgressPhase::Completed => "completed".green().to_string(),
        ProgressPhase::Cancelled => "cancelled".yellow().to_string(),
        ProgressPhase::Error => "failed".red().to_string(),
        other => other.to_string(),
    };
    format!(
        "{} · {} passed, {} failed, {} skipped in {}",
        phase,
        state.success_count,
        state.fail_count,
        state.skip_count,
        format_duration(state.elapsed_secs)
    )
}
