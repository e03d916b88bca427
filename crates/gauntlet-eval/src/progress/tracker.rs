//! Progress tracker
//!
//! Pure state machine over the run's progress. Every mutation recomputes the
//! derived [`ProgressState`] and hands it to the registered observers. Time
//! comes from `tokio::time::Instant`.

use gauntlet_core::{ObserverId, ObserverSet};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::{ProgressPhase, ProgressState};

/// Tracks run, model and scenario completion
pub struct ProgressTracker {
    phase: ProgressPhase,
    model_order: Vec<String>,
    scenario_count: usize,
    per_model: BTreeMap<String, f64>,
    completed_models: usize,
    current_model: Option<String>,
    current_scenario: Option<String>,
    scenarios_done: usize,
    model_progress: f64,
    scenario_progress: f64,
    started_at: Option<Instant>,
    model_started_at: Option<Instant>,
    /// Durations of models that were actually evaluated
    model_durations: Vec<Duration>,
    success_count: usize,
    fail_count: usize,
    skip_count: usize,
    errors: Vec<String>,
    cancellation_requested: bool,
    observers: ObserverSet<ProgressState>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            phase: ProgressPhase::Idle,
            model_order: Vec::new(),
            scenario_count: 0,
            per_model: BTreeMap::new(),
            completed_models: 0,
            current_model: None,
            current_scenario: None,
            scenarios_done: 0,
            model_progress: 0.0,
            scenario_progress: 0.0,
            started_at: None,
            model_started_at: None,
            model_durations: Vec::new(),
            success_count: 0,
            fail_count: 0,
            skip_count: 0,
            errors: Vec::new(),
            cancellation_requested: false,
            observers: ObserverSet::new(),
        }
    }

    /// Register a progress observer
    pub fn on_progress<F>(&mut self, observer: F) -> ObserverId
    where
        F: Fn(&ProgressState) + Send + Sync + 'static,
    {
        self.observers.add(observer)
    }

    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }

    /// Start tracking a run over `model_ids`, each evaluated on `scenario_count` scenarios
    pub fn initialize(&mut self, model_ids: &[String], scenario_count: usize) {
        self.phase = ProgressPhase::Running;
        self.model_order = model_ids.to_vec();
        self.scenario_count = scenario_count;
        self.per_model = model_ids.iter().map(|id| (id.clone(), 0.0)).collect();
        self.completed_models = 0;
        self.current_model = None;
        self.current_scenario = None;
        self.scenarios_done = 0;
        self.model_progress = 0.0;
        self.scenario_progress = 0.0;
        self.started_at = Some(Instant::now());
        self.model_started_at = None;
        self.model_durations.clear();
        self.success_count = 0;
        self.fail_count = 0;
        self.skip_count = 0;
        self.errors.clear();
        self.cancellation_requested = false;
        self.emit();
    }

    /// Count a model finished in an earlier run as complete
    pub fn restore_model(&mut self, model_id: &str, success: bool, skipped: bool) {
        self.mark_finished(model_id);
        if skipped {
            self.skip_count += 1;
        } else if success {
            self.success_count += 1;
        } else {
            self.fail_count += 1;
        }
        self.emit();
    }

    pub fn start_model(&mut self, model_id: &str) {
        self.current_model = Some(model_id.to_string());
        self.current_scenario = None;
        self.scenarios_done = 0;
        self.model_progress = 0.0;
        self.scenario_progress = 0.0;
        self.model_started_at = Some(Instant::now());
        self.emit();
    }

    /// Restart the current model's progress for a new attempt
    pub fn restart_model(&mut self) {
        self.current_scenario = None;
        self.scenarios_done = 0;
        self.model_progress = 0.0;
        self.scenario_progress = 0.0;
        self.sync_current_model();
        self.emit();
    }

    /// `index` is the scenario's position in the battery
    pub fn start_scenario(&mut self, scenario_id: &str, index: usize) {
        self.current_scenario = Some(scenario_id.to_string());
        self.scenarios_done = index;
        self.scenario_progress = 0.0;
        self.model_progress = self.model_fraction() * 100.0;
        self.sync_current_model();
        self.emit();
    }

    /// Progress within the current scenario, in percent
    pub fn update_scenario_progress(&mut self, pct: f64) {
        self.scenario_progress = pct.clamp(0.0, 100.0);
        self.model_progress = self.model_fraction() * 100.0;
        self.sync_current_model();
        self.emit();
    }

    /// Progress within the current model, in percent
    pub fn update_model_progress(&mut self, pct: f64) {
        self.model_progress = pct.clamp(0.0, 100.0);
        self.sync_current_model();
        self.emit();
    }

    pub fn complete_scenario(&mut self) {
        self.current_scenario = None;
        self.scenarios_done += 1;
        self.scenario_progress = 0.0;
        self.model_progress = self.model_fraction() * 100.0;
        self.sync_current_model();
        self.emit();
    }

    pub fn complete_model(&mut self, success: bool) {
        if let Some(started) = self.model_started_at.take() {
            self.model_durations.push(started.elapsed());
        }
        if let Some(id) = self.current_model.take() {
            self.mark_finished(&id);
        }
        if success {
            self.success_count += 1;
        } else {
            self.fail_count += 1;
        }
        self.reset_current();
        self.emit();
    }

    pub fn skip_model(&mut self, reason: &str) {
        self.model_started_at = None;
        if let Some(id) = self.current_model.take() {
            debug!(model_id = %id, reason, "Model skipped");
            self.mark_finished(&id);
        }
        self.skip_count += 1;
        self.reset_current();
        self.emit();
    }

    /// Leave the current model unfinished, e.g. after a forced shutdown
    pub fn abandon_model(&mut self) {
        self.model_started_at = None;
        if let Some(id) = self.current_model.take() {
            self.per_model.insert(id, 0.0);
        }
        self.reset_current();
        self.emit();
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
        self.emit();
    }

    /// Raise the advisory cancellation flag
    pub fn request_cancellation(&mut self) {
        if !self.cancellation_requested {
            self.cancellation_requested = true;
            self.emit();
        }
    }

    /// Terminal transition once the run actually stopped
    pub fn cancel(&mut self) {
        self.finish(ProgressPhase::Cancelled);
    }

    pub fn complete(&mut self) {
        self.finish(ProgressPhase::Completed);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
        self.finish(ProgressPhase::Error);
    }

    pub fn is_cancellation_requested(&self) -> bool {
        self.cancellation_requested
    }

    /// Current derived state
    pub fn state(&self) -> ProgressState {
        let total = self.model_order.len();
        let fraction = if self.current_model.is_some() {
            self.model_progress / 100.0
        } else {
            0.0
        };
        let global = if total == 0 {
            if self.phase == ProgressPhase::Completed { 100 } else { 0 }
        } else {
            let pct = (self.completed_models as f64 + fraction) / total as f64 * 100.0;
            (pct.floor() as u32).min(100)
        };

        let remaining = total.saturating_sub(self.completed_models);
        let estimated_remaining_secs = if self.model_durations.is_empty() {
            None
        } else {
            let avg = self.model_durations.iter().map(Duration::as_secs_f64).sum::<f64>()
                / self.model_durations.len() as f64;
            Some(avg * remaining as f64)
        };

        ProgressState {
            phase: self.phase,
            global_progress_pct: global,
            current_model: self.current_model.clone(),
            current_scenario: self.current_scenario.clone(),
            model_progress_pct: self.model_progress,
            scenario_progress_pct: self.scenario_progress,
            per_model: self.per_model.clone(),
            total_models: total,
            completed_models: self.completed_models,
            elapsed_secs: self
                .started_at
                .map(|s| s.elapsed().as_secs_f64())
                .unwrap_or(0.0),
            estimated_remaining_secs,
            success_count: self.success_count,
            fail_count: self.fail_count,
            skip_count: self.skip_count,
            error_count: self.errors.len(),
            is_cancellation_requested: self.cancellation_requested,
            last_error: self.errors.last().cloned(),
        }
    }

    fn model_fraction(&self) -> f64 {
        if self.scenario_count == 0 {
            return 0.0;
        }
        let done = self.scenarios_done as f64 + self.scenario_progress / 100.0;
        (done / self.scenario_count as f64).min(1.0)
    }

    fn sync_current_model(&mut self) {
        if let Some(id) = &self.current_model {
            self.per_model.insert(id.clone(), self.model_progress);
        }
    }

    fn mark_finished(&mut self, model_id: &str) {
        self.per_model.insert(model_id.to_string(), 100.0);
        self.completed_models = (self.completed_models + 1).min(self.model_order.len());
    }

    fn reset_current(&mut self) {
        self.current_scenario = None;
        self.scenarios_done = 0;
        self.model_progress = 0.0;
        self.scenario_progress = 0.0;
    }

    fn finish(&mut self, phase: ProgressPhase) {
        if let Some(started) = self.model_started_at.take() {
            debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Progress finished mid-model");
        }
        self.phase = phase;
        self.current_model = None;
        self.reset_current();
        self.emit();
    }

    fn emit(&self) {
        if self.observers.is_empty() {
            return;
        }
        self.observers.notify(&self.state());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("m{}", i)).collect()
    }

    #[test]
    fn test_global_progress_formula() {
        let mut tracker = ProgressTracker::new();
        tracker.initialize(&ids(3), 4);
        assert_eq!(tracker.state().global_progress_pct, 0);

        tracker.start_model("m0");
        tracker.start_scenario("s0", 0);
        tracker.complete_scenario();
        tracker.start_scenario("s1", 1);
        tracker.update_scenario_progress(50.0);
        // (0 + 1.5 / 4) / 3 = 12.5%
        let state = tracker.state();
        assert_eq!(state.model_progress_pct, 37.5);
        assert_eq!(state.global_progress_pct, 12);
        assert_eq!(state.per_model["m0"], 37.5);

        tracker.complete_scenario();
        tracker.start_scenario("s2", 2);
        tracker.complete_scenario();
        tracker.start_scenario("s3", 3);
        tracker.complete_scenario();
        tracker.complete_model(true);
        assert_eq!(tracker.state().global_progress_pct, 33);

        tracker.start_model("m1");
        tracker.skip_model("unreachable");
        tracker.start_model("m2");
        tracker.complete_model(false);

        let state = tracker.state();
        assert_eq!(state.global_progress_pct, 100);
        assert_eq!((state.success_count, state.fail_count, state.skip_count), (1, 1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_eta_uses_evaluated_models_only() {
        let mut tracker = ProgressTracker::new();
        tracker.initialize(&ids(4), 1);
        assert_eq!(tracker.state().estimated_remaining_secs, None);

        tracker.start_model("m0");
        tracker.skip_model("offline");
        assert_eq!(tracker.state().estimated_remaining_secs, None);

        tracker.start_model("m1");
        tokio::time::advance(Duration::from_secs(10)).await;
        tracker.complete_model(true);
        tracker.start_model("m2");
        tokio::time::advance(Duration::from_secs(30)).await;
        tracker.complete_model(true);

        // avg 20 s × 1 remaining model
        assert_eq!(tracker.state().estimated_remaining_secs, Some(20.0));
        assert!(tracker.state().elapsed_secs >= 40.0);
    }

    #[test]
    fn test_two_phase_cancellation() {
        let mut tracker = ProgressTracker::new();
        tracker.initialize(&ids(2), 1);
        tracker.start_model("m0");

        tracker.request_cancellation();
        let state = tracker.state();
        assert!(state.is_cancellation_requested);
        assert_eq!(state.phase, ProgressPhase::Running);
        assert_eq!(state.current_model.as_deref(), Some("m0"));

        tracker.cancel();
        let state = tracker.state();
        assert_eq!(state.phase, ProgressPhase::Cancelled);
        assert!(state.current_model.is_none());
    }

    #[test]
    fn test_observers_receive_every_mutation() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut tracker = ProgressTracker::new();
        tracker.on_progress(|_| panic!("faulty observer"));
        let sink = seen.clone();
        tracker.on_progress(move |state: &ProgressState| {
            sink.lock().unwrap().push(state.global_progress_pct);
        });

        tracker.initialize(&ids(2), 1);
        tracker.start_model("m0");
        tracker.complete_model(true);
        tracker.add_error("late failure");
        tracker.complete();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 5);
        assert_eq!(seen[2], 50);
        assert_eq!(tracker.state().phase, ProgressPhase::Completed);
    }

    #[test]
    fn test_model_progress_override_and_observer_removal() {
        let calls = Arc::new(Mutex::new(0usize));
        let mut tracker = ProgressTracker::new();
        let counter = calls.clone();
        let id = tracker.on_progress(move |_| *counter.lock().unwrap() += 1);

        tracker.initialize(&ids(2), 3);
        tracker.start_model("m0");
        tracker.update_model_progress(150.0);
        let state = tracker.state();
        assert_eq!(state.model_progress_pct, 100.0);
        assert_eq!(state.global_progress_pct, 50);

        assert!(tracker.remove_observer(id));
        tracker.update_model_progress(20.0);
        assert_eq!(*calls.lock().unwrap(), 3);
        assert_eq!(tracker.state().per_model["m0"], 20.0);
    }

    #[test]
    fn test_restore_and_error() {
        let mut tracker = ProgressTracker::new();
        tracker.initialize(&ids(2), 2);
        tracker.restore_model("m0", false, true);
        assert_eq!(tracker.state().completed_models, 1);
        assert_eq!(tracker.state().skip_count, 1);

        tracker.error("session store unavailable");
        let state = tracker.state();
        assert_eq!(state.phase, ProgressPhase::Error);
        assert_eq!(state.last_error.as_deref(), Some("session store unavailable"));
    }
}
