//! Evaluation orchestrator
//!
//! Drives every model of a session through the scenario battery, one model
//! and one scenario at a time, in caller order. Each model gets a bounded
//! retry loop; a retry discards the failed attempt and restarts from the
//! first scenario. Completed models are persisted immediately so a
//! cancelled, crashed or failed run can be resumed without redoing them.

use async_trait::async_trait;
use gauntlet_core::{
    BackendRegistry, EvalConfig, GauntletError, GauntletResult, ModelBackend, ModelResult, ModelUnderTest,
    ObserverId, Scenario, ScenarioResult, Turn,
};
use gauntlet_session::{
    ConversationSnapshot, LivePreviewSnapshot, SessionStatus, SessionStorage, SessionStore, StorageError,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::executor::{ScenarioExecutor, ScenarioObserver, is_retryable};
use crate::progress::{ProgressState, ProgressTracker};
use crate::report::{EvaluationReport, generate_report, report_file_name};

/// Handle used to stop a run from another task
///
/// [`request`](Self::request) is advisory: the run stops at its next
/// checkpoint and in-flight turns finish or time out on their own.
/// [`pause`](Self::pause) stops the same way but leaves the session
/// `paused` instead of `cancelled`. [`force`](Self::force) also cancels the
/// in-flight backend call.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    requested: Arc<AtomicBool>,
    pause: Arc<AtomicBool>,
    shutdown: CancellationToken,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop at the next checkpoint
    pub fn request(&self) {
        if !self.requested.swap(true, Ordering::SeqCst) {
            info!("Cancellation requested");
        }
    }

    /// Stop at the next checkpoint and leave the session paused
    pub fn pause(&self) {
        if !self.pause.swap(true, Ordering::SeqCst) {
            info!("Pause requested");
        }
        self.request();
    }

    /// Stop immediately, cancelling the in-flight turn
    pub fn force(&self) {
        self.request();
        if !self.shutdown.is_cancelled() {
            warn!("Forced shutdown");
            self.shutdown.cancel();
        }
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// A pause was requested and no forced shutdown overrode it
    pub fn is_pause_requested(&self) -> bool {
        self.pause.load(Ordering::SeqCst) && !self.is_forced()
    }

    pub fn is_forced(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Token cancelled on forced shutdown
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

/// How a model's evaluation ended
enum ModelOutcome {
    /// A terminal result was recorded
    Finished,
    /// Stopped by cancellation before a result was recorded
    Interrupted,
}

/// Runs evaluation sessions
pub struct EvaluationOrchestrator {
    config: EvalConfig,
    backends: BackendRegistry,
    store: SessionStore,
    tracker: ProgressTracker,
    cancel: CancelHandle,
}

impl EvaluationOrchestrator {
    pub fn new(config: EvalConfig, backends: BackendRegistry, storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            config,
            backends,
            store: SessionStore::new(storage),
            tracker: ProgressTracker::new(),
            cancel: CancelHandle::new(),
        }
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Handle for cancelling the run from another task
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Session store holding the active session
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Current progress snapshot
    pub fn progress(&self) -> ProgressState {
        self.tracker.state()
    }

    /// Register a progress observer
    pub fn on_progress<F>(&mut self, observer: F) -> ObserverId
    where
        F: Fn(&ProgressState) + Send + Sync + 'static,
    {
        self.tracker.on_progress(observer)
    }

    /// Register a live preview observer
    pub fn on_live_preview<F>(&mut self, observer: F) -> ObserverId
    where
        F: Fn(&LivePreviewSnapshot) + Send + Sync + 'static,
    {
        self.store.on_live_preview(observer)
    }

    /// Evaluate `models` against `scenarios` in a new session
    #[instrument(skip_all, fields(models = models.len(), scenarios = scenarios.len()))]
    pub async fn run(
        &mut self,
        models: Vec<ModelUnderTest>,
        scenarios: Vec<Scenario>,
    ) -> GauntletResult<Vec<ModelResult>> {
        validate_run(&models, &scenarios)?;

        let run_config = self.config.run_config();
        if let Err(e) = self.store.create_session(models, scenarios, run_config).await {
            return Err(self.abort(store_failure(e)).await);
        }
        self.execute().await
    }

    /// Continue a stored session with the models it has not finished
    #[instrument(skip(self))]
    pub async fn resume(&mut self, session_id: &str) -> GauntletResult<Vec<ModelResult>> {
        let session = self.store.load_session(session_id).await?;
        let status = session.status;
        let run_config = session.config;
        self.config.apply_run_config(&run_config);

        if self.store.remaining_models().is_empty() {
            info!(session_id, "Nothing left to evaluate");
            if status != SessionStatus::Completed {
                self.set_status(SessionStatus::Running).await?;
                self.set_status(SessionStatus::Completed).await?;
            }
            return Ok(self.store.results());
        }

        if !status.is_resumable() {
            return Err(GauntletError::config(format!(
                "session {} is {} and cannot be resumed",
                session_id, status
            )));
        }
        info!(
            session_id,
            %status,
            remaining = self.store.remaining_models().len(),
            "Resuming evaluation session"
        );
        self.set_status(SessionStatus::Running).await?;
        self.execute().await
    }

    async fn execute(&mut self) -> GauntletResult<Vec<ModelResult>> {
        let (model_ids, scenarios, finished) = match self.store.session() {
            Some(session) => (
                session.models.iter().map(|m| m.id.clone()).collect::<Vec<_>>(),
                session.scenarios.clone(),
                session.partial_results.clone(),
            ),
            None => return Err(self.abort(store_failure(StorageError::NoActiveSession)).await),
        };

        self.tracker.initialize(&model_ids, scenarios.len());
        for result in &finished {
            self.tracker
                .restore_model(&result.model_id, result.success, result.skipped);
        }

        let remaining = self.store.remaining_models();
        let mut interrupted = false;
        for (position, model) in remaining.iter().enumerate() {
            if position > 0 {
                self.cooldown().await;
            }
            if self.cancellation_requested() {
                info!(model_id = %model.id, "Cancellation observed, not starting model");
                break;
            }

            match self.evaluate_model(model, &scenarios).await {
                Ok(ModelOutcome::Finished) => {}
                Ok(ModelOutcome::Interrupted) => {
                    interrupted = true;
                    break;
                }
                Err(e) => return Err(self.abort(e).await),
            }
        }

        let cancelled = interrupted || self.cancellation_requested();
        self.finalize(cancelled).await
    }

    #[instrument(skip_all, fields(model_id = %model.id))]
    async fn evaluate_model(
        &mut self,
        model: &ModelUnderTest,
        scenarios: &[Scenario],
    ) -> GauntletResult<ModelOutcome> {
        self.store.start_model(&model.id).await.map_err(store_failure)?;
        self.tracker.start_model(&model.id);

        let Some(backend) = self.backends.resolve(model) else {
            let reason = format!("no backend registered as '{}'", model.backend_ref);
            return self.skip_model(model, &reason).await;
        };

        if model.kind.requires_probe() {
            if let Err(e) = self.probe(model, backend.as_ref()).await {
                return self.skip_model(model, &e.to_string()).await;
            }
        }

        let started = Instant::now();
        let mut retry_count = 0u32;
        loop {
            let attempt = self.run_attempt(model, backend.as_ref(), scenarios).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let error = match attempt {
                Ok(results) => {
                    let result = ModelResult::completed(&model.id, results, retry_count, elapsed_ms);
                    return self.finish_model(result).await;
                }
                Err(e) => e,
            };

            if !is_retryable(&error) {
                if matches!(error, GauntletError::Cancelled) {
                    return self.interrupt_model(model).await;
                }
                if matches!(error, GauntletError::Availability { .. }) {
                    return self.skip_model(model, &error.to_string()).await;
                }
                return Err(error);
            }

            let scenario_id = self
                .store
                .session()
                .and_then(|s| s.current_scenario_id.clone());
            warn!(attempt = retry_count + 1, error = %error, "Model attempt failed");
            self.store
                .add_error(&model.id, scenario_id.as_deref(), error.to_string())
                .await
                .map_err(store_failure)?;
            self.tracker.add_error(format!("{}: {}", model.id, error));

            if retry_count >= self.config.max_retries {
                let result = ModelResult::failed(&model.id, retry_count, elapsed_ms);
                return self.finish_model(result).await;
            }
            if self.cancellation_requested() {
                info!("Cancellation requested, not retrying");
                let result = ModelResult::failed(&model.id, retry_count, elapsed_ms);
                return self.finish_model(result).await;
            }

            if !self.sleep_unless_forced(self.config.retry_delay()).await {
                return self.interrupt_model(model).await;
            }
            if self.cancellation_requested() {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                let result = ModelResult::failed(&model.id, retry_count, elapsed_ms);
                return self.finish_model(result).await;
            }

            retry_count += 1;
            info!(attempt = retry_count + 1, "Retrying model from the first scenario");
            self.tracker.restart_model();
        }
    }

    /// One pass over the battery; any escaping error fails the attempt
    async fn run_attempt(
        &mut self,
        model: &ModelUnderTest,
        backend: &dyn ModelBackend,
        scenarios: &[Scenario],
    ) -> GauntletResult<Vec<ScenarioResult>> {
        backend.initialize(model).await?;

        let Self {
            config,
            store,
            tracker,
            cancel,
            ..
        } = self;
        let executor = ScenarioExecutor::new(backend, config, cancel.shutdown_token());
        let session_id = store.session_id().unwrap_or_default().to_string();
        let mut results = Vec::with_capacity(scenarios.len());

        for (index, scenario) in scenarios.iter().enumerate() {
            if observe_cancellation(cancel, tracker) {
                return Err(GauntletError::Cancelled);
            }
            store
                .update_session_progress(Some(&model.id), Some(&scenario.id))
                .await
                .map_err(store_failure)?;
            tracker.start_scenario(&scenario.id, index);

            let result = {
                let mut recorder = TurnRecorder {
                    store: &*store,
                    tracker: &mut *tracker,
                    session_id: &session_id,
                    model_id: &model.id,
                    user_turns: scenario.user_turn_count(),
                };
                executor.run_scenario(model, scenario, &mut recorder).await?
            };

            for message in &result.errors {
                store
                    .add_error(&model.id, Some(&scenario.id), message.clone())
                    .await
                    .map_err(store_failure)?;
                tracker.add_error(format!("{}/{}: {}", model.id, scenario.id, message));
            }
            debug!(
                scenario_id = %scenario.id,
                success_rate = result.success_rate,
                timed_out = result.timed_out,
                crashed = result.crashed,
                "Scenario finished"
            );
            tracker.complete_scenario();
            results.push(result);
        }

        Ok(results)
    }

    async fn probe(&self, model: &ModelUnderTest, backend: &dyn ModelBackend) -> GauntletResult<()> {
        let timeout = self.config.probe_timeout();
        match tokio::time::timeout(timeout, backend.is_available()).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(GauntletError::availability(&model.id, "backend reported unavailable")),
            Err(_) => Err(GauntletError::availability(
                &model.id,
                format!("availability probe timed out after {}ms", timeout.as_millis()),
            )),
        }
    }

    async fn skip_model(&mut self, model: &ModelUnderTest, reason: &str) -> GauntletResult<ModelOutcome> {
        warn!(model_id = %model.id, reason, "Skipping model");
        self.store
            .skip_model(&model.id, reason)
            .await
            .map_err(store_failure)?;
        self.tracker.add_error(format!("{}: skipped: {}", model.id, reason));
        self.tracker.skip_model(reason);
        Ok(ModelOutcome::Finished)
    }

    async fn finish_model(&mut self, result: ModelResult) -> GauntletResult<ModelOutcome> {
        info!(
            model_id = %result.model_id,
            success = result.success,
            retry_count = result.retry_count,
            scenarios = result.scenario_results.len(),
            "Model finished"
        );
        let success = result.success;
        self.store.complete_model(result).await.map_err(store_failure)?;
        self.tracker.complete_model(success);
        Ok(ModelOutcome::Finished)
    }

    /// Leave the model without a result so a resume runs it again
    async fn interrupt_model(&mut self, model: &ModelUnderTest) -> GauntletResult<ModelOutcome> {
        info!(model_id = %model.id, "Model interrupted, partial attempt discarded");
        self.store
            .add_error(&model.id, None, "interrupted by cancellation; will re-run on resume")
            .await
            .map_err(store_failure)?;
        self.tracker.abandon_model();
        Ok(ModelOutcome::Interrupted)
    }

    async fn finalize(&mut self, cancelled: bool) -> GauntletResult<Vec<ModelResult>> {
        let status = if !cancelled {
            SessionStatus::Completed
        } else if self.cancel.is_pause_requested() {
            SessionStatus::Paused
        } else {
            SessionStatus::Cancelled
        };

        if self.config.write_report {
            if let Err(e) = self.write_reports(status).await {
                return Err(self.abort(e).await);
            }
        }
        if let Err(e) = self.store.update_status(status).await {
            return Err(self.abort(store_failure(e)).await);
        }

        if cancelled {
            self.tracker.cancel();
        } else {
            self.tracker.complete();
        }
        let results = self.store.results();
        info!(%status, models = results.len(), "Evaluation finished");
        Ok(results)
    }

    async fn write_reports(&self, status: SessionStatus) -> GauntletResult<()> {
        let session = self
            .store
            .session()
            .ok_or_else(|| GauntletError::fatal("no active session to report on"))?;
        let report = EvaluationReport::from_session(session, status);

        for format in &self.config.report_formats {
            let content = generate_report(&report, *format)
                .map_err(|e| GauntletError::fatal(format!("report generation failed: {}", e)))?;
            let name = report_file_name(*format);
            self.store
                .save_report(&name, &content)
                .await
                .map_err(|e| GauntletError::fatal(format!("failed to write {}: {}", name, e)))?;
            debug!(report = %name, "Report written");
        }
        Ok(())
    }

    /// Mark the session failed and turn `error` into the error surfaced to the caller
    async fn abort(&mut self, error: GauntletError) -> GauntletError {
        let error = if matches!(error, GauntletError::OrchestratorFatal(_)) {
            error
        } else {
            GauntletError::fatal(error.to_string())
        };
        error!(error = %error, "Evaluation aborted");

        if self.store.session().is_some() {
            if let Err(e) = self.store.update_status(SessionStatus::Error).await {
                error!(error = %e, "Failed to mark session as failed");
            }
        }
        self.tracker.error(error.to_string());
        error
    }

    async fn set_status(&mut self, status: SessionStatus) -> GauntletResult<()> {
        match self.store.update_status(status).await {
            Ok(()) => Ok(()),
            Err(e @ StorageError::InvalidTransition { .. }) => Err(GauntletError::config(e.to_string())),
            Err(e) => Err(store_failure(e)),
        }
    }

    async fn cooldown(&self) {
        let cooldown = self.config.cooldown();
        if !cooldown.is_zero() {
            self.sleep_unless_forced(cooldown).await;
        }
    }

    /// Returns `false` if a forced shutdown cut the sleep short
    async fn sleep_unless_forced(&self, duration: Duration) -> bool {
        let shutdown = self.cancel.shutdown_token();
        tokio::select! {
            _ = shutdown.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    fn cancellation_requested(&mut self) -> bool {
        observe_cancellation(&self.cancel, &mut self.tracker)
    }
}

fn observe_cancellation(cancel: &CancelHandle, tracker: &mut ProgressTracker) -> bool {
    if cancel.is_requested() {
        tracker.request_cancellation();
        true
    } else {
        false
    }
}

fn store_failure(error: StorageError) -> GauntletError {
    GauntletError::fatal(format!("session store failure: {}", error))
}

fn validate_run(models: &[ModelUnderTest], scenarios: &[Scenario]) -> GauntletResult<()> {
    if models.is_empty() {
        return Err(GauntletError::config("no models to evaluate"));
    }
    if scenarios.is_empty() {
        return Err(GauntletError::config("no scenarios to run"));
    }

    let mut seen = HashSet::new();
    for model in models {
        if !seen.insert(model.id.as_str()) {
            return Err(GauntletError::config(format!("duplicate model id: {}", model.id)));
        }
    }
    let mut seen = HashSet::new();
    for scenario in scenarios {
        if !seen.insert(scenario.id.as_str()) {
            return Err(GauntletError::config(format!(
                "duplicate scenario id: {}",
                scenario.id
            )));
        }
        scenario
            .validate()
            .map_err(|e| GauntletError::config(e.to_string()))?;
    }
    Ok(())
}

/// Feeds turn events into snapshots, the live preview and the tracker
struct TurnRecorder<'a> {
    store: &'a SessionStore,
    tracker: &'a mut ProgressTracker,
    session_id: &'a str,
    model_id: &'a str,
    user_turns: usize,
}

impl<'a> TurnRecorder<'a> {
    fn preview(
        &self,
        scenario: &Scenario,
        turn_index: usize,
        conversation: &[Turn],
        partial: &str,
        is_streaming: bool,
    ) {
        let mut snapshot =
            LivePreviewSnapshot::new(self.session_id, self.model_id, &scenario.id, turn_index);
        snapshot.conversation = conversation.to_vec();
        snapshot.partial_response = partial.to_string();
        snapshot.is_streaming = is_streaming;
        self.store.update_live_preview(snapshot);
    }

    fn turn_pct(&self, turns_done: usize) -> f64 {
        if self.user_turns == 0 {
            return 100.0;
        }
        turns_done as f64 / self.user_turns as f64 * 100.0
    }
}

#[async_trait]
impl<'a> ScenarioObserver for TurnRecorder<'a> {
    fn turn_started(&mut self, scenario: &Scenario, turn_index: usize, conversation: &[Turn]) {
        self.tracker.update_scenario_progress(self.turn_pct(turn_index));
        self.preview(scenario, turn_index, conversation, "", true);
    }

    fn chunk_received(
        &mut self,
        scenario: &Scenario,
        turn_index: usize,
        conversation: &[Turn],
        partial_response: &str,
    ) {
        self.preview(scenario, turn_index, conversation, partial_response, true);
    }

    async fn turn_completed(
        &mut self,
        scenario: &Scenario,
        turn_index: usize,
        conversation: &[Turn],
    ) -> GauntletResult<()> {
        let snapshot = ConversationSnapshot {
            model_id: self.model_id.to_string(),
            scenario_id: scenario.id.clone(),
            turn_index,
            conversation: conversation.to_vec(),
            captured_at: chrono::Utc::now(),
        };
        self.store
            .save_conversation_snapshot(&snapshot)
            .await
            .map_err(store_failure)?;

        self.tracker.update_scenario_progress(self.turn_pct(turn_index + 1));
        self.preview(scenario, turn_index, conversation, "", false);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_core::{FakeBackend, FakeReply};
    use gauntlet_session::InMemorySessionStorage;
    use std::sync::Mutex;

    fn scenario(id: &str) -> Scenario {
        Scenario::new(id, id)
            .with_turn(Turn::user("first"))
            .with_turn(Turn::user("second"))
    }

    fn config() -> EvalConfig {
        EvalConfig::default()
            .with_cooldown_ms(0)
            .with_retry_delay_ms(1000)
            .without_report()
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_records_every_model() {
        let backend = Arc::new(FakeBackend::new("fake"));
        let registry = BackendRegistry::new()
            .with("a", backend.clone())
            .with("b", backend.clone());
        let storage = Arc::new(InMemorySessionStorage::new());
        let mut orchestrator = EvaluationOrchestrator::new(config(), registry, storage.clone());

        let results = orchestrator
            .run(
                vec![ModelUnderTest::remote("a"), ModelUnderTest::remote("b")],
                vec![scenario("s1"), scenario("s2")],
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success && r.retry_count == 0));
        assert_eq!(backend.call_count(), 8);

        let session = orchestrator.store().session().unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.completed_model_ids, vec!["a", "b"]);
        assert!(session.current_model_id.is_none());

        let snapshots = storage.snapshots(&session.session_id).await;
        assert_eq!(snapshots.len(), 8);
        assert_eq!(orchestrator.progress().global_progress_pct, 100);
    }

    #[tokio::test]
    async fn test_duplicate_models_rejected() {
        let mut orchestrator = EvaluationOrchestrator::new(
            config(),
            BackendRegistry::new(),
            Arc::new(InMemorySessionStorage::new()),
        );
        let err = orchestrator
            .run(
                vec![ModelUnderTest::remote("a"), ModelUnderTest::remote("a")],
                vec![scenario("s1")],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GauntletError::Config(_)));
        assert!(orchestrator.store().session().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_backend_skips_model() {
        let registry = BackendRegistry::new().with("b", Arc::new(FakeBackend::new("fake")));
        let mut orchestrator =
            EvaluationOrchestrator::new(config(), registry, Arc::new(InMemorySessionStorage::new()));

        let results = orchestrator
            .run(
                vec![ModelUnderTest::remote("a"), ModelUnderTest::remote("b")],
                vec![scenario("s1")],
            )
            .await
            .unwrap();

        assert!(results[0].skipped);
        assert!(results[1].success);
        let state = orchestrator.progress();
        assert_eq!(state.skip_count, 1);
        assert_eq!(state.success_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logic_errors_exhaust_retries() {
        let backend = Arc::new(FakeBackend::new("fake").with_init_failures(vec![
            GauntletError::scenario_logic("bad setup"),
            GauntletError::scenario_logic("bad setup"),
            GauntletError::scenario_logic("bad setup"),
        ]));
        let registry = BackendRegistry::new().with("a", backend.clone());
        let storage = Arc::new(InMemorySessionStorage::new());
        let mut orchestrator = EvaluationOrchestrator::new(config(), registry, storage);

        let results = orchestrator
            .run(vec![ModelUnderTest::remote("a")], vec![scenario("s1")])
            .await
            .unwrap();

        assert!(!results[0].success);
        assert_eq!(results[0].retry_count, 2);
        assert!(results[0].scenario_results.is_empty());
        assert_eq!(backend.init_count(), 3);
        assert_eq!(backend.call_count(), 0);

        let session = orchestrator.store().session().unwrap();
        assert_eq!(session.error_log.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_preview_follows_turns() {
        let backend = Arc::new(FakeBackend::new("fake").with_fallback(FakeReply::text("<task>done now</task>")));
        let registry = BackendRegistry::new().with("a", backend);
        let mut orchestrator =
            EvaluationOrchestrator::new(config(), registry, Arc::new(InMemorySessionStorage::new()));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        orchestrator.on_live_preview(move |snapshot| {
            sink.lock()
                .unwrap()
                .push((snapshot.turn_index, snapshot.is_streaming, snapshot.partial_response.clone()));
        });
        orchestrator.on_live_preview(|_| panic!("observer failure"));

        orchestrator
            .run(vec![ModelUnderTest::remote("a")], vec![scenario("s1")])
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert!(seen.contains(&(0, true, "<task>done ".to_string())));
        assert!(seen.contains(&(1, false, String::new())));
        let latest = orchestrator.store().latest_preview().unwrap();
        assert!(!latest.is_streaming);
        assert_eq!(latest.conversation.len(), 4);
    }

    #[test]
    fn test_cancel_handle() {
        let handle = CancelHandle::new();
        let clone = handle.clone();
        assert!(!handle.is_requested());

        clone.request();
        assert!(handle.is_requested());
        assert!(!handle.is_forced());

        clone.force();
        assert!(handle.is_forced());
        assert!(handle.shutdown_token().is_cancelled());
    }

    #[test]
    fn test_pause_is_a_request_until_forced() {
        let handle = CancelHandle::new();
        handle.pause();
        assert!(handle.is_requested());
        assert!(handle.is_pause_requested());

        handle.force();
        assert!(!handle.is_pause_requested());
    }
}
