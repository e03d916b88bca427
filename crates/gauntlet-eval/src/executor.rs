//! Scenario executor
//!
//! Plays one scripted conversation against one model. Scripted agent turns
//! are replayed into the history; every user turn is sent with the full
//! prior history and answered through the [`ResponseAggregator`].
//!
//! Scenario-level failures (timeouts, crashes, backend errors) end the
//! scenario early and are recorded in its result. Anything else escapes to
//! the caller's retry loop.

use async_trait::async_trait;
use gauntlet_core::{
    ChatMessage, ChatRequest, EvalConfig, GauntletError, GauntletResult, ModelBackend, ModelUnderTest,
    Scenario, ScenarioResult, Turn,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::aggregator::{ResponseAggregator, TurnState, TurnTimers};
use crate::scoring::{ScoredResponse, score_responses};

/// Hooks called while a scenario runs
///
/// `turn_index` is the zero-based index among the scenario's user turns and
/// `conversation` holds every turn so far, including the pending user turn.
#[async_trait]
pub trait ScenarioObserver: Send {
    fn turn_started(&mut self, _scenario: &Scenario, _turn_index: usize, _conversation: &[Turn]) {}

    fn chunk_received(
        &mut self,
        _scenario: &Scenario,
        _turn_index: usize,
        _conversation: &[Turn],
        _partial_response: &str,
    ) {
    }

    /// Called once a turn has been answered; an error aborts the scenario
    async fn turn_completed(
        &mut self,
        _scenario: &Scenario,
        _turn_index: usize,
        _conversation: &[Turn],
    ) -> GauntletResult<()> {
        Ok(())
    }
}

/// Observer that ignores every event
pub struct NoopObserver;

impl ScenarioObserver for NoopObserver {}

/// Runs scenarios against one backend
pub struct ScenarioExecutor<'a> {
    backend: &'a dyn ModelBackend,
    config: &'a EvalConfig,
    shutdown: CancellationToken,
}

impl<'a> ScenarioExecutor<'a> {
    pub fn new(backend: &'a dyn ModelBackend, config: &'a EvalConfig, shutdown: CancellationToken) -> Self {
        Self {
            backend,
            config,
            shutdown,
        }
    }

    fn timers(&self) -> TurnTimers {
        TurnTimers {
            stall: self.config.stall_window(),
            overall: self.config.overall_turn_timeout(),
        }
    }

    /// Run one scenario and score it
    #[instrument(skip_all, fields(model_id = %model.id, scenario_id = %scenario.id))]
    pub async fn run_scenario(
        &self,
        model: &ModelUnderTest,
        scenario: &Scenario,
        observer: &mut dyn ScenarioObserver,
    ) -> GauntletResult<ScenarioResult> {
        scenario.validate()?;

        let aggregator = ResponseAggregator::new(self.backend, self.timers(), self.shutdown.clone());
        let system_prompt = self.config.system_prompt_for(&scenario.agent_role);
        let mut preamble = scenario.context_preamble();

        let mut result = ScenarioResult::new(&scenario.id);
        let mut conversation: Vec<Turn> = Vec::with_capacity(scenario.turns.len() * 2);
        let mut responses: Vec<(String, &[String])> = Vec::new();
        let mut latencies: Vec<Duration> = Vec::new();
        let mut turn_index = 0usize;

        for turn in &scenario.turns {
            if !turn.is_user() {
                conversation.push(turn.clone());
                continue;
            }

            let message = match preamble.take() {
                Some(context) => format!("{}\n{}", context, turn.message),
                None => turn.message.clone(),
            };
            let request = ChatRequest {
                model: model.id.clone(),
                system_prompt: system_prompt.clone(),
                history: conversation.iter().map(ChatMessage::from).collect(),
                message: message.clone(),
            };

            let mut sent = Turn::user(message);
            sent.expected_task_hints = turn.expected_task_hints.clone();
            conversation.push(sent);
            observer.turn_started(scenario, turn_index, &conversation);

            let outcome = {
                let history = conversation.as_slice();
                let mut on_chunk =
                    |partial: &str| observer.chunk_received(scenario, turn_index, history, partial);
                aggregator.collect(request, &mut on_chunk).await
            };

            match outcome {
                Ok(response) => {
                    debug!(
                        turn = turn_index,
                        chunks = response.chunk_count,
                        latency_ms = response.latency.as_millis() as u64,
                        "Turn completed"
                    );
                    latencies.push(response.latency);
                    conversation.push(Turn::agent(response.text.clone()));
                    responses.push((response.text, turn.expected_task_hints.as_slice()));
                    observer
                        .turn_completed(scenario, turn_index, &conversation)
                        .await?;
                }
                Err(error) if error.is_scenario_level() => {
                    warn!(
                        turn = turn_index,
                        state = %TurnState::for_error(&error),
                        error = %error,
                        "Turn failed, ending scenario"
                    );
                    result.record_error(&error);
                    break;
                }
                Err(error) => return Err(error),
            }
            turn_index += 1;
        }

        // Every user turn counts; unanswered ones earn no credit
        for turn in scenario.turns.iter().filter(|t| t.is_user()).skip(responses.len()) {
            responses.push((String::new(), turn.expected_task_hints.as_slice()));
        }
        let scored: Vec<ScoredResponse<'_>> = responses
            .iter()
            .map(|(text, hints)| ScoredResponse {
                text: text.as_str(),
                hints: *hints,
            })
            .collect();
        let score = score_responses(&scored);

        result.average_latency_ms = average_ms(&latencies);
        result.apply_score(score.success_rate, score.task_execution_success);
        result.conversation_log = conversation;

        debug!(
            mode = ?score.mode,
            success_rate = result.success_rate,
            task_execution_success = result.task_execution_success,
            "Scenario scored"
        );
        Ok(result)
    }
}

fn average_ms(latencies: &[Duration]) -> f64 {
    if latencies.is_empty() {
        return 0.0;
    }
    latencies.iter().map(|d| d.as_secs_f64() * 1000.0).sum::<f64>() / latencies.len() as f64
}

/// Whether an error escaping a scenario should be retried
///
/// Availability errors skip the model, cancellation interrupts it and fatal
/// errors abort the run.
pub fn is_retryable(error: &GauntletError) -> bool {
    !error.is_fatal()
        && !matches!(
            error,
            GauntletError::Cancelled | GauntletError::Availability { .. }
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_core::{FakeBackend, FakeReply};

    #[derive(Default)]
    struct Recorder {
        started: Vec<usize>,
        partials: usize,
        completed: Vec<(usize, usize)>,
    }

    #[async_trait]
    impl ScenarioObserver for Recorder {
        fn turn_started(&mut self, _scenario: &Scenario, turn_index: usize, _conversation: &[Turn]) {
            self.started.push(turn_index);
        }

        fn chunk_received(&mut self, _: &Scenario, _: usize, _: &[Turn], _: &str) {
            self.partials += 1;
        }

        async fn turn_completed(
            &mut self,
            _scenario: &Scenario,
            turn_index: usize,
            conversation: &[Turn],
        ) -> GauntletResult<()> {
            self.completed.push((turn_index, conversation.len()));
            Ok(())
        }
    }

    fn two_turn_scenario() -> Scenario {
        Scenario::new("deploy", "Deploy")
            .with_agent_role("release engineer")
            .with_context_file("deploy.md", "steps: build, ship")
            .with_turn(Turn::user("Plan the deploy").with_hints(["build"]))
            .with_turn(Turn::agent("Scripted acknowledgement"))
            .with_turn(Turn::user("Now ship it").with_hints(["ship"]))
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_history_and_context_prefix() {
        let backend = FakeBackend::new("fake").with_replies([
            FakeReply::text("<task>build the image</task>"),
            FakeReply::text("<task>ship to prod</task>"),
        ]);
        let config = EvalConfig::default();
        let executor = ScenarioExecutor::new(&backend, &config, CancellationToken::new());
        let mut recorder = Recorder::default();

        let result = executor
            .run_scenario(&ModelUnderTest::remote("m"), &two_turn_scenario(), &mut recorder)
            .await
            .unwrap();

        assert_eq!(result.success_rate, 1.0);
        assert!(result.task_execution_success);
        assert_eq!(result.conversation_log.len(), 5);

        let requests = backend.requests();
        assert!(requests[0].message.starts_with("--- deploy.md ---\nsteps: build, ship\n"));
        assert!(requests[0].message.ends_with("Plan the deploy"));
        assert!(requests[0].system_prompt.contains("release engineer"));
        assert!(requests[0].history.is_empty());
        // first user turn, its answer and the replayed scripted turn
        assert_eq!(requests[1].history.len(), 3);
        assert_eq!(requests[1].history[2].content, "Scripted acknowledgement");
        assert_eq!(requests[1].message, "Now ship it");

        assert_eq!(recorder.started, vec![0, 1]);
        assert_eq!(recorder.completed, vec![(0, 2), (1, 5)]);
        assert!(recorder.partials >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stall_ends_scenario_and_marks_timeout() {
        let backend = FakeBackend::new("fake").with_replies([
            FakeReply::text("<task>build it</task>"),
            FakeReply::stall_after("<task>ship"),
        ]);
        let config = EvalConfig::default();
        let executor = ScenarioExecutor::new(&backend, &config, CancellationToken::new());

        let result = executor
            .run_scenario(&ModelUnderTest::remote("m"), &two_turn_scenario(), &mut NoopObserver)
            .await
            .unwrap();

        assert!(result.timed_out);
        assert!(!result.crashed);
        assert!(!result.task_execution_success);
        assert_eq!(result.success_rate, 0.5);
        assert!(result.errors[0].starts_with("[stall]"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_crash_is_recorded_not_raised() {
        let backend = FakeBackend::new("fake")
            .with_replies([FakeReply::fail(GauntletError::backend_crash("connection refused"))]);
        let config = EvalConfig::default();
        let executor = ScenarioExecutor::new(&backend, &config, CancellationToken::new());

        let result = executor
            .run_scenario(&ModelUnderTest::remote("m"), &two_turn_scenario(), &mut NoopObserver)
            .await
            .unwrap();

        assert!(result.crashed);
        assert!(!result.timed_out);
        assert_eq!(result.success_rate, 0.0);
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logic_error_escapes() {
        let backend = FakeBackend::new("fake")
            .with_replies([FakeReply::fail(GauntletError::scenario_logic("agent state corrupted"))]);
        let config = EvalConfig::default();
        let executor = ScenarioExecutor::new(&backend, &config, CancellationToken::new());

        let error = executor
            .run_scenario(&ModelUnderTest::remote("m"), &two_turn_scenario(), &mut NoopObserver)
            .await
            .unwrap_err();
        assert!(matches!(error, GauntletError::ScenarioLogic(_)));
        assert!(is_retryable(&error));
        assert!(!is_retryable(&GauntletError::availability("m", "model not loaded")));
        assert!(!is_retryable(&GauntletError::Cancelled));
    }

    #[tokio::test]
    async fn test_invalid_scenario_is_logic_error() {
        let backend = FakeBackend::new("fake");
        let config = EvalConfig::default();
        let executor = ScenarioExecutor::new(&backend, &config, CancellationToken::new());
        let empty = Scenario::new("empty", "No turns");

        let error = executor
            .run_scenario(&ModelUnderTest::remote("m"), &empty, &mut NoopObserver)
            .await
            .unwrap_err();
        assert!(matches!(error, GauntletError::ScenarioLogic(_)));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lenient_scoring_without_markers() {
        let backend = FakeBackend::new("fake")
            .with_fallback(FakeReply::text("I would first build and then ship the release."));
        let config = EvalConfig::default();
        let executor = ScenarioExecutor::new(&backend, &config, CancellationToken::new());

        let result = executor
            .run_scenario(&ModelUnderTest::remote("m"), &two_turn_scenario(), &mut NoopObserver)
            .await
            .unwrap();

        assert_eq!(result.success_rate, 0.5);
        assert!(!result.task_execution_success);
    }
}
