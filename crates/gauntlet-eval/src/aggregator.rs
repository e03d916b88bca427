//! Streaming response aggregator
//!
//! Turns a backend's chunk stream into one completed response or one
//! failure. Each turn owns its two timers:
//!
//! - the stall timer, re-armed on every chunk, catches a backend that
//!   stopped talking
//! - the overall timer, never re-armed, caps a backend that streams forever
//!
//! Both are locals of [`ResponseAggregator::collect`]; they are dropped, and
//! the backend call is cancelled, as soon as the turn resolves either way.

use gauntlet_core::{
    ChatRequest, ChunkEvent, GauntletError, GauntletResult, ModelBackend, TimeoutKind, TokenUsage,
    chunk_channel,
};
use std::fmt;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Lifecycle of one turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Sending,
    StreamingChunks,
    Completed,
    StalledTimeout,
    OverallTimeout,
    BackendError,
}

impl TurnState {
    /// Terminal state a failed turn ends in
    pub fn for_error(error: &GauntletError) -> Self {
        match error.timeout_kind() {
            Some(TimeoutKind::Stall) => TurnState::StalledTimeout,
            Some(TimeoutKind::Overall) => TurnState::OverallTimeout,
            None => TurnState::BackendError,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TurnState::Completed
                | TurnState::StalledTimeout
                | TurnState::OverallTimeout
                | TurnState::BackendError
        )
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TurnState::Idle => "idle",
            TurnState::Sending => "sending",
            TurnState::StreamingChunks => "streaming",
            TurnState::Completed => "completed",
            TurnState::StalledTimeout => "stalled",
            TurnState::OverallTimeout => "timed_out",
            TurnState::BackendError => "backend_error",
        };
        f.write_str(s)
    }
}

/// Timer windows applied to every turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnTimers {
    /// Maximum silence between chunks
    pub stall: Duration,
    /// Hard ceiling on the whole turn
    pub overall: Duration,
}

/// A completed response
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedResponse {
    pub text: String,
    pub latency: Duration,
    pub chunk_count: usize,
    pub usage: Option<TokenUsage>,
}

/// Collects one streamed response under the turn timers
pub struct ResponseAggregator<'a> {
    backend: &'a dyn ModelBackend,
    timers: TurnTimers,
    shutdown: CancellationToken,
}

impl<'a> ResponseAggregator<'a> {
    /// `shutdown` is the run-wide forced-shutdown token
    pub fn new(backend: &'a dyn ModelBackend, timers: TurnTimers, shutdown: CancellationToken) -> Self {
        Self {
            backend,
            timers,
            shutdown,
        }
    }

    /// Send `request` and wait for the response
    ///
    /// `on_chunk` sees the accumulated text after every content chunk.
    pub async fn collect(
        &self,
        request: ChatRequest,
        on_chunk: &mut (dyn FnMut(&str) + Send),
    ) -> GauntletResult<AggregatedResponse> {
        let turn_cancel = self.shutdown.child_token();
        let _cancel_on_exit = turn_cancel.clone().drop_guard();

        let (tx, mut rx) = chunk_channel();
        let started = Instant::now();
        let mut state = TurnState::Idle;
        transition(&mut state, TurnState::Sending);

        let call = self.backend.send_chat(request, tx, turn_cancel);
        tokio::pin!(call);

        let overall = sleep_until(started + self.timers.overall);
        tokio::pin!(overall);
        let stall = sleep_until(started + self.timers.stall);
        tokio::pin!(stall);

        let mut text = String::new();
        let mut chunk_count = 0usize;
        let mut call_finished = false;
        let mut channel_closed = false;

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    debug!(%state, "Turn aborted by forced shutdown");
                    return Err(GauntletError::Cancelled);
                }

                event = rx.recv(), if !channel_closed => match event {
                    Some(ChunkEvent::Content(chunk)) => {
                        transition(&mut state, TurnState::StreamingChunks);
                        chunk_count += 1;
                        text.push_str(&chunk);
                        stall.as_mut().reset(Instant::now() + self.timers.stall);
                        on_chunk(&text);
                    }
                    Some(ChunkEvent::Done(usage)) => {
                        transition(&mut state, TurnState::Completed);
                        return Ok(AggregatedResponse {
                            text,
                            latency: started.elapsed(),
                            chunk_count,
                            usage,
                        });
                    }
                    Some(ChunkEvent::Error(message)) => {
                        let error = GauntletError::from_backend_message(message);
                        transition(&mut state, TurnState::for_error(&error));
                        return Err(error);
                    }
                    None => {
                        channel_closed = true;
                        if call_finished {
                            // Stream ended without an explicit Done
                            transition(&mut state, TurnState::Completed);
                            return Ok(AggregatedResponse {
                                text,
                                latency: started.elapsed(),
                                chunk_count,
                                usage: None,
                            });
                        }
                    }
                },

                result = &mut call, if !call_finished => {
                    call_finished = true;
                    if let Err(error) = result {
                        transition(&mut state, TurnState::for_error(&error));
                        return Err(error);
                    }
                    if channel_closed {
                        transition(&mut state, TurnState::Completed);
                        return Ok(AggregatedResponse {
                            text,
                            latency: started.elapsed(),
                            chunk_count,
                            usage: None,
                        });
                    }
                }

                _ = &mut overall => {
                    let error = GauntletError::turn_timeout(TimeoutKind::Overall, elapsed_ms(started));
                    transition(&mut state, TurnState::OverallTimeout);
                    return Err(error);
                }

                _ = &mut stall => {
                    let error = GauntletError::turn_timeout(TimeoutKind::Stall, elapsed_ms(started));
                    transition(&mut state, TurnState::StalledTimeout);
                    return Err(error);
                }
            }
        }
    }
}

fn transition(state: &mut TurnState, next: TurnState) {
    if *state != next {
        trace!(from = %state, to = %next, "Turn state");
        *state = next;
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
