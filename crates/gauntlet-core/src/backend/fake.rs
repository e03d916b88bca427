//! Scripted in-process backend
//!
//! Replays queued replies step by step. Used by tests and by dry runs that
//! exercise the whole pipeline without a model server.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{ChatRequest, ChunkEvent, ChunkSender, ModelBackend, TokenUsage};
use crate::error::{GauntletError, GauntletResult};
use crate::types::ModelUnderTest;

/// One step of a scripted reply
#[derive(Debug, Clone)]
pub enum FakeStep {
    /// Emit a content chunk
    Chunk(String),
    /// Wait before the next step
    Delay(Duration),
    /// Emit the terminal `Done` event
    Done,
    /// Emit a mid-stream error event
    Error(String),
    /// Return an error from `send_chat`
    Fail(GauntletError),
    /// Stop emitting and wait until cancelled
    Hang,
    /// Emit the chunk forever at the given interval
    Repeat(String, Duration),
}

/// A scripted reply to one `send_chat` call
#[derive(Debug, Clone)]
pub struct FakeReply {
    steps: Vec<FakeStep>,
}

impl FakeReply {
    /// Reply built from explicit steps
    pub fn steps(steps: Vec<FakeStep>) -> Self {
        Self { steps }
    }

    /// Stream `text` word by word, then finish
    pub fn text(text: impl AsRef<str>) -> Self {
        let mut steps: Vec<FakeStep> = text
            .as_ref()
            .split_inclusive(' ')
            .map(|word| FakeStep::Chunk(word.to_string()))
            .collect();
        steps.push(FakeStep::Done);
        Self { steps }
    }

    /// Stream `text` with a delay before each chunk
    pub fn slow_text(text: impl AsRef<str>, per_chunk: Duration) -> Self {
        let mut steps = Vec::new();
        for word in text.as_ref().split_inclusive(' ') {
            steps.push(FakeStep::Delay(per_chunk));
            steps.push(FakeStep::Chunk(word.to_string()));
        }
        steps.push(FakeStep::Done);
        Self { steps }
    }

    /// Emit a prefix, then go silent
    pub fn stall_after(prefix: impl Into<String>) -> Self {
        Self {
            steps: vec![FakeStep::Chunk(prefix.into()), FakeStep::Hang],
        }
    }

    /// Keep streaming without ever finishing
    pub fn endless(chunk: impl Into<String>, interval: Duration) -> Self {
        Self {
            steps: vec![FakeStep::Repeat(chunk.into(), interval)],
        }
    }

    /// Fail the call with an error
    pub fn fail(error: GauntletError) -> Self {
        Self {
            steps: vec![FakeStep::Fail(error)],
        }
    }

    /// Report an error event mid-stream
    pub fn stream_error(message: impl Into<String>) -> Self {
        Self {
            steps: vec![FakeStep::Error(message.into())],
        }
    }
}

/// Scripted backend with queued replies and failure injection
pub struct FakeBackend {
    name: String,
    available: AtomicBool,
    replies: Mutex<VecDeque<FakeReply>>,
    fallback: FakeReply,
    init_failures: Mutex<VecDeque<GauntletError>>,
    requests: Mutex<Vec<ChatRequest>>,
    init_calls: AtomicU32,
}

impl FakeBackend {
    /// Create a backend that answers every turn with a task block
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            available: AtomicBool::new(true),
            replies: Mutex::new(VecDeque::new()),
            fallback: FakeReply::text("<task>acknowledge the request</task>"),
            init_failures: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            init_calls: AtomicU32::new(0),
        }
    }

    /// Reply used once the queue is empty
    pub fn with_fallback(mut self, reply: FakeReply) -> Self {
        self.fallback = reply;
        self
    }

    /// Queue replies consumed in call order
    pub fn with_replies(self, replies: impl IntoIterator<Item = FakeReply>) -> Self {
        self.replies
            .lock()
            .expect("fake backend lock poisoned")
            .extend(replies);
        self
    }

    /// Fail the next `initialize` calls with these errors
    pub fn with_init_failures(self, failures: impl IntoIterator<Item = GauntletError>) -> Self {
        self.init_failures
            .lock()
            .expect("fake backend lock poisoned")
            .extend(failures);
        self
    }

    /// Set the availability probe answer
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Builder form of [`set_available`](Self::set_available)
    pub fn unavailable(self) -> Self {
        self.set_available(false);
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .expect("fake backend lock poisoned")
            .clone()
    }

    /// Number of `send_chat` calls
    pub fn call_count(&self) -> usize {
        self.requests.lock().expect("fake backend lock poisoned").len()
    }

    /// Number of `initialize` calls
    pub fn init_count(&self) -> u32 {
        self.init_calls.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> FakeReply {
        self.replies
            .lock()
            .expect("fake backend lock poisoned")
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }

    async fn play(reply: FakeReply, chunks: &ChunkSender, cancel: &CancellationToken) -> GauntletResult<()> {
        let mut completion_tokens = 0u32;
        for step in reply.steps {
            match step {
                FakeStep::Chunk(text) => {
                    completion_tokens += 1;
                    if chunks.send(ChunkEvent::Content(text)).is_err() {
                        return Ok(());
                    }
                }
                FakeStep::Delay(duration) => {
                    tokio::select! {
                        _ = tokio::time::sleep(duration) => {}
                        _ = cancel.cancelled() => return Err(GauntletError::Cancelled),
                    }
                }
                FakeStep::Done => {
                    let usage = TokenUsage {
                        prompt_tokens: 0,
                        completion_tokens,
                    };
                    let _ = chunks.send(ChunkEvent::Done(Some(usage)));
                    return Ok(());
                }
                FakeStep::Error(message) => {
                    let _ = chunks.send(ChunkEvent::Error(message));
                    return Ok(());
                }
                FakeStep::Fail(error) => return Err(error),
                FakeStep::Hang => {
                    cancel.cancelled().await;
                    return Err(GauntletError::Cancelled);
                }
                FakeStep::Repeat(text, interval) => loop {
                    tokio::select! {
                        _ = tokio::time::sleep(interval) => {
                            if chunks.send(ChunkEvent::Content(text.clone())).is_err() {
                                return Ok(());
                            }
                        }
                        _ = cancel.cancelled() => return Err(GauntletError::Cancelled),
                    }
                },
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ModelBackend for FakeBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&self, _model: &ModelUnderTest) -> GauntletResult<()> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        let failure = self
            .init_failures
            .lock()
            .expect("fake backend lock poisoned")
            .pop_front();
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn send_chat(
        &self,
        request: ChatRequest,
        chunks: ChunkSender,
        cancel: CancellationToken,
    ) -> GauntletResult<()> {
        self.requests
            .lock()
            .expect("fake backend lock poisoned")
            .push(request);
        let reply = self.next_reply();
        Self::play(reply, &chunks, &cancel).await
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::chunk_channel;

    fn request() -> ChatRequest {
        ChatRequest {
            model: "m".to_string(),
            system_prompt: String::new(),
            history: Vec::new(),
            message: "hi".to_string(),
        }
    }

    #[tokio::test]
    async fn test_text_reply_streams_words() {
        let backend = FakeBackend::new("fake").with_replies([FakeReply::text("hello big world")]);
        let (tx, mut rx) = chunk_channel();

        backend
            .send_chat(request(), tx, CancellationToken::new())
            .await
            .unwrap();

        let mut text = String::new();
        while let Ok(event) = rx.try_recv() {
            match event {
                ChunkEvent::Content(c) => text.push_str(&c),
                ChunkEvent::Done(usage) => assert_eq!(usage.unwrap().completion_tokens, 3),
                ChunkEvent::Error(e) => panic!("unexpected error {e}"),
            }
        }
        assert_eq!(text, "hello big world");
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_hang_returns_on_cancel() {
        let backend = FakeBackend::new("fake").with_replies([FakeReply::stall_after("partial")]);
        let (tx, _rx) = chunk_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = backend.send_chat(request(), tx, cancel).await;
        assert!(matches!(result, Err(GauntletError::Cancelled)));
    }

    #[tokio::test]
    async fn test_init_failures_are_consumed_in_order() {
        let backend = FakeBackend::new("fake")
            .with_init_failures([GauntletError::scenario_logic("agent setup failed")]);
        let model = ModelUnderTest::local("m");

        assert!(backend.initialize(&model).await.is_err());
        assert!(backend.initialize(&model).await.is_ok());
        assert_eq!(backend.init_count(), 2);
    }
}
