//! Model backend capability
//!
//! A backend streams a chat completion as a sequence of [`ChunkEvent`]s and
//! answers an availability probe. Transport details stay behind the trait;
//! the evaluation engine only sees chunks, a terminal `Done`, and errors.

mod fake;
mod openai;
mod sse;

pub use fake::{FakeBackend, FakeReply, FakeStep};
pub use openai::OpenAiCompatibleBackend;
pub use sse::SseDataBuffer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::GauntletResult;
use crate::types::{ModelUnderTest, Turn, TurnRole};

/// Token accounting reported with the final chunk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// One event of a streamed response
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkEvent {
    /// Incremental response text
    Content(String),
    /// The response is complete
    Done(Option<TokenUsage>),
    /// The backend reported a failure mid-stream
    Error(String),
}

/// Sending half handed to a backend for one turn
pub type ChunkSender = mpsc::UnboundedSender<ChunkEvent>;

/// Receiving half consumed by the response aggregator
pub type ChunkReceiver = mpsc::UnboundedReceiver<ChunkEvent>;

/// Create a chunk channel for one turn
pub fn chunk_channel() -> (ChunkSender, ChunkReceiver) {
    mpsc::unbounded_channel()
}

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatRole::System => write!(f, "system"),
            ChatRole::User => write!(f, "user"),
            ChatRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A message of the conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        let role = match turn.role {
            TurnRole::User => ChatRole::User,
            TurnRole::Agent => ChatRole::Assistant,
        };
        Self {
            role,
            content: turn.message.clone(),
        }
    }
}

/// Everything a backend needs to answer one turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    /// Model identifier
    pub model: String,

    /// System prompt for the scenario
    pub system_prompt: String,

    /// Prior turns of the conversation
    pub history: Vec<ChatMessage>,

    /// Message to answer
    pub message: String,
}

/// Uniform streaming-chat capability of a model backend
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Backend name used in logs
    fn name(&self) -> &str;

    /// Prepare the backend for a model; called once per evaluation attempt
    async fn initialize(&self, _model: &ModelUnderTest) -> GauntletResult<()> {
        Ok(())
    }

    /// Stream a response into `chunks`
    ///
    /// Implementations send `ChunkEvent::Done` when the response is complete and
    /// should stop promptly once `cancel` fires.
    async fn send_chat(
        &self,
        request: ChatRequest,
        chunks: ChunkSender,
        cancel: CancellationToken,
    ) -> GauntletResult<()>;

    /// Whether the backend can currently serve requests
    async fn is_available(&self) -> bool;
}

/// Backends keyed by the `backend_ref` of a model
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn ModelBackend>>,
}

impl BackendRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend under a name
    pub fn register(&mut self, name: impl Into<String>, backend: Arc<dyn ModelBackend>) {
        self.backends.insert(name.into(), backend);
    }

    /// Builder-style registration
    pub fn with(mut self, name: impl Into<String>, backend: Arc<dyn ModelBackend>) -> Self {
        self.register(name, backend);
        self
    }

    /// Backend serving a model
    pub fn resolve(&self, model: &ModelUnderTest) -> Option<Arc<dyn ModelBackend>> {
        self.backends.get(&model.backend_ref).cloned()
    }

    /// Registered backend names
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.backends.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_resolves_by_backend_ref() {
        let backend: Arc<dyn ModelBackend> = Arc::new(FakeBackend::new("local"));
        let registry = BackendRegistry::new().with("local", backend);

        let model = ModelUnderTest::new("m1", "M1", crate::types::ModelKind::Local, "local");
        assert!(registry.resolve(&model).is_some());
        assert!(registry.resolve(&ModelUnderTest::remote("other")).is_none());
        assert_eq!(registry.names(), vec!["local"]);
    }

    #[test]
    fn test_turn_to_chat_message() {
        let message = ChatMessage::from(&Turn::agent("done"));
        assert_eq!(message.role, ChatRole::Assistant);
        assert_eq!(message.content, "done");
    }
}
