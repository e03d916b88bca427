//! Session storage abstraction and implementations
//!
//! Provides trait-based storage for session persistence with local
//! filesystem and in-memory implementations.

mod local;
mod memory;

pub use local::LocalSessionStorage;
pub use memory::InMemorySessionStorage;

use crate::{ConversationSnapshot, EvaluationSession, SessionSummary};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use gauntlet_core::{GauntletError, ModelResult};
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid session data: {0}")]
    InvalidData(String),

    #[error("No active session")]
    NoActiveSession,

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Storage path not available")]
    PathUnavailable,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for GauntletError {
    fn from(error: StorageError) -> Self {
        GauntletError::storage(error.to_string())
    }
}

/// Durable storage for evaluation sessions
///
/// Every write replaces a whole document; implementations must make each
/// write atomic so a crash never leaves a half-written session behind.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Save the full session document
    async fn save_session(&self, session: &EvaluationSession) -> StorageResult<()>;

    /// Load a session by ID
    async fn load_session(&self, id: &str) -> StorageResult<EvaluationSession>;

    /// Delete a session and everything stored alongside it
    async fn delete_session(&self, id: &str) -> StorageResult<()>;

    /// List session summaries, newest first
    async fn list_sessions(&self) -> StorageResult<Vec<SessionSummary>>;

    /// Check if a session exists
    async fn exists(&self, id: &str) -> StorageResult<bool>;

    /// Save the per-model intermediate result document
    async fn save_model_result(&self, session_id: &str, result: &ModelResult) -> StorageResult<()>;

    /// Load every per-model result document of a session
    async fn load_model_results(&self, session_id: &str) -> StorageResult<Vec<ModelResult>>;

    /// Save a per-turn conversation snapshot
    async fn save_conversation_snapshot(
        &self,
        session_id: &str,
        snapshot: &ConversationSnapshot,
    ) -> StorageResult<()>;

    /// Save a named artifact (e.g. a rendered report) in the session scope
    async fn save_artifact(&self, session_id: &str, name: &str, content: &str) -> StorageResult<()>;

    /// Delete sessions not modified within `max_age`, returning how many were removed
    async fn cleanup_older_than(&self, max_age: Duration) -> StorageResult<usize> {
        let cutoff = Utc::now() - max_age;
        let mut removed = 0;
        for summary in self.list_sessions().await? {
            if summary.updated_at < cutoff {
                self.delete_session(&summary.session_id).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
