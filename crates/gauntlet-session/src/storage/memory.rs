//! In-memory session storage
//!
//! Used by tests and dry runs. Writes can be made to fail on demand to
//! exercise the orchestrator's fatal-error path.

use super::{SessionStorage, StorageError, StorageResult};
use crate::{ConversationSnapshot, EvaluationSession, SessionSummary};
use async_trait::async_trait;
use gauntlet_core::ModelResult;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct SessionEntry {
    session: Option<EvaluationSession>,
    results: BTreeMap<String, ModelResult>,
    snapshots: Vec<ConversationSnapshot>,
    artifacts: BTreeMap<String, String>,
}

/// Session storage kept in process memory
#[derive(Default)]
pub struct InMemorySessionStorage {
    entries: RwLock<HashMap<String, SessionEntry>>,
    fail_writes: AtomicBool,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with an IO error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Conversation snapshots stored for a session
    pub async fn snapshots(&self, session_id: &str) -> Vec<ConversationSnapshot> {
        self.entries
            .read()
            .await
            .get(session_id)
            .map(|e| e.snapshots.clone())
            .unwrap_or_default()
    }

    /// Artifact content stored for a session
    pub async fn artifact(&self, session_id: &str, name: &str) -> Option<String> {
        self.entries
            .read()
            .await
            .get(session_id)
            .and_then(|e| e.artifacts.get(name).cloned())
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io(io::Error::other("simulated write failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn save_session(&self, session: &EvaluationSession) -> StorageResult<()> {
        self.check_writable()?;
        let mut entries = self.entries.write().await;
        entries.entry(session.session_id.clone()).or_default().session = Some(session.clone());
        Ok(())
    }

    async fn load_session(&self, id: &str) -> StorageResult<EvaluationSession> {
        self.entries
            .read()
            .await
            .get(id)
            .and_then(|e| e.session.clone())
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn delete_session(&self, id: &str) -> StorageResult<()> {
        self.check_writable()?;
        self.entries
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn list_sessions(&self) -> StorageResult<Vec<SessionSummary>> {
        let entries = self.entries.read().await;
        let mut sessions: Vec<SessionSummary> = entries
            .values()
            .filter_map(|e| e.session.as_ref().map(EvaluationSession::summary))
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    async fn exists(&self, id: &str) -> StorageResult<bool> {
        Ok(self
            .entries
            .read()
            .await
            .get(id)
            .is_some_and(|e| e.session.is_some()))
    }

    async fn save_model_result(&self, session_id: &str, result: &ModelResult) -> StorageResult<()> {
        self.check_writable()?;
        self.entries
            .write()
            .await
            .entry(session_id.to_string())
            .or_default()
            .results
            .insert(result.model_id.clone(), result.clone());
        Ok(())
    }

    async fn load_model_results(&self, session_id: &str) -> StorageResult<Vec<ModelResult>> {
        Ok(self
            .entries
            .read()
            .await
            .get(session_id)
            .map(|e| e.results.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn save_conversation_snapshot(
        &self,
        session_id: &str,
        snapshot: &ConversationSnapshot,
    ) -> StorageResult<()> {
        self.check_writable()?;
        self.entries
            .write()
            .await
            .entry(session_id.to_string())
            .or_default()
            .snapshots
            .push(snapshot.clone());
        Ok(())
    }

    async fn save_artifact(&self, session_id: &str, name: &str, content: &str) -> StorageResult<()> {
        self.check_writable()?;
        self.entries
            .write()
            .await
            .entry(session_id.to_string())
            .or_default()
            .artifacts
            .insert(name.to_string(), content.to_string());
        Ok(())
    }
}
