//! Persistence and resume store
//!
//! Holds the active [`EvaluationSession`] and writes the whole document back
//! to storage after every mutation. Streaming progress never reaches
//! durable storage; it only goes to the live preview hub.

use crate::preview::{LivePreviewHub, LivePreviewSnapshot};
use crate::storage::{SessionStorage, StorageError, StorageResult};
use crate::{ConversationSnapshot, ErrorRecord, EvaluationSession, SessionStatus, SessionSummary};
use chrono::Duration;
use gauntlet_core::{ModelResult, ModelUnderTest, ObserverId, RunConfig, Scenario};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Owner of the active session and its durable copy
pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
    session: Option<EvaluationSession>,
    preview: LivePreviewHub,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            storage,
            session: None,
            preview: LivePreviewHub::new(),
        }
    }

    /// Underlying storage backend
    pub fn storage(&self) -> &Arc<dyn SessionStorage> {
        &self.storage
    }

    /// Active session, if any
    pub fn session(&self) -> Option<&EvaluationSession> {
        self.session.as_ref()
    }

    /// Id of the active session
    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.session_id.as_str())
    }

    /// Start a new running session and persist it
    pub async fn create_session(
        &mut self,
        models: Vec<ModelUnderTest>,
        scenarios: Vec<Scenario>,
        config: RunConfig,
    ) -> StorageResult<&EvaluationSession> {
        let session = EvaluationSession::new(models, scenarios, config);
        self.storage.save_session(&session).await?;
        info!(
            session_id = %session.session_id,
            models = session.models.len(),
            scenarios = session.scenarios.len(),
            "Created evaluation session"
        );
        Ok(self.session.insert(session))
    }

    /// Load a stored session and make it active
    pub async fn load_session(&mut self, id: &str) -> StorageResult<&EvaluationSession> {
        let session = self.storage.load_session(id).await?;
        debug!(
            session_id = %id,
            status = %session.status,
            completed = session.completed_model_ids.len(),
            "Loaded evaluation session"
        );
        Ok(self.session.insert(session))
    }

    /// Record which model and scenario are in flight
    pub async fn update_session_progress(
        &mut self,
        model_id: Option<&str>,
        scenario_id: Option<&str>,
    ) -> StorageResult<()> {
        let session = self.active_mut()?;
        session.current_model_id = model_id.map(str::to_string);
        session.current_scenario_id = scenario_id.map(str::to_string);
        session.touch();
        self.persist().await
    }

    /// Mark a model as the current one
    pub async fn start_model(&mut self, model_id: &str) -> StorageResult<()> {
        self.update_session_progress(Some(model_id), None).await
    }

    /// Record a model's terminal result
    ///
    /// Returns `Ok(false)` without writing anything if the model already
    /// has a result.
    pub async fn complete_model(&mut self, result: ModelResult) -> StorageResult<bool> {
        let session = self.active_mut()?;
        if session.is_model_completed(&result.model_id) {
            warn!(model_id = %result.model_id, "Model already completed, ignoring duplicate result");
            return Ok(false);
        }

        self.save_intermediate_result(&result).await?;
        let session = self.active_mut()?;
        session.record_model_result(result);
        self.persist().await?;
        Ok(true)
    }

    /// Record a model as skipped, with an error log entry carrying the reason
    pub async fn skip_model(&mut self, model_id: &str, reason: &str) -> StorageResult<bool> {
        let session = self.active_mut()?;
        if session.is_model_completed(model_id) {
            return Ok(false);
        }
        session
            .error_log
            .push(ErrorRecord::new(model_id, None, format!("skipped: {}", reason)));
        self.complete_model(ModelResult::skipped(model_id, reason)).await
    }

    /// Append to the session error log
    pub async fn add_error(
        &mut self,
        model_id: &str,
        scenario_id: Option<&str>,
        message: impl Into<String>,
    ) -> StorageResult<()> {
        let session = self.active_mut()?;
        session.error_log.push(ErrorRecord::new(
            model_id,
            scenario_id.map(str::to_string),
            message,
        ));
        session.touch();
        self.persist().await
    }

    /// Move the session to a new status
    ///
    /// The in-memory session is left unchanged when the write fails.
    pub async fn update_status(&mut self, status: SessionStatus) -> StorageResult<()> {
        let session = self.active_mut()?;
        let previous = session.clone();
        let from = session.status;
        if !session.transition(status) {
            return Err(StorageError::InvalidTransition {
                from: from.to_string(),
                to: status.to_string(),
            });
        }
        if status != SessionStatus::Running {
            session.current_model_id = None;
        }
        info!(session_id = %session.session_id, %from, to = %status, "Session status changed");
        if let Err(e) = self.persist().await {
            self.session = Some(previous);
            return Err(e);
        }
        Ok(())
    }

    /// Models of the active session without a terminal result
    pub fn remaining_models(&self) -> Vec<ModelUnderTest> {
        self.session
            .as_ref()
            .map(EvaluationSession::remaining_models)
            .unwrap_or_default()
    }

    /// Results recorded so far, in completion order
    pub fn results(&self) -> Vec<ModelResult> {
        self.session
            .as_ref()
            .map(|s| s.partial_results.clone())
            .unwrap_or_default()
    }

    /// Write the per-model result document
    pub async fn save_intermediate_result(&self, result: &ModelResult) -> StorageResult<()> {
        let session_id = self.active_id()?;
        self.storage.save_model_result(session_id, result).await
    }

    /// Write the conversation state after a turn
    pub async fn save_conversation_snapshot(&self, snapshot: &ConversationSnapshot) -> StorageResult<()> {
        let session_id = self.active_id()?;
        self.storage
            .save_conversation_snapshot(session_id, snapshot)
            .await
    }

    /// Write a rendered report into the session scope
    pub async fn save_report(&self, name: &str, content: &str) -> StorageResult<()> {
        let session_id = self.active_id()?;
        self.storage.save_artifact(session_id, name, content).await
    }

    /// Publish a live preview snapshot; never touches durable storage
    pub fn update_live_preview(&self, snapshot: LivePreviewSnapshot) {
        self.preview.publish(snapshot);
    }

    /// Register a live preview observer
    pub fn on_live_preview<F>(&mut self, observer: F) -> ObserverId
    where
        F: Fn(&LivePreviewSnapshot) + Send + Sync + 'static,
    {
        self.preview.subscribe(observer)
    }

    /// Most recent live preview snapshot
    pub fn latest_preview(&self) -> Option<LivePreviewSnapshot> {
        self.preview.latest()
    }

    pub async fn list_sessions(&self) -> StorageResult<Vec<SessionSummary>> {
        self.storage.list_sessions().await
    }

    /// Delete a stored session; the active one is dropped as well
    pub async fn delete_session(&mut self, id: &str) -> StorageResult<()> {
        self.storage.delete_session(id).await?;
        if self.session_id() == Some(id) {
            self.session = None;
        }
        Ok(())
    }

    /// Delete sessions not updated within `max_age`
    pub async fn cleanup_older_than(&self, max_age: Duration) -> StorageResult<usize> {
        let removed = self.storage.cleanup_older_than(max_age).await?;
        if removed > 0 {
            info!(removed, "Removed stale sessions");
        }
        Ok(removed)
    }

    fn active_mut(&mut self) -> StorageResult<&mut EvaluationSession> {
        self.session.as_mut().ok_or(StorageError::NoActiveSession)
    }

    fn active_id(&self) -> StorageResult<&str> {
        self.session_id().ok_or(StorageError::NoActiveSession)
    }

    async fn persist(&self) -> StorageResult<()> {
        let session = self.session.as_ref().ok_or(StorageError::NoActiveSession)?;
        self.storage.save_session(session).await
    }
}
