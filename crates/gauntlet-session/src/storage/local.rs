//! Local filesystem session storage
//!
//! Each session owns a directory under the storage root:
//!
//! ```text
//! <root>/<session_id>/session.json
//! <root>/<session_id>/results/<model>.json
//! <root>/<session_id>/conversations/<model>/<scenario>/turn-<n>.json
//! <root>/<session_id>/<artifact>
//! ```

use super::{SessionStorage, StorageError, StorageResult};
use crate::{ConversationSnapshot, EvaluationSession, SessionSummary};
use async_trait::async_trait;
use gauntlet_core::ModelResult;
use gauntlet_core::config::defaults;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

const SESSION_FILE: &str = "session.json";
const RESULTS_DIR: &str = "results";
const CONVERSATIONS_DIR: &str = "conversations";

/// Local filesystem session storage
///
/// Sessions are stored in:
/// - `~/.gauntlet/sessions/` (default)
/// - Custom path if specified
pub struct LocalSessionStorage {
    base_path: PathBuf,
}

impl LocalSessionStorage {
    /// Create storage with default path (~/.gauntlet/sessions)
    pub fn new() -> StorageResult<Self> {
        let base_path = defaults::sessions_dir().ok_or(StorageError::PathUnavailable)?;
        Ok(Self { base_path })
    }

    /// Create storage with custom base path
    pub fn with_path(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Storage root
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Directory holding everything for a session
    pub fn session_dir(&self, id: &str) -> PathBuf {
        self.base_path.join(file_key(id))
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.session_dir(id).join(SESSION_FILE)
    }

    fn result_path(&self, session_id: &str, model_id: &str) -> PathBuf {
        self.session_dir(session_id)
            .join(RESULTS_DIR)
            .join(format!("{}.json", file_key(model_id)))
    }

    fn snapshot_path(&self, session_id: &str, snapshot: &ConversationSnapshot) -> PathBuf {
        self.session_dir(session_id)
            .join(CONVERSATIONS_DIR)
            .join(file_key(&snapshot.model_id))
            .join(file_key(&snapshot.scenario_id))
            .join(format!("turn-{}.json", snapshot.turn_index))
    }

    async fn read_session(path: &Path) -> StorageResult<EvaluationSession> {
        let content = fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Percent-encode characters that cannot appear in a single path component
///
/// The encoding is reversible, so distinct ids always map to distinct keys.
fn file_key(id: &str) -> String {
    let dots_only = !id.is_empty() && id.chars().all(|c| c == '.');
    let mut key = String::with_capacity(id.len());
    for c in id.chars() {
        let reserved = matches!(c, '%' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
            || c.is_control()
            || (dots_only && c == '.');
        if reserved {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                key.push_str(&format!("%{:02X}", byte));
            }
        } else {
            key.push(c);
        }
    }
    key
}

/// Write a file by writing a sibling temp file and renaming it over the target
async fn write_atomic(path: &Path, content: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StorageError::InvalidData(format!("invalid path {:?}", path)))?;
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    fs::write(&tmp, content).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl SessionStorage for LocalSessionStorage {
    async fn save_session(&self, session: &EvaluationSession) -> StorageResult<()> {
        let path = self.session_path(&session.session_id);
        let content = serde_json::to_vec_pretty(session)?;
        write_atomic(&path, &content).await?;
        debug!("Saved session {} to {:?}", session.session_id, path);
        Ok(())
    }

    async fn load_session(&self, id: &str) -> StorageResult<EvaluationSession> {
        let path = self.session_path(id);
        if !path.exists() {
            return Err(StorageError::NotFound(id.to_string()));
        }

        let session = Self::read_session(&path).await?;
        if session.session_id != id {
            return Err(StorageError::InvalidData(format!(
                "session file for {} contains id {}",
                id, session.session_id
            )));
        }
        debug!("Loaded session {} from {:?}", id, path);
        Ok(session)
    }

    async fn delete_session(&self, id: &str) -> StorageResult<()> {
        let dir = self.session_dir(id);
        if !dir.join(SESSION_FILE).exists() {
            return Err(StorageError::NotFound(id.to_string()));
        }

        fs::remove_dir_all(&dir).await?;
        debug!("Deleted session {} at {:?}", id, dir);
        Ok(())
    }

    async fn list_sessions(&self) -> StorageResult<Vec<SessionSummary>> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&self.base_path).await?;
        let mut sessions = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path().join(SESSION_FILE);
            if !path.is_file() {
                continue;
            }

            match Self::read_session(&path).await {
                Ok(session) => sessions.push(session.summary()),
                Err(e) => warn!("Failed to read session from {:?}: {}", path, e),
            }
        }

        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    async fn exists(&self, id: &str) -> StorageResult<bool> {
        Ok(self.session_path(id).exists())
    }

    async fn save_model_result(&self, session_id: &str, result: &ModelResult) -> StorageResult<()> {
        let path = self.result_path(session_id, &result.model_id);
        let content = serde_json::to_vec_pretty(result)?;
        write_atomic(&path, &content).await?;
        debug!("Saved result for model {} to {:?}", result.model_id, path);
        Ok(())
    }

    async fn load_model_results(&self, session_id: &str) -> StorageResult<Vec<ModelResult>> {
        let dir = self.session_dir(session_id).join(RESULTS_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&dir).await?;
        let mut results = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let content = fs::read_to_string(&path).await?;
            match serde_json::from_str::<ModelResult>(&content) {
                Ok(result) => results.push(result),
                Err(e) => warn!("Failed to read model result from {:?}: {}", path, e),
            }
        }

        results.sort_by(|a, b| a.model_id.cmp(&b.model_id));
        Ok(results)
    }

    async fn save_conversation_snapshot(
        &self,
        session_id: &str,
        snapshot: &ConversationSnapshot,
    ) -> StorageResult<()> {
        let path = self.snapshot_path(session_id, snapshot);
        let content = serde_json::to_vec_pretty(snapshot)?;
        write_atomic(&path, &content).await
    }

    async fn save_artifact(&self, session_id: &str, name: &str, content: &str) -> StorageResult<()> {
        let path = self.session_dir(session_id).join(file_key(name));
        write_atomic(&path, content.as_bytes()).await?;
        debug!("Saved artifact {} to {:?}", name, path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionStatus;
    use chrono::{Duration, Utc};
    use gauntlet_core::{ModelUnderTest, RunConfig, Scenario, Turn};
    use tempfile::TempDir;

    fn create_test_storage() -> (LocalSessionStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalSessionStorage::with_path(temp_dir.path());
        (storage, temp_dir)
    }

    fn session() -> EvaluationSession {
        EvaluationSession::new(
            vec![ModelUnderTest::local("llama3:8b"), ModelUnderTest::remote("org/model")],
            vec![Scenario::new("greeting", "Greeting").with_turn(Turn::user("hi"))],
            RunConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let (storage, _temp) = create_test_storage();
        let session = session();

        storage.save_session(&session).await.unwrap();
        let loaded = storage.load_session(&session.session_id).await.unwrap();

        assert_eq!(loaded.session_id, session.session_id);
        assert_eq!(loaded.models.len(), 2);
        assert_eq!(loaded.scenarios[0].id, "greeting");
    }

    #[tokio::test]
    async fn test_write_leaves_no_temp_files() {
        let (storage, _temp) = create_test_storage();
        let mut session = session();

        storage.save_session(&session).await.unwrap();
        session.transition(SessionStatus::Paused);
        storage.save_session(&session).await.unwrap();

        let dir = storage.session_dir(&session.session_id);
        let names: Vec<String> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["session.json"]);

        let loaded = storage.load_session(&session.session_id).await.unwrap();
        assert_eq!(loaded.status, SessionStatus::Paused);
    }

    #[tokio::test]
    async fn test_model_results_and_snapshots_layout() {
        let (storage, _temp) = create_test_storage();
        let session = session();
        storage.save_session(&session).await.unwrap();

        let result = ModelResult::skipped("org/model", "offline");
        storage
            .save_model_result(&session.session_id, &result)
            .await
            .unwrap();

        let snapshot = ConversationSnapshot {
            model_id: "llama3:8b".to_string(),
            scenario_id: "greeting".to_string(),
            turn_index: 0,
            conversation: vec![Turn::user("hi"), Turn::agent("hello")],
            captured_at: Utc::now(),
        };
        storage
            .save_conversation_snapshot(&session.session_id, &snapshot)
            .await
            .unwrap();

        let dir = storage.session_dir(&session.session_id);
        assert!(dir.join("results").join("org%2Fmodel.json").is_file());
        assert!(
            dir.join("conversations")
                .join("llama3%3A8b")
                .join("greeting")
                .join("turn-0.json")
                .is_file()
        );

        let results = storage.load_model_results(&session.session_id).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].skipped);
    }

    #[tokio::test]
    async fn test_delete_removes_directory() {
        let (storage, _temp) = create_test_storage();
        let session = session();
        storage.save_session(&session).await.unwrap();
        storage
            .save_artifact(&session.session_id, "report.md", "# Report")
            .await
            .unwrap();

        assert!(storage.exists(&session.session_id).await.unwrap());
        storage.delete_session(&session.session_id).await.unwrap();
        assert!(!storage.exists(&session.session_id).await.unwrap());
        assert!(!storage.session_dir(&session.session_id).exists());
    }

    #[tokio::test]
    async fn test_list_sorted_newest_first() {
        let (storage, _temp) = create_test_storage();

        let mut older = session();
        older.updated_at = Utc::now() - Duration::hours(2);
        storage.save_session(&older).await.unwrap();

        let newer = session();
        storage.save_session(&newer).await.unwrap();

        let listed = storage.list_sessions().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].session_id, newer.session_id);
    }

    #[tokio::test]
    async fn test_cleanup_older_than() {
        let (storage, _temp) = create_test_storage();

        let mut stale = session();
        stale.updated_at = Utc::now() - Duration::days(10);
        storage.save_session(&stale).await.unwrap();
        let fresh = session();
        storage.save_session(&fresh).await.unwrap();

        let removed = storage.cleanup_older_than(Duration::days(7)).await.unwrap();
        assert_eq!(removed, 1);
        assert!(!storage.exists(&stale.session_id).await.unwrap());
        assert!(storage.exists(&fresh.session_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_not_found() {
        let (storage, _temp) = create_test_storage();

        let result = storage.load_session("nonexistent").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
        let result = storage.delete_session("nonexistent").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_file_key() {
        assert_eq!(file_key("qwen2.5:7b"), "qwen2.5%3A7b");
        assert_eq!(file_key("openai/gpt-4o"), "openai%2Fgpt-4o");
        assert_eq!(file_key("plain-id"), "plain-id");
        assert_eq!(file_key("50%"), "50%25");
        assert_eq!(file_key(".."), "%2E%2E");
        assert_ne!(file_key("org/model"), file_key("org_model"));
        assert_ne!(file_key("org/model"), file_key("org%2Fmodel"));
    }
}
