//! Session management and persistence for Gauntlet
//!
//! This crate provides:
//! - The evaluation session aggregate and its status lifecycle
//! - Full-document session persistence with atomic writes
//! - Per-model result documents and per-turn conversation snapshots
//! - The live preview side channel

pub mod preview;
pub mod session;
pub mod storage;
pub mod store;

pub use preview::{LivePreviewHub, LivePreviewSnapshot};
pub use session::{ConversationSnapshot, ErrorRecord, EvaluationSession, SessionStatus, SessionSummary};
pub use storage::{InMemorySessionStorage, LocalSessionStorage, SessionStorage, StorageError, StorageResult};
pub use store::SessionStore;
