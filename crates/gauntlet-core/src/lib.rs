//! Core library for Gauntlet
//!
//! Shared data model, error taxonomy, configuration and the model backend
//! capability consumed by the evaluation engine.

pub mod backend;
pub mod config;
pub mod error;
pub mod observer;
pub mod types;

pub use backend::{
    BackendRegistry, ChatMessage, ChatRequest, ChatRole, ChunkEvent, ChunkReceiver, ChunkSender,
    FakeBackend, FakeReply, FakeStep, ModelBackend, OpenAiCompatibleBackend, TokenUsage,
    chunk_channel,
};
pub use config::{EvalConfig, ReportFormat, RunConfig, RunFile};
pub use error::{GauntletError, GauntletResult, TimeoutKind};
pub use observer::{Observer, ObserverId, ObserverSet};
pub use types::{ContextFile, ModelKind, ModelResult, ModelUnderTest, Scenario, ScenarioResult, Turn, TurnRole};
