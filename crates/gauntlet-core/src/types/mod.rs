//! Shared data model

mod model;
mod result;
mod scenario;

pub use model::{ModelKind, ModelUnderTest};
pub use result::{ModelResult, ScenarioResult};
pub use scenario::{ContextFile, Scenario, Turn, TurnRole};
