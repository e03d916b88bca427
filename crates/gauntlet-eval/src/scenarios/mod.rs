//! Scenario batteries

mod loader;

pub use loader::{FileCheck, ScenarioLoader, load_scenarios_from_yaml, select};
