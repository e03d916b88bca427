//! Run progress accounting
//!
//! This module provides the progress tracker and the snapshot it publishes.

mod state;
mod tracker;

pub use state::{ProgressPhase, ProgressState};
pub use tracker::ProgressTracker;
