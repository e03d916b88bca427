//! CLI commands

pub mod report;
pub mod run;
pub mod scenarios;
pub mod sessions;
pub mod setup;
