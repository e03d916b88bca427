//! Default values shared across configuration types

use std::path::PathBuf;

/// Per-turn timeout base (2 minutes)
pub const TIMEOUT_MS: u64 = 120_000;

/// Retries per model after the first attempt
pub const MAX_RETRIES: u32 = 2;

/// Fixed delay between retries (1 second)
pub const RETRY_DELAY_MS: u64 = 1_000;

/// Window without chunks before a turn counts as stalled (60 seconds)
pub const STALL_TIMEOUT_MS: u64 = 60_000;

/// Floor of the overall per-turn ceiling (3 minutes)
pub const MIN_OVERALL_TURN_MS: u64 = 180_000;

/// Pause between models (500 ms)
pub const COOLDOWN_MS: u64 = 500;

/// Availability probe bound (10 seconds)
pub const PROBE_TIMEOUT_MS: u64 = 10_000;

/// Default run file name
pub const RUN_FILE: &str = "gauntlet.toml";

/// System prompt used when a run file does not provide one
pub const SYSTEM_PROMPT_TEMPLATE: &str = "You are acting as {role}. When you decide on a concrete action, \
state it inside a <task>...</task> block so it can be executed.";

/// Default root for session documents (`~/.gauntlet/sessions`)
pub fn sessions_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".gauntlet").join("sessions"))
}
