//! Environment variable overrides for evaluation settings
//!
//! Variables use the `GAUNTLET_` prefix and override values from the run file.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use super::EvalConfig;
use crate::error::{GauntletError, GauntletResult};

/// Apply `GAUNTLET_*` overrides from the process environment
pub fn apply_env_overrides(config: &mut EvalConfig) -> GauntletResult<()> {
    apply_overrides_from(config, |key| env::var(key).ok())
}

/// Apply overrides using a custom variable lookup
pub fn apply_overrides_from<F>(config: &mut EvalConfig, lookup: F) -> GauntletResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = parse_var(&lookup, "GAUNTLET_TIMEOUT_MS")? {
        config.timeout_ms = value;
    }
    if let Some(value) = parse_var(&lookup, "GAUNTLET_MAX_RETRIES")? {
        config.max_retries = value;
    }
    if let Some(value) = parse_var(&lookup, "GAUNTLET_RETRY_DELAY_MS")? {
        config.retry_delay_ms = value;
    }
    if let Some(value) = parse_var(&lookup, "GAUNTLET_STALL_TIMEOUT_MS")? {
        config.stall_timeout_ms = value;
    }
    if let Some(value) = parse_var(&lookup, "GAUNTLET_COOLDOWN_MS")? {
        config.cooldown_ms = value;
    }
    if let Some(dir) = lookup("GAUNTLET_OUTPUT_DIR").filter(|v| !v.is_empty()) {
        config.output_dir = Some(PathBuf::from(dir));
    }
    Ok(())
}

fn parse_var<F, T>(lookup: &F, key: &str) -> GauntletResult<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| GauntletError::config(format!("Invalid {} value: {}", key, raw))),
        None => Ok(None),
    }
}
