//! Engine configuration, loadable from a TOML file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine tuning knobs. Every field has a default so a missing or partial
/// config file is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds after a successful load before `observe()` triggers a
    /// background refresh.
    #[serde(default = "default_staleness_secs")]
    pub staleness_secs: u64,
    /// Push-channel reconnect attempts before parking in `Disconnected`.
    #[serde(default = "default_reconnect_max_attempts")]
    pub reconnect_max_attempts: u32,
    /// Fixed backoff between reconnect attempts, milliseconds.
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,
    /// Minimum pointer travel (pixels) before a drag counts as a move attempt.
    #[serde(default = "default_drag_threshold_px")]
    pub drag_threshold_px: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            staleness_secs: default_staleness_secs(),
            reconnect_max_attempts: default_reconnect_max_attempts(),
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
            drag_threshold_px: default_drag_threshold_px(),
        }
    }
}

const fn default_staleness_secs() -> u64 {
    60
}

const fn default_reconnect_max_attempts() -> u32 {
    5
}

const fn default_reconnect_backoff_ms() -> u64 {
    2_000
}

const fn default_drag_threshold_px() -> f64 {
    5.0
}

/// Load config from a TOML file. A missing file yields the defaults; a file
/// that exists but fails to parse is an error.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        return Ok(EngineConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<EngineConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}
