//! LodgeConfig struct definition and default implementation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for lock waits and daemon discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodgeConfig {
    // =========================================================================
    // Lock settings
    // =========================================================================
    /// How long to wait for a lock before giving up (0 = single attempt).
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// First delay between lock attempts.
    #[serde(default = "default_backoff_initial_ms")]
    pub backoff_initial_ms: u64,

    /// Upper bound on the delay between lock attempts.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    // =========================================================================
    // Registry settings
    // =========================================================================
    /// Registry directory (default: `<local data dir>/lodge/registry`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_dir: Option<PathBuf>,

    /// Idle timeout given to contexts built without an explicit one.
    #[serde(default = "default_idle_timeout_ms")]
    pub default_idle_timeout_ms: u64,
}

impl Default for LodgeConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
            backoff_initial_ms: default_backoff_initial_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            registry_dir: None,
            default_idle_timeout_ms: default_idle_timeout_ms(),
        }
    }
}

fn default_lock_timeout_ms() -> u64 {
    60_000
}

fn default_backoff_initial_ms() -> u64 {
    10
}

fn default_backoff_max_ms() -> u64 {
    200
}

fn default_idle_timeout_ms() -> u64 {
    3 * 60 * 60 * 1000
}
