//! Lock modes, acquisition options and inspection results.

use super::metadata::LockState;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Mode in which a lock is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Any number of shared holders, no exclusive holder.
    Shared,
    /// A single holder, nobody else.
    Exclusive,
}

impl LockMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockMode::Shared => "shared",
            LockMode::Exclusive => "exclusive",
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How long to wait for a lock and how to pace retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireOptions {
    /// Total budget for the wait. Zero means a single attempt.
    pub timeout: Duration,
    /// First delay between attempts; doubled after each failed attempt.
    pub backoff_initial: Duration,
    /// Upper bound on the delay between attempts.
    pub backoff_max: Duration,
}

impl AcquireOptions {
    /// Default pacing with the given timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            backoff_initial: Duration::from_millis(10),
            backoff_max: Duration::from_millis(200),
        }
    }
}

/// Who, if anyone, currently claims a lock file at the OS level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    Free,
    Shared,
    Exclusive,
}

impl LockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockStatus::Free => "free",
            LockStatus::Shared => "shared",
            LockStatus::Exclusive => "exclusive",
        }
    }
}

/// Snapshot of a lock file, as reported by [`super::inspect`].
#[derive(Debug, Clone)]
pub struct LockInfo {
    /// The guarded resource.
    pub resource: PathBuf,

    /// The companion lock file.
    pub lock_path: PathBuf,

    /// Persisted lock state (generation, clean flag, recorded holder).
    pub state: LockState,

    /// Current OS-level claim.
    pub status: LockStatus,

    /// A holder is recorded but nobody holds the exclusive claim: the holder died.
    pub is_stale: bool,
}

impl fmt::Display for LockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, generation {}, {}",
            self.resource.display(),
            self.status.as_str(),
            self.state.generation,
            if self.state.clean { "clean" } else { "DIRTY" }
        )?;
        if let Some(holder) = &self.state.holder {
            write!(f, ", holder: {}, age: {}", holder, holder.age_string())?;
        }
        write!(f, "{})", if self.is_stale { ", STALE" } else { "" })
    }
}
