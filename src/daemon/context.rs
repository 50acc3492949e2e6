//! The daemon context value object and its compatibility rule.

use super::launch::LaunchOptions;
use crate::error::{LodgeError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Idle timeout used when none is configured (3 hours).
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(3 * 60 * 60);

/// Immutable description of one daemon's environment.
///
/// Clients compare a daemon's published context against their own
/// requirement to decide whether the daemon can be reused. Only the runtime
/// home and the user configuration directory take part in that decision.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DaemonContext {
    runtime_home: PathBuf,
    user_config_dir: PathBuf,
    pid: Option<u32>,
    idle_timeout_ms: u64,
}

impl DaemonContext {
    /// Build a context from its four attributes.
    ///
    /// The idle timeout is kept at millisecond precision, which is what the
    /// text encoding carries.
    pub fn new(
        runtime_home: impl Into<PathBuf>,
        user_config_dir: impl Into<PathBuf>,
        pid: Option<u32>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            runtime_home: runtime_home.into(),
            user_config_dir: user_config_dir.into(),
            pid,
            idle_timeout_ms: u64::try_from(idle_timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// The runtime home in use, canonicalized when built through [`DaemonContextBuilder`].
    pub fn runtime_home(&self) -> &Path {
        &self.runtime_home
    }

    /// The user configuration directory the daemon serves.
    pub fn user_config_dir(&self) -> &Path {
        &self.user_config_dir
    }

    /// Process id, unknown until the daemon is actually running.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn idle_timeout_ms(&self) -> u64 {
        self.idle_timeout_ms
    }

    /// The same context with the process id filled in.
    pub fn with_pid(&self, pid: u32) -> Self {
        Self {
            pid: Some(pid),
            ..self.clone()
        }
    }

    /// Whether a daemon publishing `self` satisfies `requirement`.
    pub fn is_compatible_with(&self, requirement: &DaemonContext) -> bool {
        is_compatible(self, requirement)
    }
}

/// True iff runtime home and user configuration directory match after
/// canonicalization. Process id and idle timeout are never compared.
pub fn is_compatible(candidate: &DaemonContext, requirement: &DaemonContext) -> bool {
    same_path(&candidate.runtime_home, &requirement.runtime_home)
        && same_path(&candidate.user_config_dir, &requirement.user_config_dir)
}

fn same_path(a: &Path, b: &Path) -> bool {
    a == b || canonical(a) == canonical(b)
}

/// Canonical form of a path, or the path itself if it cannot be resolved.
fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Assembles a [`DaemonContext`] for a daemon about to be launched or matched.
#[derive(Debug, Clone)]
pub struct DaemonContextBuilder {
    runtime_home: Option<PathBuf>,
    user_config_dir: Option<PathBuf>,
    pid: Option<u32>,
    idle_timeout: Duration,
}

impl Default for DaemonContextBuilder {
    fn default() -> Self {
        Self {
            runtime_home: None,
            user_config_dir: None,
            pid: None,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl DaemonContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the runtime home the launch options resolve to.
    pub fn from_launch(options: &LaunchOptions) -> Result<Self> {
        Ok(Self::new().runtime_home(options.resolved_runtime_home()?))
    }

    pub fn runtime_home(mut self, path: impl Into<PathBuf>) -> Self {
        self.runtime_home = Some(path.into());
        self
    }

    pub fn user_config_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.user_config_dir = Some(path.into());
        self
    }

    pub fn pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Canonicalize the runtime home and produce the context.
    ///
    /// # Returns
    ///
    /// * `Err(LodgeError::UserError)` - A path is missing, or the runtime home does not exist
    pub fn build(self) -> Result<DaemonContext> {
        let runtime_home = self.runtime_home.ok_or_else(|| {
            LodgeError::UserError("daemon context requires a runtime home".to_string())
        })?;
        let user_config_dir = self.user_config_dir.ok_or_else(|| {
            LodgeError::UserError("daemon context requires a user config directory".to_string())
        })?;

        let runtime_home = fs::canonicalize(&runtime_home).map_err(|e| {
            LodgeError::UserError(format!(
                "runtime home '{}' is not usable: {}",
                runtime_home.display(),
                e
            ))
        })?;

        Ok(DaemonContext::new(
            runtime_home,
            user_config_dir,
            self.pid,
            self.idle_timeout,
        ))
    }
}
