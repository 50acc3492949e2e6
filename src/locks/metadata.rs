//! Persisted lock state and holder identity.

use crate::error::{LodgeError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::warn;

/// Version written into every lock file.
pub const LOCK_STATE_VERSION: u32 = 1;

/// Identity of the exclusive holder of a lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolderInfo {
    /// Owner of the lock (e.g., `user@HOST`).
    pub owner: String,

    /// Process ID of the holder.
    pub pid: u32,

    /// When the holder obtained the exclusive claim (RFC3339).
    pub acquired_at: DateTime<Utc>,
}

impl HolderInfo {
    /// Holder identity for the calling process, stamped now.
    pub fn current() -> Self {
        Self {
            owner: get_owner_string(),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        }
    }

    pub fn age(&self) -> Duration {
        Utc::now().signed_duration_since(self.acquired_at)
    }

    /// Format the age as a human-readable string.
    pub fn age_string(&self) -> String {
        let age = self.age();
        let minutes = age.num_minutes();
        let hours = age.num_hours();
        let days = age.num_days();

        if days > 0 {
            format!("{}d {}h", days, hours % 24)
        } else if hours > 0 {
            format!("{}h {}m", hours, minutes % 60)
        } else if minutes > 0 {
            format!("{}m", minutes)
        } else {
            format!("{}s", age.num_seconds().max(0))
        }
    }
}

impl fmt::Display for HolderInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (pid {})", self.owner, self.pid)
    }
}

/// Content of a lock file.
///
/// A missing, empty or unreadable lock file decodes to the default state,
/// which is *not* clean: whatever the lock guards has to be (re)built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockState {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Bumped each time a scoped write begins.
    pub generation: u64,

    /// Whether the last scoped write finished before its holder let go.
    pub clean: bool,

    /// Current exclusive holder, if any.
    #[serde(default)]
    pub holder: Option<HolderInfo>,
}

fn default_version() -> u32 {
    LOCK_STATE_VERSION
}

impl Default for LockState {
    fn default() -> Self {
        Self {
            version: LOCK_STATE_VERSION,
            generation: 0,
            clean: false,
            holder: None,
        }
    }
}

impl LockState {
    /// Decode lock file content. Never fails: torn content counts as dirty.
    pub fn decode(content: &str, path: &Path) -> Self {
        if content.trim().is_empty() {
            return Self::default();
        }

        match serde_json::from_str::<LockState>(content) {
            Ok(state) => state,
            Err(e) => {
                warn!(
                    "lock file '{}' is unreadable ({}); treating the resource as dirty",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Read the state of a lock file without claiming it.
    ///
    /// Returns `Ok(None)` if the lock file does not exist.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(Self::decode(&content, path))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LodgeError::io(path, e)),
        }
    }

    /// Read the state through an open (and claimed) lock file handle.
    pub(crate) fn read_from(file: &mut File, path: &Path) -> Result<Self> {
        let mut content = String::new();
        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.read_to_string(&mut content))
            .map_err(|e| LodgeError::io(path, e))?;
        Ok(Self::decode(&content, path))
    }

    /// Rewrite the lock file in place and flush it to disk.
    ///
    /// Only valid while holding the exclusive claim.
    pub(crate) fn write_to(&self, file: &mut File, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self).map_err(|e| {
            LodgeError::UserError(format!(
                "failed to serialize lock state for '{}': {}",
                path.display(),
                e
            ))
        })?;

        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.set_len(0))
            .and_then(|()| file.write_all(json.as_bytes()))
            .and_then(|()| file.sync_data())
            .map_err(|e| LodgeError::io(path, e))
    }
}

/// Get the owner string for holder metadata.
pub(crate) fn get_owner_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}
