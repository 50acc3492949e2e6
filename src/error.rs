//! Error types for lodge.
//!
//! Uses thiserror for derive macros. Each variant names the resource or input
//! it concerns so that a failure can be acted on without a debugger.

use crate::exit_codes;
use crate::locks::LockMode;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for lodge operations.
///
/// A resource whose last writer did not unlock cleanly is *not* an error;
/// it is reported through [`crate::locks::FileLock::was_unlocked_cleanly`].
#[derive(Error, Debug)]
pub enum LodgeError {
    /// Bad arguments, bad configuration, or an environment we cannot use.
    #[error("{0}")]
    UserError(String),

    /// A lock could not be obtained within the caller's budget.
    #[error(
        "timed out after {}ms waiting for {mode} lock on '{}'{}",
        waited.as_millis(),
        resource.display(),
        holder.as_ref().map(|h| format!(" (held by {})", h)).unwrap_or_default()
    )]
    LockTimeout {
        resource: PathBuf,
        mode: LockMode,
        waited: Duration,
        holder: Option<String>,
    },

    /// Registry or handshake text that does not match the context format.
    #[error("malformed daemon context: {reason} (input: {input:?})")]
    MalformedContext { input: String, reason: String },

    /// The lock API was used against its contract (double release, use after release).
    #[error("lock misuse: {0}")]
    Misuse(String),

    /// Filesystem failure on a specific path.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LodgeError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LodgeError::UserError(_) => exit_codes::USER_ERROR,
            LodgeError::MalformedContext { .. } => exit_codes::MALFORMED_CONTEXT,
            LodgeError::Io { .. } => exit_codes::IO_FAILURE,
            LodgeError::LockTimeout { .. } => exit_codes::LOCK_TIMEOUT,
            LodgeError::Misuse(_) => exit_codes::MISUSE,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        LodgeError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(input: &str, reason: impl Into<String>) -> Self {
        LodgeError::MalformedContext {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for lodge operations.
pub type Result<T> = std::result::Result<T, LodgeError>;
