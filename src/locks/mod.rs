//! Cross-process locking for guarded resources.
//!
//! # Lock Files
//!
//! Every guarded resource `R` has a companion lock file `R.lock`. Processes
//! coordinate through OS advisory claims on that file (shared or exclusive),
//! so a claim disappears together with a crashed holder. The lock file is
//! created lazily and outlives every holder; releasing a lock never deletes it.
//!
//! # Lock State
//!
//! Each lock file contains JSON state, rewritten in place by the exclusive holder:
//! - `generation`: bumped every time a scoped write begins
//! - `clean`: false from the moment a write begins until it completes
//! - `holder`: the exclusive holder (`owner`, `pid`, `acquired_at`), or null
//!
//! # Scoped Writes
//!
//! All mutation of a guarded resource goes through [`FileLock::write_scoped`].
//! A writer that fails, panics or dies leaves `clean` false; the next holder
//! sees this via [`FileLock::was_unlocked_cleanly`] and decides whether to
//! rebuild.

mod guard;
mod metadata;
mod operations;
mod types;


pub use guard::FileLock;
pub use metadata::{HolderInfo, LOCK_STATE_VERSION, LockState};
pub use operations::{LOCK_FILE_EXTENSION, inspect, lock_path_for};
pub(crate) use operations::try_claim;
pub use types::{AcquireOptions, LockInfo, LockMode, LockStatus};
