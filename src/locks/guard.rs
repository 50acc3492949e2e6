//! The in-process lock handle.

use super::metadata::{HolderInfo, LockState};
use super::operations::{Claim, claim_with_backoff, lock_path_for, open_lock_file};
use super::types::{AcquireOptions, LockMode};
use crate::error::{LodgeError, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// A held claim on the lock file guarding one resource.
///
/// The OS claim lives as long as the open handle, so a crashed holder never
/// leaves the resource locked. What a crash *does* leave behind is a lock
/// file whose clean flag is false, which the next holder observes through
/// [`FileLock::was_unlocked_cleanly`].
///
/// The handle is valid from a successful [`FileLock::acquire`] until
/// [`FileLock::release`]; every call after that fails with
/// [`LodgeError::Misuse`]. Dropping a held lock releases it.
#[derive(Debug)]
pub struct FileLock {
    resource: PathBuf,
    lock_path: PathBuf,
    file: File,
    mode: LockMode,
    options: AcquireOptions,
    state: LockState,
    acquired_at: DateTime<Utc>,
    unlocked_cleanly: bool,
    released: bool,
}

impl FileLock {
    /// Wait up to `options.timeout` for a claim on `resource` in `mode`.
    ///
    /// The lock file (`<resource>.lock`) and its parent directories are
    /// created on first use.
    ///
    /// # Returns
    ///
    /// * `Ok(FileLock)` - Claim held
    /// * `Err(LodgeError::LockTimeout)` - Budget exhausted (exit code 4)
    /// * `Err(LodgeError::Io)` - Lock file could not be created or read
    pub fn acquire<P: AsRef<Path>>(
        resource: P,
        mode: LockMode,
        options: &AcquireOptions,
    ) -> Result<Self> {
        let resource = resource.as_ref().to_path_buf();
        let lock_path = lock_path_for(&resource)?;
        let mut file = open_lock_file(&lock_path)?;

        if let Claim::TimedOut { waited } = claim_with_backoff(&file, &lock_path, mode, options)? {
            // Best effort: the holder may be mid-rewrite of the lock file.
            let holder = LockState::from_file(&lock_path)
                .ok()
                .flatten()
                .and_then(|state| state.holder)
                .map(|holder| holder.to_string());
            debug!(
                "gave up on {} lock for '{}' after {:?}",
                mode,
                resource.display(),
                waited
            );
            return Err(LodgeError::LockTimeout {
                resource,
                mode,
                waited,
                holder,
            });
        }

        let state = LockState::read_from(&mut file, &lock_path)?;
        let unlocked_cleanly = state.clean;
        if !unlocked_cleanly && state.generation > 0 {
            warn!(
                "'{}' was not unlocked cleanly by its last writer (generation {})",
                resource.display(),
                state.generation
            );
        }

        let mut lock = Self {
            resource,
            lock_path,
            file,
            mode,
            options: *options,
            state,
            acquired_at: Utc::now(),
            unlocked_cleanly,
            released: false,
        };

        if mode == LockMode::Exclusive {
            lock.state.holder = Some(HolderInfo::current());
            lock.persist()?;
        }

        debug!("acquired {} lock on '{}'", mode, lock.resource.display());
        Ok(lock)
    }

    /// The guarded resource.
    pub fn resource(&self) -> &Path {
        &self.resource
    }

    /// The companion lock file.
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Returns true if `path` is the lock file used by this lock.
    pub fn is_lock_file(&self, path: &Path) -> bool {
        path == self.lock_path
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    pub fn options(&self) -> &AcquireOptions {
        &self.options
    }

    /// Generation counter as last read or written by this handle.
    pub fn generation(&self) -> u64 {
        self.state.generation
    }

    /// Whether the most recent scoped write completed (no writer crashed or failed mid-write).
    ///
    /// This is a reported condition, not an error: a caller seeing `false`
    /// decides whether to discard and rebuild the guarded resource.
    pub fn was_unlocked_cleanly(&self) -> Result<bool> {
        self.ensure_held("query")?;
        Ok(self.unlocked_cleanly)
    }

    /// Upgrade a shared claim to exclusive, waiting up to the acquire timeout.
    ///
    /// Once escalated the lock file reads dirty until a scoped write
    /// completes or the lock is released, so a crash in between is visible to
    /// the next holder. If the wait times out the handle is released
    /// entirely: the OS may already have dropped the shared claim while
    /// converting it.
    pub fn escalate(&mut self) -> Result<()> {
        self.ensure_held("escalate")?;
        if self.mode == LockMode::Exclusive {
            return Ok(());
        }

        let claim = claim_with_backoff(
            &self.file,
            &self.lock_path,
            LockMode::Exclusive,
            &self.options,
        );
        match claim {
            Ok(Claim::Acquired) => {}
            Ok(Claim::TimedOut { waited }) => {
                self.abandon();
                return Err(LodgeError::LockTimeout {
                    resource: self.resource.clone(),
                    mode: LockMode::Exclusive,
                    waited,
                    holder: None,
                });
            }
            Err(e) => {
                self.abandon();
                return Err(e);
            }
        }

        self.mode = LockMode::Exclusive;
        self.state = LockState::read_from(&mut self.file, &self.lock_path)?;
        self.unlocked_cleanly = self.state.clean;
        self.state.holder = Some(HolderInfo::current());
        self.state.clean = false;
        self.persist()?;

        debug!("escalated lock on '{}' to exclusive", self.resource.display());
        Ok(())
    }

    /// Run `action` as the sole writer of the guarded resource.
    ///
    /// Escalates if needed, bumps the generation and marks the lock file
    /// dirty before `action` runs. Only when `action` returns `Ok` is the
    /// lock file marked clean again; an `Err` (or a panic, or the process
    /// dying) leaves it dirty and the error is returned unchanged.
    ///
    /// ```no_run
    /// use lodge::locks::{AcquireOptions, FileLock, LockMode};
    ///
    /// let mut lock = FileLock::acquire("cache.bin", LockMode::Shared, &AcquireOptions::default())?;
    /// if !lock.was_unlocked_cleanly()? {
    ///     lock.write_scoped(|| -> lodge::error::Result<()> {
    ///         // rebuild cache.bin
    ///         Ok(())
    ///     })?;
    /// }
    /// lock.release()?;
    /// # Ok::<(), lodge::error::LodgeError>(())
    /// ```
    pub fn write_scoped<T, E, F>(&mut self, action: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: From<LodgeError>,
    {
        self.ensure_held("write")?;
        self.escalate()?;

        self.state.generation += 1;
        self.state.clean = false;
        self.unlocked_cleanly = false;
        self.persist()?;

        match action() {
            Ok(value) => {
                self.state.clean = true;
                self.unlocked_cleanly = true;
                self.persist()?;
                Ok(value)
            }
            Err(e) => {
                warn!(
                    "write to '{}' failed; leaving it marked dirty (generation {})",
                    self.resource.display(),
                    self.state.generation
                );
                Err(e)
            }
        }
    }

    /// Give up the claim. Releasing twice is misuse.
    pub fn release(&mut self) -> Result<()> {
        if self.released {
            error!("lock on '{}' released twice", self.resource.display());
            return Err(LodgeError::Misuse(format!(
                "lock on '{}' already released",
                self.resource.display()
            )));
        }
        self.release_inner()
    }

    fn ensure_held(&self, operation: &str) -> Result<()> {
        if self.released {
            error!(
                "attempted to {} lock on '{}' after release",
                operation,
                self.resource.display()
            );
            return Err(LodgeError::Misuse(format!(
                "cannot {} lock on '{}': it was already released",
                operation,
                self.resource.display()
            )));
        }
        Ok(())
    }

    fn persist(&mut self) -> Result<()> {
        self.state.write_to(&mut self.file, &self.lock_path)
    }

    /// Clear the holder, restore this holder's view of the clean flag, drop the claim.
    fn release_inner(&mut self) -> Result<()> {
        self.released = true;

        let persisted = if self.mode == LockMode::Exclusive {
            self.state.holder = None;
            self.state.clean = self.unlocked_cleanly;
            self.persist()
        } else {
            Ok(())
        };
        let unlocked =
            FileExt::unlock(&self.file).map_err(|e| LodgeError::io(&self.lock_path, e));

        debug!("released {} lock on '{}'", self.mode, self.resource.display());
        persisted.and(unlocked)
    }

    /// Drop whatever claim remains without touching the lock file.
    fn abandon(&mut self) {
        self.released = true;
        let _ = FileExt::unlock(&self.file);
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if !self.released
            && let Err(e) = self.release_inner()
        {
            warn!(
                "failed to release lock '{}': {}",
                self.lock_path.display(),
                e
            );
        }
    }
}
