//! Claim attempts, bounded retry, and lock file inspection.

use super::metadata::LockState;
use super::types::{AcquireOptions, LockInfo, LockMode, LockStatus};
use crate::error::{LodgeError, Result};
use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// Extension appended to a resource's file name to form its lock file.
pub const LOCK_FILE_EXTENSION: &str = "lock";

/// Path of the lock file guarding `resource`: the resource's file name with `.lock` appended.
pub fn lock_path_for(resource: &Path) -> Result<PathBuf> {
    let name = resource.file_name().ok_or_else(|| {
        LodgeError::UserError(format!(
            "cannot derive a lock file for '{}': path has no file name",
            resource.display()
        ))
    })?;

    let mut lock_name = OsString::from(name);
    lock_name.push(".");
    lock_name.push(LOCK_FILE_EXTENSION);
    Ok(resource.with_file_name(lock_name))
}

/// Open (creating if needed) a lock file for reading and in-place rewriting.
pub(crate) fn open_lock_file(lock_path: &Path) -> Result<File> {
    if let Some(parent) = lock_path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| LodgeError::io(parent, e))?;
    }

    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)
        .map_err(|e| LodgeError::io(lock_path, e))
}

/// Outcome of a bounded wait for a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Claim {
    Acquired,
    TimedOut { waited: Duration },
}

/// Exponential delay between claim attempts, capped at `max`.
#[derive(Debug)]
struct Backoff {
    delay: Duration,
    max: Duration,
}

impl Backoff {
    fn new(options: &AcquireOptions) -> Self {
        let delay = options.backoff_initial.max(Duration::from_millis(1));
        Self {
            delay,
            max: options.backoff_max.max(delay),
        }
    }

    fn next_delay(&mut self) -> Duration {
        let current = self.delay;
        self.delay = (self.delay * 2).min(self.max);
        current
    }
}

/// One non-blocking claim attempt. `Ok(false)` means another handle holds a conflicting claim.
///
/// The trait methods are called through `FileExt` explicitly so that newer
/// inherent `File` locking methods cannot shadow them.
pub(crate) fn try_claim(file: &File, mode: LockMode) -> io::Result<bool> {
    let attempt = match mode {
        LockMode::Shared => FileExt::try_lock_shared(file),
        LockMode::Exclusive => FileExt::try_lock_exclusive(file),
    };

    match attempt {
        Ok(()) => Ok(true),
        Err(e) if is_contended(&e) => Ok(false),
        Err(e) => Err(e),
    }
}

fn is_contended(err: &io::Error) -> bool {
    let contended = fs2::lock_contended_error();
    err.kind() == io::ErrorKind::WouldBlock
        || (err.raw_os_error().is_some() && err.raw_os_error() == contended.raw_os_error())
}

/// Retry claim attempts until success or until `options.timeout` has elapsed.
pub(crate) fn claim_with_backoff(
    file: &File,
    lock_path: &Path,
    mode: LockMode,
    options: &AcquireOptions,
) -> Result<Claim> {
    let start = Instant::now();
    let deadline = start + options.timeout;
    let mut backoff = Backoff::new(options);

    loop {
        if try_claim(file, mode).map_err(|e| LodgeError::io(lock_path, e))? {
            return Ok(Claim::Acquired);
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(Claim::TimedOut {
                waited: now - start,
            });
        }

        thread::sleep(backoff.next_delay().min(deadline - now));
    }
}

/// Report the persisted state and current claim of the lock guarding `resource`.
///
/// Returns `Ok(None)` if no lock file exists yet. The probe takes and drops a
/// non-blocking claim on a private handle; it never waits and never rewrites
/// the lock file.
pub fn inspect<P: AsRef<Path>>(resource: P) -> Result<Option<LockInfo>> {
    let resource = resource.as_ref().to_path_buf();
    let lock_path = lock_path_for(&resource)?;

    let probe = match File::open(&lock_path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(LodgeError::io(&lock_path, e)),
    };

    let status = probe_status(&probe).map_err(|e| LodgeError::io(&lock_path, e))?;
    drop(probe);

    let state = LockState::from_file(&lock_path)?.unwrap_or_default();
    let is_stale = state.holder.is_some() && status != LockStatus::Exclusive;

    Ok(Some(LockInfo {
        resource,
        lock_path,
        state,
        status,
        is_stale,
    }))
}

fn probe_status(probe: &File) -> io::Result<LockStatus> {
    if try_claim(probe, LockMode::Exclusive)? {
        FileExt::unlock(probe)?;
        return Ok(LockStatus::Free);
    }
    if try_claim(probe, LockMode::Shared)? {
        FileExt::unlock(probe)?;
        return Ok(LockStatus::Shared);
    }
    Ok(LockStatus::Exclusive)
}

#[cfg(test)]
mod backoff_tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_max() {
        let options = AcquireOptions {
            timeout: Duration::from_secs(1),
            backoff_initial: Duration::from_millis(10),
            backoff_max: Duration::from_millis(35),
        };
        let mut backoff = Backoff::new(&options);

        assert_eq!(backoff.next_delay(), Duration::from_millis(10));
        assert_eq!(backoff.next_delay(), Duration::from_millis(20));
        assert_eq!(backoff.next_delay(), Duration::from_millis(35));
        assert_eq!(backoff.next_delay(), Duration::from_millis(35));
    }

    #[test]
    fn zero_initial_delay_still_sleeps() {
        let options = AcquireOptions {
            timeout: Duration::from_secs(1),
            backoff_initial: Duration::ZERO,
            backoff_max: Duration::ZERO,
        };
        let mut backoff = Backoff::new(&options);

        assert_eq!(backoff.next_delay(), Duration::from_millis(1));
        assert_eq!(backoff.next_delay(), Duration::from_millis(1));
    }
}
