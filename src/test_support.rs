use crate::locks::AcquireOptions;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

/// A guarded resource path inside a fresh temporary directory.
pub(crate) fn temp_resource(name: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join(name);
    (temp_dir, path)
}

/// Acquire options with a short timeout and fast retries.
pub(crate) fn quick(timeout_ms: u64) -> AcquireOptions {
    AcquireOptions {
        timeout: Duration::from_millis(timeout_ms),
        backoff_initial: Duration::from_millis(5),
        backoff_max: Duration::from_millis(20),
    }
}
