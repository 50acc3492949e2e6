//! Exit code constants for the lodge CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, bad config)
//! - 2: Malformed daemon context text
//! - 3: Filesystem failure
//! - 4: Lock acquisition timed out
//! - 5: Lock API misuse

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid configuration, unusable environment.
pub const USER_ERROR: i32 = 1;

/// Context text did not match the encoded format.
pub const MALFORMED_CONTEXT: i32 = 2;

/// Filesystem operation failed.
pub const IO_FAILURE: i32 = 3;

/// Lock could not be acquired within the configured timeout.
pub const LOCK_TIMEOUT: i32 = 4;

/// Lock handle used after release, or released twice.
pub const MISUSE: i32 = 5;
