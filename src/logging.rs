//! Log setup for the `lodge` binary.
//!
//! Library code only emits `tracing` events; installing a subscriber is up
//! to the application. Logs go to stderr so command output stays parseable.

use tracing_subscriber::EnvFilter;

/// Environment variable holding a log filter (`EnvFilter` syntax).
pub const LOG_ENV_VAR: &str = "LODGE_LOG";

/// Filter for the given `-v` count, unless `$LODGE_LOG` is set.
pub fn filter_for(verbosity: u8) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV_VAR) {
        return filter;
    }
    EnvFilter::new(default_directive(verbosity))
}

fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "lodge=warn",
        1 => "lodge=debug",
        _ => "lodge=trace",
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(verbosity: u8) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_for(verbosity))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
