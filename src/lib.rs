//! Lodge: crash-safe cross-process file locks and daemon discovery.
//!
//! - [`locks`] guards a resource with a companion lock file that records
//!   whether the last writer finished cleanly.
//! - [`daemon`] describes daemons with a [`daemon::DaemonContext`] and keeps
//!   a registry through which clients find a compatible running daemon.

pub mod config;
pub mod daemon;
pub mod error;
pub mod exit_codes;
pub mod fs;
pub mod locks;
pub mod logging;

#[cfg(test)]
mod test_support;
