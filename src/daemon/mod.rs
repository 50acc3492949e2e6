//! Daemon contexts and the registry clients use to find a reusable daemon.
//!
//! A daemon describes itself with a [`DaemonContext`], publishes it in a
//! [`DaemonRegistry`] directory, and holds a liveness lock for as long as it
//! runs. Clients look up compatible contexts and reuse an alive daemon, or
//! start a new one through [`find_or_start`].

mod codec;
mod context;
mod discovery;
mod launch;
mod registry;


pub use codec::{ABSENT_PID, decode, encode};
pub use context::{DEFAULT_IDLE_TIMEOUT, DaemonContext, DaemonContextBuilder, is_compatible};
pub use discovery::{Connection, DaemonStarter, find_or_start, select_lowest_id};
pub use launch::LaunchOptions;
pub use registry::{
    DaemonRegistry, ENTRY_EXTENSION, Entries, Liveness, PruneReport, REGISTRY_LOCK_NAME,
    Registration, RegistryEntry,
};
