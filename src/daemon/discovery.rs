//! Client-side choice between reusing a running daemon and starting one.

use super::context::DaemonContext;
use super::registry::{DaemonRegistry, RegistryEntry};
use crate::error::Result;
use tracing::{debug, info};

/// Starts a daemon when no compatible one is running.
pub trait DaemonStarter {
    /// Start a daemon satisfying `requirement` and return the context it runs with.
    fn start(&mut self, requirement: &DaemonContext) -> Result<DaemonContext>;
}

impl<F> DaemonStarter for F
where
    F: FnMut(&DaemonContext) -> Result<DaemonContext>,
{
    fn start(&mut self, requirement: &DaemonContext) -> Result<DaemonContext> {
        self(requirement)
    }
}

/// Outcome of [`find_or_start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connection {
    /// An alive, compatible daemon was picked from the registry.
    Reused(RegistryEntry),
    /// A new daemon was started.
    Started(DaemonContext),
}

impl Connection {
    pub fn context(&self) -> &DaemonContext {
        match self {
            Connection::Reused(entry) => &entry.context,
            Connection::Started(context) => context,
        }
    }

    pub fn is_reused(&self) -> bool {
        matches!(self, Connection::Reused(_))
    }
}

/// Reuse a running daemon compatible with `requirement`, or start one.
///
/// Only alive entries reach `select`, which decides among several matches
/// and may return `None` to refuse all of them.
pub fn find_or_start<S, P>(
    registry: &DaemonRegistry,
    requirement: &DaemonContext,
    select: P,
    starter: &mut S,
) -> Result<Connection>
where
    S: DaemonStarter + ?Sized,
    P: FnOnce(Vec<RegistryEntry>) -> Option<RegistryEntry>,
{
    let candidates: Vec<RegistryEntry> = registry
        .find_compatible(requirement)?
        .into_iter()
        .filter(RegistryEntry::is_alive)
        .collect();
    debug!(
        "{} alive daemon(s) compatible with {}",
        candidates.len(),
        requirement
    );

    if !candidates.is_empty()
        && let Some(entry) = select(candidates)
    {
        info!("reusing daemon {}", entry.id);
        return Ok(Connection::Reused(entry));
    }

    let context = starter.start(requirement)?;
    info!("started daemon {}", context);
    Ok(Connection::Started(context))
}

/// Deterministic selection policy: the entry with the smallest id.
pub fn select_lowest_id(candidates: Vec<RegistryEntry>) -> Option<RegistryEntry> {
    candidates.into_iter().min_by(|a, b| a.id.cmp(&b.id))
}
