//! Directory of published daemon contexts.
//!
//! # Layout
//!
//! - `registry.lock` - guards every mutation of the directory
//! - `<id>.ctx` - one line: the encoded [`DaemonContext`]
//! - `<id>.lock` - liveness lock, held exclusively by the daemon for its lifetime
//!
//! A daemon that still holds its liveness lock is presumed alive. An entry
//! whose liveness lock nobody holds belongs to a daemon that died without
//! retracting itself and may be pruned by anyone.

use super::codec;
use super::context::{DaemonContext, is_compatible};
use crate::error::{LodgeError, Result};
use crate::fs::atomic_write_file;
use crate::locks::{self, AcquireOptions, FileLock, LockMode};
use fs2::FileExt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Extension of registry entry files.
pub const ENTRY_EXTENSION: &str = "ctx";

/// Resource name of the registry's own mutation lock.
pub const REGISTRY_LOCK_NAME: &str = "registry";

/// Whether the daemon behind an entry is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Liveness lock is held.
    Alive,
    /// Liveness lock is free or gone.
    Stale,
}

impl Liveness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Liveness::Alive => "alive",
            Liveness::Stale => "stale",
        }
    }
}

/// A published context together with the liveness of its daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub id: String,
    pub context: DaemonContext,
    pub liveness: Liveness,
}

impl RegistryEntry {
    pub fn is_alive(&self) -> bool {
        self.liveness == Liveness::Alive
    }
}

impl std::fmt::Display for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}] {}", self.id, self.liveness.as_str(), self.context)
    }
}

/// What [`DaemonRegistry::prune_stale`] removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Entries of daemons that died without retracting themselves.
    pub removed: Vec<RegistryEntry>,
    /// Ids of unreadable entries nobody was holding.
    pub malformed: Vec<String>,
}

impl PruneReport {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.malformed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.removed.len() + self.malformed.len()
    }
}

/// Handle on a registry directory.
#[derive(Debug, Clone)]
pub struct DaemonRegistry {
    dir: PathBuf,
    options: AcquireOptions,
}

impl DaemonRegistry {
    /// Open (creating if needed) the registry at `dir`.
    ///
    /// `options` bound every wait on the registry lock and on liveness locks.
    pub fn open<P: AsRef<Path>>(dir: P, options: AcquireOptions) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| LodgeError::io(&dir, e))?;
        Ok(Self { dir, options })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn options(&self) -> &AcquireOptions {
        &self.options
    }

    /// A fresh entry id.
    pub fn new_entry_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Take the liveness lock for entry `id`. The daemon keeps it for its whole lifetime.
    pub fn acquire_liveness(&self, id: &str) -> Result<FileLock> {
        validate_entry_id(id)?;
        FileLock::acquire(self.dir.join(id), LockMode::Exclusive, &self.options)
    }

    /// Publish `context`, tied to the liveness lock the caller already holds.
    ///
    /// The entry id is the liveness lock's resource name. The lock must be
    /// exclusive and belong to this registry directory.
    pub fn register(&self, context: &DaemonContext, liveness: FileLock) -> Result<Registration> {
        if liveness.mode() != LockMode::Exclusive {
            return Err(LodgeError::Misuse(format!(
                "liveness lock '{}' must be held exclusively to register",
                liveness.resource().display()
            )));
        }
        if liveness.resource().parent() != Some(self.dir.as_path()) {
            return Err(LodgeError::Misuse(format!(
                "liveness lock '{}' does not belong to registry '{}'",
                liveness.resource().display(),
                self.dir.display()
            )));
        }
        let id = liveness
            .resource()
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                LodgeError::Misuse(format!(
                    "liveness lock '{}' has no usable entry id",
                    liveness.resource().display()
                ))
            })?;
        validate_entry_id(&id)?;

        let line = format!("{}\n", codec::encode(context));
        let entry_path = self.entry_path(&id);
        self.with_registry_lock(|| atomic_write_file(&entry_path, &line))?;

        info!("registered daemon {} in '{}'", id, self.dir.display());
        Ok(Registration {
            registry: self.clone(),
            id,
            context: context.clone(),
            liveness,
        })
    }

    /// Take a fresh liveness lock and register `context` under it.
    pub fn publish(&self, context: &DaemonContext) -> Result<Registration> {
        let id = Self::new_entry_id();
        let liveness = self.acquire_liveness(&id)?;
        self.register(context, liveness)
    }

    /// Lazily enumerate registered contexts with their liveness.
    ///
    /// The directory may change while the iterator runs: entries that
    /// disappear are skipped, and so are entries that do not decode.
    pub fn list_all(&self) -> Result<Entries> {
        let read_dir = fs::read_dir(&self.dir).map_err(|e| LodgeError::io(&self.dir, e))?;
        Ok(Entries {
            dir: self.dir.clone(),
            read_dir,
        })
    }

    /// Every registered entry compatible with `requirement`, alive or not.
    ///
    /// Tie-breaking between several matches is left to the caller.
    pub fn find_compatible(&self, requirement: &DaemonContext) -> Result<Vec<RegistryEntry>> {
        let mut matches = Vec::new();
        for entry in self.list_all()? {
            let entry = entry?;
            if is_compatible(&entry.context, requirement) {
                matches.push(entry);
            }
        }
        Ok(matches)
    }

    /// Retract every entry whose context equals `context`. Returns how many were removed.
    pub fn remove(&self, context: &DaemonContext) -> Result<usize> {
        let removed = self.with_registry_lock(|| {
            let mut removed = 0;
            for (id, path) in self.entry_files()? {
                let Some(bytes) = read_entry_file(&path)? else {
                    continue;
                };
                if decode_entry(bytes).is_ok_and(|found| &found == context) {
                    self.remove_entry_files(&id)?;
                    removed += 1;
                }
            }
            Ok(removed)
        })?;

        debug!("removed {} registry entries for {}", removed, context);
        Ok(removed)
    }

    /// Delete entries whose daemon is gone.
    ///
    /// Runs under the registry lock so it cannot race a daemon that is
    /// registering. Entries whose liveness lock is held are never touched,
    /// even if their content does not decode.
    pub fn prune_stale(&self) -> Result<PruneReport> {
        let report = self.with_registry_lock(|| {
            let mut report = PruneReport::default();
            for (id, path) in self.entry_files()? {
                if probe_liveness(&self.liveness_lock_path(&id)) == Liveness::Alive {
                    continue;
                }
                let Some(bytes) = read_entry_file(&path)? else {
                    continue;
                };

                match decode_entry(bytes) {
                    Ok(context) => report.removed.push(RegistryEntry {
                        id: id.clone(),
                        context,
                        liveness: Liveness::Stale,
                    }),
                    Err(_) => report.malformed.push(id.clone()),
                }
                self.remove_entry_files(&id)?;
            }
            Ok(report)
        })?;

        if !report.is_empty() {
            info!(
                "pruned {} stale and {} malformed registry entries from '{}'",
                report.removed.len(),
                report.malformed.len(),
                self.dir.display()
            );
        }
        Ok(report)
    }

    /// Retract the entry with the given id.
    pub(crate) fn remove_entry(&self, id: &str) -> Result<()> {
        self.with_registry_lock(|| self.remove_entry_files(id))
    }

    fn entry_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", id, ENTRY_EXTENSION))
    }

    fn liveness_lock_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", id, locks::LOCK_FILE_EXTENSION))
    }

    /// Run `action` as the registry's sole writer.
    fn with_registry_lock<T, F>(&self, action: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let mut lock = FileLock::acquire(
            self.dir.join(REGISTRY_LOCK_NAME),
            LockMode::Exclusive,
            &self.options,
        )?;
        let outcome = lock.write_scoped(action);
        let released = lock.release();
        let value = outcome?;
        released?;
        Ok(value)
    }

    /// Snapshot of `(id, path)` for every entry file currently present.
    fn entry_files(&self) -> Result<Vec<(String, PathBuf)>> {
        let mut files = Vec::new();
        for dir_entry in fs::read_dir(&self.dir).map_err(|e| LodgeError::io(&self.dir, e))? {
            let path = dir_entry.map_err(|e| LodgeError::io(&self.dir, e))?.path();
            if let Some(id) = entry_id(&path) {
                files.push((id, path));
            }
        }
        files.sort();
        Ok(files)
    }

    fn remove_entry_files(&self, id: &str) -> Result<()> {
        // The entry goes first so scanners stop seeing it before its lock disappears.
        remove_if_exists(&self.entry_path(id))?;
        remove_if_exists(&self.liveness_lock_path(id))
    }
}

/// A daemon's live registration. Dropping it without [`Registration::retract`]
/// releases the liveness lock and leaves a stale entry for pruning.
#[derive(Debug)]
pub struct Registration {
    registry: DaemonRegistry,
    id: String,
    context: DaemonContext,
    liveness: FileLock,
}

impl Registration {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn context(&self) -> &DaemonContext {
        &self.context
    }

    pub fn liveness(&self) -> &FileLock {
        &self.liveness
    }

    /// Remove the entry and release the liveness lock (clean shutdown).
    pub fn retract(mut self) -> Result<()> {
        self.registry.remove_entry(&self.id)?;
        info!("retracted daemon {} from '{}'", self.id, self.registry.dir.display());
        self.liveness.release()
    }
}

/// Lazy iterator returned by [`DaemonRegistry::list_all`].
#[derive(Debug)]
pub struct Entries {
    dir: PathBuf,
    read_dir: fs::ReadDir,
}

impl Iterator for Entries {
    type Item = Result<RegistryEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let path = match self.read_dir.next()? {
                Ok(dir_entry) => dir_entry.path(),
                Err(e) => return Some(Err(LodgeError::io(&self.dir, e))),
            };
            let Some(id) = entry_id(&path) else {
                continue;
            };

            let bytes = match read_entry_file(&path) {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            };
            let context = match decode_entry(bytes) {
                Ok(context) => context,
                Err(e) => {
                    warn!("skipping registry entry '{}': {}", path.display(), e);
                    continue;
                }
            };

            let liveness_path = self.dir.join(format!("{}.{}", id, locks::LOCK_FILE_EXTENSION));
            return Some(Ok(RegistryEntry {
                id,
                context,
                liveness: probe_liveness(&liveness_path),
            }));
        }
    }
}

/// Entry id for an entry file path, `None` for anything else in the directory.
fn entry_id(path: &Path) -> Option<String> {
    if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
        return None;
    }
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty() && !stem.starts_with('.'))
        .map(str::to_string)
}

fn validate_entry_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id != REGISTRY_LOCK_NAME
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(LodgeError::UserError(format!(
            "invalid registry entry id '{}'",
            id
        )))
    }
}

/// Raw entry bytes; `None` if the file vanished.
fn read_entry_file(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("registry entry '{}' vanished during scan", path.display());
            Ok(None)
        }
        Err(e) => Err(LodgeError::io(path, e)),
    }
}

/// Decode entry bytes, tolerating the one trailing newline entries are written with.
fn decode_entry(bytes: Vec<u8>) -> Result<DaemonContext> {
    let mut content = String::from_utf8(bytes).map_err(|e| {
        LodgeError::malformed(&String::from_utf8_lossy(e.as_bytes()), "entry is not valid UTF-8")
    })?;
    if content.ends_with('\n') {
        content.pop();
    }
    codec::decode(&content)
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(LodgeError::io(path, e)),
    }
}

/// Probe a liveness lock without waiting.
///
/// Anything that cannot be verified counts as alive, so pruning never
/// removes an entry on a guess.
fn probe_liveness(lock_path: &Path) -> Liveness {
    let probe = match File::open(lock_path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Liveness::Stale,
        Err(e) => {
            warn!("cannot open liveness lock '{}': {}", lock_path.display(), e);
            return Liveness::Alive;
        }
    };

    match locks::try_claim(&probe, LockMode::Shared) {
        Ok(true) => {
            let _ = FileExt::unlock(&probe);
            Liveness::Stale
        }
        Ok(false) => Liveness::Alive,
        Err(e) => {
            warn!("cannot probe liveness lock '{}': {}", lock_path.display(), e);
            Liveness::Alive
        }
    }
}
