//! Command implementations for lodge.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations, and the settings every command resolves first.

mod context;
mod lock;
mod registry;

use crate::cli::{Cli, Command, ContextAction, LockAction, RegistryAction};
use lodge::config::LodgeConfig;
use lodge::daemon::DaemonRegistry;
use lodge::error::Result;
use std::path::{Path, PathBuf};

/// Effective configuration for one invocation.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub config: LodgeConfig,
    registry_dir: Option<PathBuf>,
}

impl Settings {
    /// Resolve the config file and apply command-line overrides.
    pub(crate) fn load(config_path: Option<&Path>, registry_dir: Option<PathBuf>) -> Result<Self> {
        Ok(Self {
            config: LodgeConfig::resolve(config_path)?,
            registry_dir,
        })
    }

    /// `--registry-dir`, else the config's registry directory.
    pub(crate) fn registry_dir(&self) -> Result<PathBuf> {
        match &self.registry_dir {
            Some(dir) => Ok(dir.clone()),
            None => self.config.registry_dir(),
        }
    }

    pub(crate) fn open_registry(&self) -> Result<DaemonRegistry> {
        DaemonRegistry::open(self.registry_dir()?, self.config.acquire_options())
    }
}

/// Dispatch a command to its implementation.
pub fn dispatch(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref(), cli.registry_dir)?;

    match cli.command {
        Command::Lock(lock_cmd) => match lock_cmd.action {
            LockAction::Status(args) => lock::cmd_lock_status(args),
            LockAction::Hold(args) => lock::cmd_lock_hold(&settings, args),
        },
        Command::Registry(registry_cmd) => match registry_cmd.action {
            RegistryAction::List => registry::cmd_registry_list(&settings),
            RegistryAction::Find(args) => registry::cmd_registry_find(&settings, args),
            RegistryAction::Prune => registry::cmd_registry_prune(&settings),
        },
        Command::Context(context_cmd) => match context_cmd.action {
            ContextAction::Encode(args) => context::cmd_context_encode(&settings, args),
            ContextAction::Decode(args) => context::cmd_context_decode(args),
        },
    }
}
