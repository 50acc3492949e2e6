//! CLI argument parsing for lodge.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Lodge: crash-safe cross-process file locks and daemon discovery.
///
/// Inspect and hold locks on guarded resources, and manage the registry
/// in which daemons publish their contexts.
#[derive(Parser, Debug)]
#[command(name = "lodge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (overrides $LODGE_CONFIG and the default location).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Registry directory (overrides the config file).
    #[arg(long, global = true, value_name = "DIR")]
    pub registry_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace). $LODGE_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for lodge.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect or hold resource locks.
    Lock(LockCommand),

    /// Inspect and maintain the daemon registry.
    Registry(RegistryCommand),

    /// Encode or decode daemon context lines.
    Context(ContextCommand),
}

/// Lock subcommands.
#[derive(Parser, Debug)]
pub struct LockCommand {
    #[command(subcommand)]
    pub action: LockAction,
}

/// Available lock actions.
#[derive(Subcommand, Debug)]
pub enum LockAction {
    /// Show who holds the lock on a resource and whether it was left clean.
    Status(LockStatusArgs),

    /// Acquire a lock on a resource and keep it.
    ///
    /// Holds until `--for-ms` elapses, or until the process is killed.
    Hold(LockHoldArgs),
}

/// Arguments for `lock status`.
#[derive(Parser, Debug)]
pub struct LockStatusArgs {
    /// The guarded resource (not its `.lock` file).
    pub resource: PathBuf,
}

/// Arguments for `lock hold`.
#[derive(Parser, Debug)]
pub struct LockHoldArgs {
    /// The guarded resource (not its `.lock` file).
    pub resource: PathBuf,

    /// Take a shared lock instead of an exclusive one.
    #[arg(long)]
    pub shared: bool,

    /// Hold the lock inside a scoped write, so the resource reads dirty
    /// until the hold ends normally.
    #[arg(long, conflicts_with = "shared")]
    pub write: bool,

    /// Release after this many milliseconds.
    #[arg(long, value_name = "MS")]
    pub for_ms: Option<u64>,

    /// Override the configured acquire timeout.
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,
}

/// Registry subcommands.
#[derive(Parser, Debug)]
pub struct RegistryCommand {
    #[command(subcommand)]
    pub action: RegistryAction,
}

/// Available registry actions.
#[derive(Subcommand, Debug)]
pub enum RegistryAction {
    /// List every registered daemon with its liveness.
    List,

    /// List registered daemons compatible with a requirement.
    Find(RegistryFindArgs),

    /// Remove entries of daemons that are no longer running.
    Prune,
}

/// Arguments for `registry find`.
#[derive(Parser, Debug)]
pub struct RegistryFindArgs {
    /// Runtime home the daemon must use.
    #[arg(long)]
    pub runtime_home: PathBuf,

    /// User configuration directory the daemon must serve.
    #[arg(long)]
    pub user_config_dir: PathBuf,

    /// Only show daemons that are still running.
    #[arg(long)]
    pub alive: bool,
}

/// Context subcommands.
#[derive(Parser, Debug)]
pub struct ContextCommand {
    #[command(subcommand)]
    pub action: ContextAction,
}

/// Available context actions.
#[derive(Subcommand, Debug)]
pub enum ContextAction {
    /// Print the encoded line for a context.
    Encode(ContextEncodeArgs),

    /// Decode a context line and print its fields.
    Decode(ContextDecodeArgs),
}

/// Arguments for `context encode`.
#[derive(Parser, Debug)]
pub struct ContextEncodeArgs {
    /// Runtime home (must exist; it is canonicalized).
    #[arg(long)]
    pub runtime_home: PathBuf,

    /// User configuration directory.
    #[arg(long)]
    pub user_config_dir: PathBuf,

    /// Process id of the running daemon, if known.
    #[arg(long)]
    pub pid: Option<u32>,

    /// Idle timeout (defaults to the configured one).
    #[arg(long, value_name = "MS")]
    pub idle_timeout_ms: Option<u64>,
}

/// Arguments for `context decode`.
#[derive(Parser, Debug)]
pub struct ContextDecodeArgs {
    /// The encoded line.
    pub text: String,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_debug_assert() {
        // Verifies the CLI arguments configuration is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_lock_status() {
        let cli = Cli::try_parse_from(["lodge", "lock", "status", "cache.bin"]).unwrap();
        assert_eq!(cli.verbose, 0);
        assert!(cli.config.is_none());
        if let Command::Lock(LockCommand {
            action: LockAction::Status(args),
        }) = cli.command
        {
            assert_eq!(args.resource, PathBuf::from("cache.bin"));
        } else {
            panic!("Expected lock status command");
        }
    }

    #[test]
    fn parse_lock_hold_full() {
        let cli = Cli::try_parse_from([
            "lodge",
            "lock",
            "hold",
            "cache.bin",
            "--shared",
            "--for-ms",
            "250",
            "--timeout-ms",
            "10",
        ])
        .unwrap();
        if let Command::Lock(LockCommand {
            action: LockAction::Hold(args),
        }) = cli.command
        {
            assert!(args.shared);
            assert_eq!(args.for_ms, Some(250));
            assert_eq!(args.timeout_ms, Some(10));
        } else {
            panic!("Expected lock hold command");
        }
    }

    #[test]
    fn parse_lock_hold_defaults() {
        let cli = Cli::try_parse_from(["lodge", "lock", "hold", "cache.bin"]).unwrap();
        if let Command::Lock(LockCommand {
            action: LockAction::Hold(args),
        }) = cli.command
        {
            assert!(!args.shared);
            assert!(!args.write);
            assert_eq!(args.for_ms, None);
            assert_eq!(args.timeout_ms, None);
        } else {
            panic!("Expected lock hold command");
        }
    }

    #[test]
    fn parse_lock_hold_write_excludes_shared() {
        let cli = Cli::try_parse_from(["lodge", "lock", "hold", "cache.bin", "--write"]).unwrap();
        if let Command::Lock(LockCommand {
            action: LockAction::Hold(args),
        }) = cli.command
        {
            assert!(args.write);
        } else {
            panic!("Expected lock hold command");
        }

        let result =
            Cli::try_parse_from(["lodge", "lock", "hold", "cache.bin", "--write", "--shared"]);
        assert!(result.is_err());
    }

    #[test]
    fn parse_registry_actions() {
        let cli = Cli::try_parse_from(["lodge", "registry", "list"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Registry(RegistryCommand {
                action: RegistryAction::List
            })
        ));

        let cli = Cli::try_parse_from(["lodge", "registry", "prune"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Registry(RegistryCommand {
                action: RegistryAction::Prune
            })
        ));
    }

    #[test]
    fn parse_registry_find() {
        let cli = Cli::try_parse_from([
            "lodge",
            "registry",
            "find",
            "--runtime-home",
            "/opt/jdk17",
            "--user-config-dir",
            "/home/u/.cfg",
        ])
        .unwrap();
        if let Command::Registry(RegistryCommand {
            action: RegistryAction::Find(args),
        }) = cli.command
        {
            assert_eq!(args.runtime_home, PathBuf::from("/opt/jdk17"));
            assert_eq!(args.user_config_dir, PathBuf::from("/home/u/.cfg"));
            assert!(!args.alive);
        } else {
            panic!("Expected registry find command");
        }
    }

    #[test]
    fn parse_registry_find_requires_both_paths() {
        let result = Cli::try_parse_from(["lodge", "registry", "find", "--runtime-home", "/a"]);
        assert!(result.is_err());
    }

    #[test]
    fn parse_context_commands() {
        let cli = Cli::try_parse_from([
            "lodge",
            "context",
            "encode",
            "--runtime-home",
            "/opt/jdk17",
            "--user-config-dir",
            "/cfg",
            "--pid",
            "42",
        ])
        .unwrap();
        if let Command::Context(ContextCommand {
            action: ContextAction::Encode(args),
        }) = cli.command
        {
            assert_eq!(args.pid, Some(42));
            assert_eq!(args.idle_timeout_ms, None);
        } else {
            panic!("Expected context encode command");
        }

        let cli = Cli::try_parse_from(["lodge", "context", "decode", "Context[x]"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Context(ContextCommand {
                action: ContextAction::Decode(_)
            })
        ));
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "lodge",
            "registry",
            "list",
            "--registry-dir",
            "/tmp/reg",
            "--config",
            "/tmp/lodge.yaml",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.registry_dir, Some(PathBuf::from("/tmp/reg")));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/lodge.yaml")));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn parse_missing_subcommand_fails() {
        assert!(Cli::try_parse_from(["lodge"]).is_err());
        assert!(Cli::try_parse_from(["lodge", "lock"]).is_err());
    }
}
