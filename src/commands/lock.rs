//! `lodge lock` commands.

use super::Settings;
use crate::cli::{LockHoldArgs, LockStatusArgs};
use lodge::error::Result;
use lodge::locks::{self, FileLock, LockMode, LockStatus};
use std::io::Write;
use std::path::Path;
use std::thread;
use std::time::Duration;

pub(crate) fn cmd_lock_status(args: LockStatusArgs) -> Result<()> {
    let Some(info) = locks::inspect(&args.resource)? else {
        println!("No lock file for '{}'.", args.resource.display());
        return Ok(());
    };

    println!("{}:", info.resource.display());
    println!("    Status:     {}", info.status.as_str());
    println!(
        "    State:      {} (generation {})",
        if info.state.clean { "clean" } else { "DIRTY" },
        info.state.generation
    );
    if let Some(holder) = &info.state.holder {
        println!("    Holder:     {}", holder);
        println!(
            "    Acquired:   {}",
            holder.acquired_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        println!("    Age:        {}", holder.age_string());
    }
    if info.is_stale {
        println!("    Note:       holder recorded but nobody holds the lock (crashed writer)");
    }
    println!("    Path:       {}", info.lock_path.display());

    if info.status == LockStatus::Free && !info.state.clean && info.state.generation > 0 {
        println!();
        println!("The last write did not complete; the resource may need rebuilding.");
    }

    Ok(())
}

pub(crate) fn cmd_lock_hold(settings: &Settings, args: LockHoldArgs) -> Result<()> {
    let mode = if args.shared {
        LockMode::Shared
    } else {
        LockMode::Exclusive
    };
    let mut options = settings.config.acquire_options();
    if let Some(timeout_ms) = args.timeout_ms {
        options.timeout = Duration::from_millis(timeout_ms);
    }

    let mut lock = FileLock::acquire(&args.resource, mode, &options)?;
    if !lock.was_unlocked_cleanly()? {
        eprintln!("warning: '{}' was not unlocked cleanly", lock.resource().display());
    }

    if args.write {
        let resource = lock.resource().to_path_buf();
        lock.write_scoped(|| -> Result<()> {
            announce(LockMode::Exclusive, &resource, " (writing)");
            wait(args.for_ms);
            Ok(())
        })?;
    } else {
        announce(mode, lock.resource(), "");
        wait(args.for_ms);
    }

    lock.release()?;
    println!("released");
    Ok(())
}

fn announce(mode: LockMode, resource: &Path, suffix: &str) {
    println!(
        "holding {} lock on '{}' (pid {}){}",
        mode,
        resource.display(),
        std::process::id(),
        suffix
    );
    // Waiting parents read this line before probing the lock.
    let _ = std::io::stdout().flush();
}

/// Sleep for `for_ms`, or until the process is killed.
fn wait(for_ms: Option<u64>) {
    match for_ms {
        Some(ms) => thread::sleep(Duration::from_millis(ms)),
        None => loop {
            thread::sleep(Duration::from_secs(3600));
        },
    }
}
