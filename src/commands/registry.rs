//! `lodge registry` commands.

use super::Settings;
use crate::cli::RegistryFindArgs;
use lodge::daemon::{DaemonContext, RegistryEntry};
use lodge::error::Result;

fn print_entry(entry: &RegistryEntry) {
    let context = &entry.context;
    println!("  {} [{}]", entry.id, entry.liveness.as_str());
    println!("    Runtime home:   {}", context.runtime_home().display());
    println!("    User config:    {}", context.user_config_dir().display());
    match context.pid() {
        Some(pid) => println!("    PID:            {}", pid),
        None => println!("    PID:            unknown"),
    }
    println!("    Idle timeout:   {}ms", context.idle_timeout_ms());
}

pub(crate) fn cmd_registry_list(settings: &Settings) -> Result<()> {
    let registry = settings.open_registry()?;

    let mut entries = registry.list_all()?.collect::<Result<Vec<_>>>()?;
    if entries.is_empty() {
        println!("No registered daemons in '{}'.", registry.dir().display());
        return Ok(());
    }
    entries.sort_by(|a, b| a.id.cmp(&b.id));

    println!("Registered daemons ({}):", entries.len());
    println!();
    for entry in &entries {
        print_entry(entry);
        println!();
    }

    let stale_count = entries.iter().filter(|e| !e.is_alive()).count();
    if stale_count > 0 {
        println!(
            "Note: {} entr{} stale. Use `lodge registry prune` to remove.",
            stale_count,
            if stale_count == 1 { "y is" } else { "ies are" }
        );
    }

    Ok(())
}

pub(crate) fn cmd_registry_find(settings: &Settings, args: RegistryFindArgs) -> Result<()> {
    let registry = settings.open_registry()?;
    let requirement = DaemonContext::new(
        args.runtime_home,
        args.user_config_dir,
        None,
        settings.config.default_idle_timeout(),
    );

    let mut matches = registry.find_compatible(&requirement)?;
    if args.alive {
        matches.retain(RegistryEntry::is_alive);
    }
    if matches.is_empty() {
        println!("No compatible daemons.");
        return Ok(());
    }
    matches.sort_by(|a, b| a.id.cmp(&b.id));

    println!("Compatible daemons ({}):", matches.len());
    println!();
    for entry in &matches {
        print_entry(entry);
        println!();
    }
    Ok(())
}

pub(crate) fn cmd_registry_prune(settings: &Settings) -> Result<()> {
    let registry = settings.open_registry()?;
    let report = registry.prune_stale()?;

    if report.is_empty() {
        println!("Nothing to prune.");
        return Ok(());
    }
    for entry in &report.removed {
        println!("removed stale {}", entry);
    }
    for id in &report.malformed {
        println!("removed malformed entry {}", id);
    }
    println!("Pruned {} entr{}.", report.total(), if report.total() == 1 { "y" } else { "ies" });
    Ok(())
}
