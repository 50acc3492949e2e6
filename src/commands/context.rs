//! `lodge context` commands.

use super::Settings;
use crate::cli::{ContextDecodeArgs, ContextEncodeArgs};
use lodge::daemon::{self, DaemonContextBuilder};
use lodge::error::Result;
use std::time::Duration;

pub(crate) fn cmd_context_encode(settings: &Settings, args: ContextEncodeArgs) -> Result<()> {
    let idle_timeout = args
        .idle_timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| settings.config.default_idle_timeout());

    let mut builder = DaemonContextBuilder::new()
        .runtime_home(args.runtime_home)
        .user_config_dir(args.user_config_dir)
        .idle_timeout(idle_timeout);
    if let Some(pid) = args.pid {
        builder = builder.pid(pid);
    }

    println!("{}", daemon::encode(&builder.build()?));
    Ok(())
}

pub(crate) fn cmd_context_decode(args: ContextDecodeArgs) -> Result<()> {
    let context = daemon::decode(&args.text)?;

    println!("Runtime home:   {}", context.runtime_home().display());
    println!("User config:    {}", context.user_config_dir().display());
    match context.pid() {
        Some(pid) => println!("PID:            {}", pid),
        None => println!("PID:            unknown"),
    }
    println!("Idle timeout:   {}ms", context.idle_timeout_ms());
    Ok(())
}
