//! Options describing how a daemon process gets launched.
//!
//! Lodge does not own launching; it only needs the resolved runtime home to
//! describe the daemon that these options would produce.

use crate::error::{LodgeError, Result};
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Process launch facade: runtime home, environment, arguments, working directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    runtime_home: Option<PathBuf>,
    working_dir: Option<PathBuf>,
    environment: BTreeMap<String, String>,
    args: Vec<String>,
}

impl LaunchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runtime_home(mut self, path: impl Into<PathBuf>) -> Self {
        self.runtime_home = Some(path.into());
        self
    }

    pub fn working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(path.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn configured_runtime_home(&self) -> Option<&Path> {
        self.runtime_home.as_deref()
    }

    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// The runtime home a launch would use, canonicalized.
    ///
    /// Falls back to the directory holding the current executable when no
    /// runtime home is configured.
    pub fn resolved_runtime_home(&self) -> Result<PathBuf> {
        let home = match &self.runtime_home {
            Some(home) => home.clone(),
            None => {
                let exe = std::env::current_exe().map_err(|e| {
                    LodgeError::UserError(format!("cannot locate current executable: {}", e))
                })?;
                exe.parent()
                    .map(Path::to_path_buf)
                    .ok_or_else(|| {
                        LodgeError::UserError(format!(
                            "executable '{}' has no parent directory",
                            exe.display()
                        ))
                    })?
            }
        };

        fs::canonicalize(&home).map_err(|e| {
            LodgeError::UserError(format!(
                "runtime home '{}' is not usable: {}",
                home.display(),
                e
            ))
        })
    }

    /// A command for `program` carrying these options' environment, arguments and working directory.
    pub fn command(&self, program: impl AsRef<OsStr>) -> Command {
        let mut command = Command::new(program);
        command.args(&self.args).envs(&self.environment);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        command
    }
}
