//! Config loading, resolution, validation, and derived settings.

use super::model::LodgeConfig;
use crate::error::{LodgeError, Result};
use crate::locks::AcquireOptions;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "LODGE_CONFIG";

/// `<config dir>/lodge/config.yaml`, if the platform has a config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("lodge").join("config.yaml"))
}

impl LodgeConfig {
    /// Load config from a YAML file.
    ///
    /// # Returns
    ///
    /// * `Ok(LodgeConfig)` - Successfully loaded and validated config
    /// * `Err(LodgeError::UserError)` - Read error, parse error or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            LodgeError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Locate and load the active config.
    ///
    /// Order: `explicit` (from `--config`), then `$LODGE_CONFIG`, then the
    /// default config path if that file exists, then built-in defaults. An
    /// explicitly named file that cannot be read is an error.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            debug!("using config from --config: {}", path.display());
            return Self::load(path);
        }

        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR).filter(|v| !v.is_empty()) {
            let path = PathBuf::from(path);
            debug!("using config from ${}: {}", CONFIG_ENV_VAR, path.display());
            return Self::load(path);
        }

        if let Some(path) = default_config_path()
            && path.is_file()
        {
            debug!("using config from {}", path.display());
            return Self::load(path);
        }

        debug!("no config file found, using defaults");
        Ok(Self::default())
    }

    /// Parse config from a YAML string.
    ///
    /// An empty document yields the defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: LodgeConfig = serde_yaml::from_str(yaml)
            .map_err(|e| LodgeError::UserError(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            LodgeError::UserError(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Validate config values.
    ///
    /// Validation rules:
    /// - `backoff_initial_ms` must be positive
    /// - `backoff_max_ms` must not be below `backoff_initial_ms`
    /// - `registry_dir`, when set, must not be empty
    pub fn validate(&self) -> Result<()> {
        if self.backoff_initial_ms == 0 {
            return Err(LodgeError::UserError(
                "config validation failed: backoff_initial_ms must be greater than 0".to_string(),
            ));
        }

        if self.backoff_max_ms < self.backoff_initial_ms {
            return Err(LodgeError::UserError(format!(
                "config validation failed: backoff_max_ms ({}) must be at least backoff_initial_ms ({})",
                self.backoff_max_ms, self.backoff_initial_ms
            )));
        }

        if let Some(dir) = &self.registry_dir
            && dir.as_os_str().is_empty()
        {
            return Err(LodgeError::UserError(
                "config validation failed: registry_dir must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn acquire_options(&self) -> AcquireOptions {
        AcquireOptions {
            timeout: Duration::from_millis(self.lock_timeout_ms),
            backoff_initial: Duration::from_millis(self.backoff_initial_ms),
            backoff_max: Duration::from_millis(self.backoff_max_ms),
        }
    }

    /// The configured registry directory, or `<local data dir>/lodge/registry`.
    pub fn registry_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.registry_dir {
            return Ok(dir.clone());
        }
        dirs::data_local_dir()
            .map(|dir| dir.join("lodge").join("registry"))
            .ok_or_else(|| {
                LodgeError::UserError(
                    "no local data directory on this platform; set registry_dir in the config"
                        .to_string(),
                )
            })
    }

    pub fn default_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.default_idle_timeout_ms)
    }
}
