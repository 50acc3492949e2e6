//! Tests for config functionality.

use crate::config::{CONFIG_ENV_VAR, LodgeConfig, default_config_path};
use serial_test::serial;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

/// Sets an environment variable for the duration of a test.
struct EnvGuard {
    key: &'static str,
    original: Option<std::ffi::OsString>,
}

impl EnvGuard {
    fn set(key: &'static str, value: &Path) -> Self {
        let original = std::env::var_os(key);
        // SAFETY: env-mutating tests are #[serial].
        unsafe { std::env::set_var(key, value) };
        Self { key, original }
    }

    fn unset(key: &'static str) -> Self {
        let original = std::env::var_os(key);
        // SAFETY: env-mutating tests are #[serial].
        unsafe { std::env::remove_var(key) };
        Self { key, original }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        // SAFETY: env-mutating tests are #[serial].
        unsafe {
            match &self.original {
                Some(value) => std::env::set_var(self.key, value),
                None => std::env::remove_var(self.key),
            }
        }
    }
}

fn config_file(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file
}

#[test]
fn test_default_config() {
    let config = LodgeConfig::default();

    assert_eq!(config.lock_timeout_ms, 60_000);
    assert_eq!(config.backoff_initial_ms, 10);
    assert_eq!(config.backoff_max_ms, 200);
    assert_eq!(config.registry_dir, None);
    assert_eq!(config.default_idle_timeout_ms, 10_800_000);
    assert_eq!(config.default_idle_timeout(), Duration::from_secs(3 * 60 * 60));
}

#[test]
fn test_parse_empty_yaml() {
    let config = LodgeConfig::from_yaml("").unwrap();
    assert_eq!(config, LodgeConfig::default());

    let config = LodgeConfig::from_yaml("   \n").unwrap();
    assert_eq!(config, LodgeConfig::default());
}

#[test]
fn test_parse_partial_yaml() {
    let yaml = r#"
lock_timeout_ms: 500
registry_dir: /var/lib/lodge
"#;
    let config = LodgeConfig::from_yaml(yaml).unwrap();

    // Specified values should be used
    assert_eq!(config.lock_timeout_ms, 500);
    assert_eq!(config.registry_dir, Some(PathBuf::from("/var/lib/lodge")));

    // Unspecified values should use defaults
    assert_eq!(config.backoff_initial_ms, 10);
    assert_eq!(config.default_idle_timeout_ms, 10_800_000);
}

#[test]
fn test_parse_yaml_with_unknown_fields() {
    let yaml = r#"
lock_timeout_ms: 1000
future_setting: true
nested:
  anything: goes
"#;
    let config = LodgeConfig::from_yaml(yaml).unwrap();
    assert_eq!(config.lock_timeout_ms, 1000);
}

#[test]
fn test_parse_invalid_yaml() {
    let err = LodgeConfig::from_yaml("lock_timeout_ms: [not a number").unwrap_err();
    assert!(err.to_string().contains("failed to parse config YAML"));

    let err = LodgeConfig::from_yaml("lock_timeout_ms: -5").unwrap_err();
    assert!(err.to_string().contains("failed to parse config YAML"));
}

#[test]
fn test_zero_lock_timeout_is_allowed() {
    let config = LodgeConfig::from_yaml("lock_timeout_ms: 0").unwrap();
    assert_eq!(config.acquire_options().timeout, Duration::ZERO);
}

#[test]
fn test_validate_zero_backoff_initial() {
    let result = LodgeConfig::from_yaml("backoff_initial_ms: 0");
    let err = result.unwrap_err();
    assert!(err.to_string().contains("backoff_initial_ms"));
}

#[test]
fn test_validate_backoff_max_below_initial() {
    let yaml = r#"
backoff_initial_ms: 50
backoff_max_ms: 20
"#;
    let err = LodgeConfig::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("backoff_max_ms (20)"));
}

#[test]
fn test_validate_empty_registry_dir() {
    let err = LodgeConfig::from_yaml("registry_dir: ''").unwrap_err();
    assert!(err.to_string().contains("registry_dir"));
}

#[test]
fn test_acquire_options_from_config() {
    let yaml = r#"
lock_timeout_ms: 1500
backoff_initial_ms: 2
backoff_max_ms: 64
"#;
    let options = LodgeConfig::from_yaml(yaml).unwrap().acquire_options();
    assert_eq!(options.timeout, Duration::from_millis(1500));
    assert_eq!(options.backoff_initial, Duration::from_millis(2));
    assert_eq!(options.backoff_max, Duration::from_millis(64));
}

#[test]
fn test_registry_dir_override_and_default() {
    let config = LodgeConfig {
        registry_dir: Some(PathBuf::from("/srv/lodge")),
        ..LodgeConfig::default()
    };
    assert_eq!(config.registry_dir().unwrap(), PathBuf::from("/srv/lodge"));

    if let Some(data_dir) = dirs::data_local_dir() {
        assert_eq!(
            LodgeConfig::default().registry_dir().unwrap(),
            data_dir.join("lodge").join("registry")
        );
    }
}

#[test]
fn test_to_yaml() {
    let config = LodgeConfig {
        lock_timeout_ms: 42,
        registry_dir: Some(PathBuf::from("/tmp/reg")),
        ..LodgeConfig::default()
    };
    let yaml = config.to_yaml().unwrap();

    // Should be valid YAML that can be parsed back
    let parsed = LodgeConfig::from_yaml(&yaml).unwrap();
    assert_eq!(parsed, config);

    // Unset registry_dir is omitted
    let yaml = LodgeConfig::default().to_yaml().unwrap();
    assert!(!yaml.contains("registry_dir"));
}

#[test]
fn test_config_load_from_file() {
    let file = config_file(&["lock_timeout_ms: 7", "default_idle_timeout_ms: 1000"]);

    let config = LodgeConfig::load(file.path()).unwrap();
    assert_eq!(config.lock_timeout_ms, 7);
    assert_eq!(config.default_idle_timeout(), Duration::from_secs(1));
}

#[test]
fn test_config_load_missing_file() {
    let result = LodgeConfig::load("/nonexistent/path/config.yaml");
    assert!(result.is_err());
    let err = result.unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));
}

#[test]
#[serial]
fn test_resolve_prefers_explicit_path() {
    let explicit = config_file(&["lock_timeout_ms: 1"]);
    let from_env = config_file(&["lock_timeout_ms: 2"]);
    let _env = EnvGuard::set(CONFIG_ENV_VAR, from_env.path());

    let config = LodgeConfig::resolve(Some(explicit.path())).unwrap();
    assert_eq!(config.lock_timeout_ms, 1);
}

#[test]
#[serial]
fn test_resolve_uses_env_var() {
    let from_env = config_file(&["lock_timeout_ms: 2"]);
    let _env = EnvGuard::set(CONFIG_ENV_VAR, from_env.path());

    let config = LodgeConfig::resolve(None).unwrap();
    assert_eq!(config.lock_timeout_ms, 2);
}

#[test]
#[serial]
fn test_resolve_env_var_pointing_nowhere_is_error() {
    let _env = EnvGuard::set(CONFIG_ENV_VAR, Path::new("/nonexistent/lodge.yaml"));
    assert!(LodgeConfig::resolve(None).is_err());
}

#[test]
#[serial]
fn test_resolve_falls_back_to_defaults() {
    let _env = EnvGuard::unset(CONFIG_ENV_VAR);
    // A developer machine may carry a real config file.
    if default_config_path().is_some_and(|path| path.exists()) {
        return;
    }
    assert_eq!(LodgeConfig::resolve(None).unwrap(), LodgeConfig::default());
}
