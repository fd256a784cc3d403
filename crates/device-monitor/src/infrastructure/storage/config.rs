//! TOML-based configuration for the device monitor.
//!
//! The monitor runs fine without a config file; every field has a default.
//! A file only needs the keys that differ:
//!
//! ```toml
//! [listener]
//! bind_address = "0.0.0.0"
//! port = 6666
//!
//! [session]
//! target_readings = 50
//! dedup_policy = "first_seen"
//!
//! [log]
//! level = "debug"
//! ```
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when the field is absent from the TOML file, so partial
//! files and files written by older versions keep loading.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use telemetry_core::DedupPolicy;
use thiserror::Error;

use crate::domain::{Endpoint, MonitorError, MonitorSettings};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level monitor configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MonitorConfig {
    #[serde(default)]
    pub listener: ListenerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Where and how the listener binds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListenerConfig {
    /// IP address to bind.  Host names are resolved by the binary's `--host`.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// TCP port the device connects to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Pending-connection queue length.
    #[serde(default = "default_backlog")]
    pub backlog: u32,
    /// Bytes requested per receive.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

/// Per-session behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Readings to collect before the binary stops and prints the summary.
    #[serde(default = "default_target_readings")]
    pub target_readings: usize,
    /// `"last_seen"` or `"first_seen"`.
    #[serde(default)]
    pub dedup_policy: DedupPolicy,
    /// Consecutive accept/receive failures tolerated before giving up.
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    6666
}
fn default_backlog() -> u32 {
    100
}
fn default_buffer_size() -> usize {
    telemetry_core::protocol::frame::READ_BUFFER_SIZE
}
fn default_target_readings() -> usize {
    11
}
fn default_max_consecutive_errors() -> u32 {
    16
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            backlog: default_backlog(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            target_readings: default_target_readings(),
            dedup_policy: DedupPolicy::default(),
            max_consecutive_errors: default_max_consecutive_errors(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl MonitorConfig {
    /// The listening endpoint described by `[listener]`.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidEndpoint`] if `bind_address` is not an
    /// IP literal.
    pub fn endpoint(&self) -> Result<Endpoint, MonitorError> {
        Endpoint::parse(&self.listener.bind_address, self.listener.port)
    }

    /// Monitor tunables derived from this config.
    pub fn settings(&self) -> MonitorSettings {
        MonitorSettings {
            backlog: self.listener.backlog,
            buffer_size: self.listener.buffer_size,
            dedup_policy: self.session.dedup_policy,
            max_consecutive_errors: self.session.max_consecutive_errors,
        }
    }

    /// Checks every value the monitor depends on.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidConfig`] or
    /// [`MonitorError::InvalidEndpoint`] describing the first bad value.
    pub fn validate(&self) -> Result<(), MonitorError> {
        self.endpoint()?;
        self.settings().validate()?;
        if self.session.target_readings == 0 {
            return Err(MonitorError::InvalidConfig(
                "target_readings must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Loads `MonitorConfig` from `path`, returning the defaults if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<MonitorConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(MonitorConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Writes `config` to `path` as pretty-printed TOML, creating parent
/// directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &MonitorConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("device-monitor-test-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    // ── Defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn test_default_config_values() {
        // Arrange / Act
        let cfg = MonitorConfig::default();

        // Assert
        assert_eq!(cfg.listener.bind_address, "127.0.0.1");
        assert_eq!(cfg.listener.port, 6666);
        assert_eq!(cfg.listener.backlog, 100);
        assert_eq!(cfg.listener.buffer_size, 1024);
        assert_eq!(cfg.session.target_readings, 11);
        assert_eq!(cfg.session.dedup_policy, DedupPolicy::LastSeen);
        assert_eq!(cfg.log.level, "info");
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(MonitorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_endpoint_from_listener_section() {
        let cfg = MonitorConfig::default();
        assert_eq!(cfg.endpoint().unwrap().to_string(), "127.0.0.1:6666");
    }

    #[test]
    fn test_settings_carry_listener_and_session_values() {
        let mut cfg = MonitorConfig::default();
        cfg.listener.backlog = 5;
        cfg.session.dedup_policy = DedupPolicy::FirstSeen;

        let settings = cfg.settings();

        assert_eq!(settings.backlog, 5);
        assert_eq!(settings.dedup_policy, DedupPolicy::FirstSeen);
    }

    // ── Validation ────────────────────────────────────────────────────────────

    #[test]
    fn test_validate_rejects_host_name_bind_address() {
        let mut cfg = MonitorConfig::default();
        cfg.listener.bind_address = "monitor.local".to_string();
        assert!(matches!(
            cfg.validate(),
            Err(MonitorError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_target_readings() {
        let mut cfg = MonitorConfig::default();
        cfg.session.target_readings = 0;
        assert!(matches!(
            cfg.validate(),
            Err(MonitorError::InvalidConfig(_))
        ));
    }

    // ── TOML parsing ──────────────────────────────────────────────────────────

    #[test]
    fn test_partial_toml_fills_in_defaults() {
        // Arrange
        let text = r#"
            [listener]
            port = 7000

            [session]
            dedup_policy = "first_seen"
        "#;

        // Act
        let cfg: MonitorConfig = toml::from_str(text).unwrap();

        // Assert
        assert_eq!(cfg.listener.port, 7000);
        assert_eq!(cfg.listener.bind_address, "127.0.0.1");
        assert_eq!(cfg.session.dedup_policy, DedupPolicy::FirstSeen);
        assert_eq!(cfg.session.target_readings, 11);
        assert_eq!(cfg.log, LogConfig::default());
    }

    #[test]
    fn test_empty_toml_is_default_config() {
        let cfg: MonitorConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, MonitorConfig::default());
    }

    #[test]
    fn test_unknown_dedup_policy_is_a_parse_error() {
        let text = "[session]\ndedup_policy = \"newest\"";
        let result: Result<MonitorConfig, _> = toml::from_str(text);
        assert!(result.is_err());
    }

    // ── File repository ───────────────────────────────────────────────────────

    #[test]
    fn test_load_config_missing_file_returns_default() {
        let cfg = load_config(&temp_path("missing.toml")).unwrap();
        assert_eq!(cfg, MonitorConfig::default());
    }

    #[test]
    fn test_save_then_load_preserves_values() {
        // Arrange
        let path = temp_path("monitor.toml");
        let mut cfg = MonitorConfig::default();
        cfg.listener.port = 9100;
        cfg.session.target_readings = 3;
        cfg.log.level = "debug".to_string();

        // Act
        save_config(&path, &cfg).unwrap();
        let restored = load_config(&path).unwrap();

        // Assert
        assert_eq!(restored, cfg);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_load_config_malformed_file_returns_parse_error() {
        let path = temp_path("broken.toml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[listener\nport = ").unwrap();

        let result = load_config(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
