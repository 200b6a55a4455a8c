//! Relay configuration.
//!
//! Configuration is layered:
//! - built-in defaults
//! - a TOML file (`--config`, or the first of the default search paths)
//! - environment variables (`WARD_PORT`, `WARD_LIMITS__MAX_SUBSCRIBERS`, ...)

use anyhow::{ensure, Context, Result};
use config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default search paths, first match wins.
pub const CONFIG_PATHS: [&str; 3] = [
    "ward.toml",
    "/etc/ward/ward.toml",
    "~/.config/ward/ward.toml",
];

/// Relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Transport configuration.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Heartbeat configuration.
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Path of the WebSocket endpoint.
    #[serde(default = "default_ws_path")]
    pub path: String,
}

/// Resource limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum number of connected subscribers.
    #[serde(default = "default_max_subscribers")]
    pub max_subscribers: usize,

    /// Updates buffered per subscriber before new ones are dropped.
    #[serde(default = "default_subscriber_queue")]
    pub subscriber_queue: usize,

    /// Maximum inbound message size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

/// Heartbeat configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Ping interval advertised to clients, in milliseconds.
    #[serde(default = "default_heartbeat_interval")]
    pub interval_ms: u64,

    /// Silence after which a connection is closed, in milliseconds. Must
    /// exceed `interval_ms`, or a client pinging on schedule is dropped.
    #[serde(default = "default_heartbeat_timeout")]
    pub timeout_ms: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable the Prometheus exporter.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Exporter port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

fn default_ws_path() -> String {
    "/".to_string()
}

fn default_max_subscribers() -> usize {
    10_000
}

fn default_subscriber_queue() -> usize {
    256
}

fn default_max_message_size() -> usize {
    64 * 1024 // 64 KB
}

fn default_heartbeat_interval() -> u64 {
    30_000
}

fn default_heartbeat_timeout() -> u64 {
    60_000
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            transport: TransportConfig::default(),
            limits: LimitsConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            path: default_ws_path(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_subscribers: default_max_subscribers(),
            subscriber_queue: default_subscriber_queue(),
            max_message_size: default_max_message_size(),
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_heartbeat_interval(),
            timeout_ms: default_heartbeat_timeout(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, the default search paths
    /// are tried and defaults are used if none exists. `WARD_*` environment
    /// variables are applied on top either way.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::find_default(),
        };
        Self::build(file.as_deref(), ward_env())
    }

    /// Load configuration from a specific file, with the environment overlay.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::build(Some(path.as_ref()), ward_env())
    }

    fn find_default() -> Option<PathBuf> {
        CONFIG_PATHS
            .iter()
            .map(|path| PathBuf::from(shellexpand::tilde(path).as_ref()))
            .find(|path| path.exists())
    }

    fn build(file: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }
        let layered = builder
            .add_source(env)
            .build()
            .with_context(|| match file {
                Some(path) => format!("Failed to load config file: {}", path.display()),
                None => "Failed to load config from environment".to_string(),
            })?;

        let config: Self = layered
            .try_deserialize()
            .context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns an error if the heartbeat interval is zero or the idle timeout
    /// does not exceed it.
    pub fn validate(&self) -> Result<()> {
        let heartbeat = &self.heartbeat;
        ensure!(heartbeat.interval_ms > 0, "heartbeat.interval_ms must be positive");
        ensure!(
            heartbeat.timeout_ms > heartbeat.interval_ms,
            "heartbeat.timeout_ms ({}) must exceed heartbeat.interval_ms ({})",
            heartbeat.timeout_ms,
            heartbeat.interval_ms
        );
        Ok(())
    }

    /// Get the socket address to bind to.
    ///
    /// # Errors
    ///
    /// Returns an error if `host:port` is not a valid socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.host, self.port))
    }

    /// Silence after which a connection is dropped.
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat.timeout_ms)
    }
}

fn ward_env() -> Environment {
    Environment::with_prefix("WARD")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_from(pairs: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ward_env().source(Some(map))
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.transport.path, "/");
        assert_eq!(config.limits.subscriber_queue, 256);
    }

    #[test]
    fn test_config_bind_addr() {
        let config = Config::default();
        assert_eq!(config.bind_addr().unwrap().port(), 8080);

        let bad = Config {
            host: "not a host".into(),
            ..Config::default()
        };
        assert!(bad.bind_addr().is_err());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            host = "0.0.0.0"
            port = 9000

            [limits]
            max_subscribers = 50
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.limits.max_subscribers, 50);
        assert_eq!(config.heartbeat.timeout_ms, 60_000);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 9000\n[heartbeat]\ninterval_ms = 2000\ntimeout_ms = 5000").unwrap();

        let config = Config::build(
            Some(file.path()),
            env_from(&[("WARD_PORT", "7000"), ("WARD_LIMITS__MAX_SUBSCRIBERS", "3")]),
        )
        .unwrap();

        assert_eq!(config.port, 7000);
        assert_eq!(config.limits.max_subscribers, 3);
        assert_eq!(config.heartbeat.timeout_ms, 5000);
        assert_eq!(config.idle_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_env_only() {
        let config = Config::build(None, env_from(&[("WARD_TRANSPORT__PATH", "/relay")])).unwrap();
        assert_eq!(config.transport.path, "/relay");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_timeout_must_exceed_interval() {
        assert!(Config::default().validate().is_ok());

        let err = Config::build(
            None,
            env_from(&[("WARD_HEARTBEAT__INTERVAL_MS", "30000"), ("WARD_HEARTBEAT__TIMEOUT_MS", "30000")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("timeout_ms"));

        assert!(Config::build(None, env_from(&[("WARD_HEARTBEAT__INTERVAL_MS", "0")])).is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(Config::build(Some(&missing), env_from(&[])).is_err());
    }
}
