//! Core configuration types and loading.

use serde::Deserialize;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::defaults::{
    default_display_label, default_log_level, default_port_end, default_port_start,
    default_probe_host, default_request_timeout, default_status_prefix, default_virtual_server_id,
};
use super::fleet::{BotSeed, PrincipalConfig, RankSystemSeed, ServerSeed, StatusSeed};
use super::listen::ListenConfig;
use super::validation::{ValidationError, validate};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Daemon configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Daemon identity.
    pub server: ServerConfig,
    /// Client listeners.
    pub listen: ListenConfig,
    /// Port window for provisioning.
    #[serde(default)]
    pub ports: PortsConfig,
    /// Administrative query session settings.
    #[serde(default)]
    pub query: QueryConfig,
    /// Status cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Access tokens.
    #[serde(default)]
    pub principals: Vec<PrincipalConfig>,
    /// Seed servers for the in-memory record store.
    #[serde(default)]
    pub servers: Vec<ServerSeed>,
    /// Seed bots.
    #[serde(default)]
    pub bots: Vec<BotSeed>,
    /// Seed rank systems.
    #[serde(default)]
    pub rank_systems: Vec<RankSystemSeed>,
    /// Ports already claimed by existing servers.
    #[serde(default)]
    pub used_ports: Vec<u16>,
    /// Seed status-cache entries.
    #[serde(default)]
    pub statuses: Vec<StatusSeed>,
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        validate(&config).map_err(ConfigError::Invalid)?;
        Ok(config)
    }
}

/// Daemon identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Daemon name, used in logs.
    pub name: String,
    /// Prometheus metrics HTTP port. Metrics are off when unset.
    pub metrics_port: Option<u16>,
}

/// Port window scanned by the allocator.
#[derive(Debug, Clone, Deserialize)]
pub struct PortsConfig {
    /// First port of the window (inclusive).
    #[serde(default = "default_port_start")]
    pub start: u16,
    /// Last port of the window (inclusive).
    #[serde(default = "default_port_end")]
    pub end: u16,
    /// Address the bind probe uses.
    #[serde(default = "default_probe_host")]
    pub probe_host: IpAddr,
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            start: default_port_start(),
            end: default_port_end(),
            probe_host: default_probe_host(),
        }
    }
}

/// Administrative query session settings.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    /// Display name set on every query connection.
    #[serde(default = "default_display_label")]
    pub display_label: String,
    /// Virtual server index selected after login.
    #[serde(default = "default_virtual_server_id")]
    pub virtual_server_id: u32,
    /// Seconds to wait for a connect or a single request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl QueryConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            display_label: default_display_label(),
            virtual_server_id: default_virtual_server_id(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Status cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Key prefix of server status entries; the remainder of a key is the room name.
    #[serde(default = "default_status_prefix")]
    pub status_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            status_prefix: default_status_prefix(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging settings. `RUST_LOG` overrides `level` when set.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
[server]
name = "fleet-test"

[listen]
address = "127.0.0.1:7400"
"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::parse(MINIMAL).expect("parse");
        assert_eq!(config.ports.start, 4000);
        assert_eq!(config.ports.end, 8000);
        assert_eq!(config.query.virtual_server_id, 1);
        assert_eq!(config.cache.status_prefix, "status:");
        assert_eq!(config.logging.format, LogFormat::Text);
        assert!(config.principals.is_empty());
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(MINIMAL.as_bytes()).expect("write");
        let config = Config::load(file.path()).expect("load");
        assert_eq!(config.server.name, "fleet-test");
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = Config::load("/nonexistent/voxfleet.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn invalid_config_reports_every_problem() {
        let toml = r#"
[server]
name = ""

[listen]
address = "127.0.0.1:7400"

[ports]
start = 9000
end = 8000
"#;
        match Config::parse(toml) {
            Err(ConfigError::Invalid(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn example_config_is_valid() {
        let config = Config::parse(include_str!("../../config.example.toml")).expect("parse");
        assert_eq!(config.used_ports, vec![9987]);
        assert_eq!(config.logging.format, LogFormat::Text);
        assert!(config.listen.websocket.is_some());
        assert_eq!(config.statuses.len(), 1);
    }
}
