//! Configuration management for mongolite

use serde::{Deserialize, Serialize};
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 5201;

/// Main configuration structure for mongolite
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Wire protocol server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics exporter configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a TOML/JSON file
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref())
            .await
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = if path.as_ref().extension().map_or(false, |ext| ext == "toml") {
            toml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };

        config.validate()?;
        debug!("Loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.server.max_message_bytes < 16 {
            return Err(Error::Config(format!(
                "server.max_message_bytes must be at least 16, got {}",
                self.server.max_message_bytes
            )));
        }
        if self.metrics.enabled && self.metrics.port == self.server.port {
            return Err(Error::Config(format!(
                "metrics.port {} collides with server.port",
                self.metrics.port
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind
    pub host: String,
    /// Listen port
    pub port: u16,
    /// Largest accepted wire frame, header included
    pub max_message_bytes: usize,
    /// Send an empty reply after each insert
    pub acknowledge_inserts: bool,
}

impl ServerConfig {
    /// `host:port` string suitable for binding
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            max_message_bytes: 48_000_000,
            acknowledge_inserts: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by RUST_LOG
    pub level: String,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable the Prometheus exporter
    pub enabled: bool,
    /// Port for the Prometheus scrape endpoint
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9201,
        }
    }
}
