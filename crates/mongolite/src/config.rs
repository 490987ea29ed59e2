//! Configuration loading and logging setup

use std::path::Path;

use anyhow::Result;
use mongolite_common::config::{Config, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Load configuration from file, falling back to defaults when it is absent
pub async fn load(path: &str) -> Result<Config> {
    let path = Path::new(path);

    if path.exists() {
        Config::load(path).await.map_err(|e| anyhow::anyhow!(e))
    } else {
        Ok(Config::default())
    }
}

/// Apply command line overrides on top of the loaded file
pub fn apply_overrides(config: &mut Config, host: Option<String>, port: Option<u16>) {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured level.
pub fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&logging.level))?;

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .map_err(|e| anyhow::anyhow!(e))
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .map_err(|e| anyhow::anyhow!(e))
    }
}
