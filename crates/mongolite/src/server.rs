//! Server orchestration

use std::net::{SocketAddr, ToSocketAddrs};

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

use mongolite_common::config::Config;
use mongolite_protocol::MongoliteServer;

/// The running process: wire protocol server plus optional metrics exporter
pub struct Node {
    config: Config,
    server: MongoliteServer,
}

impl Node {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let server = MongoliteServer::from_config(&config.server);
        Ok(Self { config, server })
    }

    /// Start the exporter (if enabled) and serve until the task is dropped
    pub async fn run(self) -> Result<()> {
        if self.config.metrics.enabled {
            let addr = metrics_address(&self.config.server.host, self.config.metrics.port)?;
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()
                .context("failed to install Prometheus exporter")?;
            info!("Prometheus metrics on http://{}/metrics", addr);
        }

        info!(
            "Serving on {} (acknowledge_inserts={})",
            self.config.server.bind_address(),
            self.config.server.acknowledge_inserts
        );
        self.server.run().await?;
        Ok(())
    }
}

/// Resolve the exporter address on the server's host
fn metrics_address(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .with_context(|| format!("invalid metrics listen host {:?}", host))?
        .next()
        .with_context(|| format!("metrics listen host {:?} resolved to no address", host))
}
