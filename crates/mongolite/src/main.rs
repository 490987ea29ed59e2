//! mongolite - in-memory legacy wire protocol server
//!
//! Accepts OP_INSERT, OP_QUERY and OP_GET_MORE, keeps every collection in
//! memory and answers a small set of administrative commands.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]

use clap::{Parser, Subcommand};
use tracing::info;
use anyhow::Result;

mod config;
mod server;

use server::Node;

#[derive(Parser)]
#[command(name = "mongolite")]
#[command(author, version, about = "mongolite - in-memory wire protocol server", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Serve {
        /// Configuration file path (TOML or JSON); defaults apply when missing
        #[arg(short, long, default_value = "mongolite.toml", env = "MONGOLITE_CONFIG")]
        config: String,

        /// Host to bind, overriding the configuration file
        #[arg(long, env = "MONGOLITE_HOST")]
        host: Option<String>,

        /// Port to bind, overriding the configuration file
        #[arg(short, long, env = "MONGOLITE_PORT")]
        port: Option<u16>,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, host, port } => {
            let mut config = config::load(&config).await?;
            config::apply_overrides(&mut config, host, port);
            config::init_tracing(&config.logging)?;

            info!("Starting mongolite...");
            let node = Node::new(config)?;

            let shutdown = async {
                tokio::signal::ctrl_c().await.ok();
                info!("Shutdown signal received");
            };

            tokio::select! {
                result = node.run() => result?,
                () = shutdown => {}
            }
        }

        Commands::Version => {
            println!("mongolite version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
