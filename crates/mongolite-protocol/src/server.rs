//! Wire protocol TCP server
//!
//! One tokio task per connection. Every connection shares a single
//! [`Router`] behind one mutex, and each message holds the lock for exactly
//! one `route` call, so messages are applied one at a time in arrival order
//! and no reader sees a half-applied insert. Routing never awaits, so the
//! lock is never held across a suspension point.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use mongolite_common::config::ServerConfig;
use mongolite_common::error::{Error, Result};
use mongolite_common::metrics;
use mongolite_core::{ClientContext, RouteResult, Router, RouterOptions};

use crate::codec::{decode_message, encode_reply};
use crate::wire::{parse_header, HEADER_LEN};

/// Router handle shared by every connection task
pub type SharedRouter = Arc<Mutex<Router>>;

/// Legacy wire protocol server
pub struct MongoliteServer {
    router: SharedRouter,
    host: String,
    port: u16,
    max_message_bytes: usize,
}

impl MongoliteServer {
    /// Create a server around an existing router
    pub fn new(router: Router) -> Self {
        let defaults = ServerConfig::default();
        Self {
            router: Arc::new(Mutex::new(router)),
            host: defaults.host,
            port: defaults.port,
            max_message_bytes: defaults.max_message_bytes,
        }
    }

    /// Create a server with a fresh router configured from `config`
    pub fn from_config(config: &ServerConfig) -> Self {
        let router = Router::with_options(RouterOptions {
            acknowledge_inserts: config.acknowledge_inserts,
        });
        Self {
            router: Arc::new(Mutex::new(router)),
            host: config.host.clone(),
            port: config.port,
            max_message_bytes: config.max_message_bytes,
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: &str) -> Self {
        if let Some((host, port)) = addr.rsplit_once(':') {
            self.host = host.to_string();
            self.port = port.parse().unwrap_or(self.port);
        }
        self
    }

    /// Set the port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Handle to the router, e.g. to inspect the store
    pub fn router(&self) -> SharedRouter {
        Arc::clone(&self.router)
    }

    /// Bind the configured address
    pub async fn listen(&self) -> Result<TcpListener> {
        let addr = format!("{}:{}", self.host, self.port);
        TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Internal(format!("Failed to bind {}: {}", addr, e)))
    }

    /// Bind and serve until the task is dropped
    pub async fn run(self) -> Result<()> {
        let listener = self.listen().await?;
        self.serve(listener).await
    }

    /// Serve connections accepted on `listener`
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        info!("mongolite listening on {}", listener.local_addr()?);

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    debug!("New connection from {}", peer);
                    metrics::record_connection();

                    let router = Arc::clone(&self.router);
                    let max_message_bytes = self.max_message_bytes;
                    tokio::spawn(async move {
                        match handle_connection(stream, peer, router, max_message_bytes).await {
                            Ok(()) => debug!("Connection from {} closed", peer),
                            Err(Error::Protocol(e)) => warn!("Dropping {}: {}", peer, e),
                            Err(e) => error!("Connection error from {}: {}", peer, e),
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

/// Handle a single client connection
async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    router: SharedRouter,
    max_message_bytes: usize,
) -> Result<()> {
    let client = ClientContext::new(peer);
    let mut request_id_counter = 1i32;
    let mut header_bytes = [0u8; HEADER_LEN];

    loop {
        match stream.read_exact(&mut header_bytes).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        let header = parse_header(&header_bytes)?;
        let body_len = match header.body_len(max_message_bytes) {
            Ok(len) => len,
            Err(e) => {
                metrics::record_malformed_message();
                return Err(e.into());
            }
        };

        let mut body = vec![0u8; body_len];
        stream.read_exact(&mut body).await?;

        debug!(
            "Received message: length={}, request_id={}, opcode={:?}",
            header.message_length, header.request_id, header.op_code
        );

        let message = match decode_message(&header, &body) {
            Ok(message) => message,
            Err(e) => {
                // The frame was fully consumed, so the stream is still aligned.
                warn!("Discarding malformed request {} from {}: {}", header.request_id, peer, e);
                metrics::record_malformed_message();
                continue;
            }
        };

        let result = router.lock().route(&client, message);

        match result {
            RouteResult::Replied(reply) => {
                let frame = encode_reply(request_id_counter, &reply)?;
                request_id_counter = request_id_counter.wrapping_add(1);
                stream.write_all(&frame).await?;
            }
            RouteResult::NoReplyNeeded => {}
            RouteResult::Unhandled => {
                debug!("No reply for request {} from {}", header.request_id, peer);
            }
        }
    }
}
