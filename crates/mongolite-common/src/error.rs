//! Error types for mongolite
//!
//! Provides a unified error type hierarchy for the server, the wire codec
//! and the command layer.

use thiserror::Error;

/// Result type alias using mongolite's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for mongolite
#[derive(Error, Debug)]
pub enum Error {
    // Protocol Errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    // Configuration Errors
    #[error("Configuration error: {0}")]
    Config(String),

    // IO Errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Internal Errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Wire protocol errors. Any of these means the inbound frame never reaches
/// the router.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid message format: {0}")]
    InvalidFormat(String),

    #[error("Message of {size} bytes exceeds limit of {max} bytes")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Incomplete message")]
    IncompleteMessage,

    #[error("Invalid BSON document: {0}")]
    InvalidDocument(String),
}

/// Administrative command errors. These never abort the connection; the
/// router turns them into `{ok: 0}` reply documents.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("no such command")]
    UnknownCommand(String),

    #[error("{command}: {reason}")]
    InvalidArgument { command: String, reason: String },
}

impl CommandError {
    /// Server error code reported alongside `errmsg`.
    pub fn code(&self) -> i32 {
        match self {
            CommandError::UnknownCommand(_) => 59,
            CommandError::InvalidArgument { .. } => 2,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// TOML is only ever read as configuration.
impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}
