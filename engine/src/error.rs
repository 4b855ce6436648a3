//! Error types for the sync engine.

use crate::protocol::CommandMode;
use thiserror::Error;

/// All possible errors from the sync engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Addressing errors
    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("path not found in state: {0}")]
    PathNotFound(String),

    #[error("no schema registered for: {0}")]
    SchemaNotFound(String),

    #[error("query '{query}' expects {expected} arguments, got {got}")]
    QueryArity {
        query: String,
        expected: usize,
        got: usize,
    },

    // Session errors
    #[error("session has not received a load event")]
    NotLoaded,

    #[error("writes are not allowed in {0} mode")]
    NotEditable(CommandMode),

    // Transport errors
    #[error("invalid packet: {0}")]
    InvalidPacket(String),

    #[error("transport closed: {0}")]
    Transport(String),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
