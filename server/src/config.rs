//! Configuration management for the server.

use std::env;
use std::path::PathBuf;

use floro_sync_engine::{DEFAULT_CHUNK_SIZE, MIN_CHUNK_SIZE};

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// JSON file of initial plugin states
    pub seed_file: Option<PathBuf>,
    /// Packet chunk size for outbound messages, in UTF-16 code units
    pub chunk_size: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let seed_file = lookup("SEED_FILE").map(PathBuf::from);

        let chunk_size = match lookup("CHUNK_SIZE") {
            Some(value) => value
                .parse()
                .ok()
                .filter(|size: &usize| *size >= MIN_CHUNK_SIZE)
                .ok_or(ConfigError::InvalidChunkSize)?,
            None => DEFAULT_CHUNK_SIZE,
        };

        Ok(Self {
            host,
            port,
            seed_file,
            chunk_size,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("CHUNK_SIZE must be an integer of at least 2")]
    InvalidChunkSize,
}
