//! Session configuration.

use serde::{Deserialize, Serialize};

/// Largest packet chunk, in UTF-16 code units.
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// Smallest usable chunk: one surrogate pair.
pub const MIN_CHUNK_SIZE: usize = 2;

/// How long a local edit is protected from racing remote snapshots.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 200;

/// Tunables for a [`crate::PluginSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    /// Maximum chunk length per packet, in UTF-16 code units. Values below
    /// [`MIN_CHUNK_SIZE`] are raised to it.
    pub chunk_size: usize,
    /// Delay after the last accepted update before the edit key is cleared
    pub settle_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
        }
    }
}

impl SessionConfig {
    /// Chunk size actually used for packetizing.
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.max(MIN_CHUNK_SIZE)
    }
}
