//! Memory tier configuration

use serde::{Deserialize, Serialize};

use crate::constants::memory;

/// Capacity bounds for the in-memory tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Maximum number of entries (0 = unlimited)
    pub max_entries: usize,
    /// Maximum total payload bytes (0 = unlimited)
    pub max_bytes: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_entries: memory::DEFAULT_MAX_ENTRIES,
            max_bytes: memory::DEFAULT_MAX_BYTES,
        }
    }
}

impl MemoryConfig {
    /// Configuration with no bounds at all
    pub fn unbounded() -> Self {
        Self {
            max_entries: 0,
            max_bytes: 0,
        }
    }

    /// Set the maximum number of entries
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Set the maximum total bytes
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}
