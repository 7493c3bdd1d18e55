//! Disk tier configuration
//!
//! Capacity limits here are enforced out-of-band by the eviction pass, never
//! on the request path.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::disk;
use crate::errors::{CacheError, CacheResult};

/// Configuration for the on-disk blob store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskConfig {
    /// Cache directory (OS cache directory if None)
    pub directory: Option<PathBuf>,
    /// Evict oldest-by-mtime when total bytes exceed this (0 = unlimited)
    pub max_bytes: u64,
    /// Evict oldest-by-mtime when the blob count exceeds this (0 = unlimited)
    pub max_entries: usize,
    /// How often the background eviction pass runs (None = never)
    #[serde(with = "humantime_serde")]
    pub eviction_interval: Option<Duration>,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            directory: None,
            max_bytes: disk::DEFAULT_MAX_BYTES,
            max_entries: disk::DEFAULT_MAX_ENTRIES,
            eviction_interval: Some(disk::DEFAULT_EVICTION_INTERVAL),
        }
    }
}

impl DiskConfig {
    /// Create a configuration rooted at a custom directory
    pub fn with_directory(directory: PathBuf) -> Self {
        Self {
            directory: Some(directory),
            ..Default::default()
        }
    }

    /// Set maximum total bytes on disk
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Set maximum blob count
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Set or disable the background eviction interval
    pub fn with_eviction_interval(mut self, interval: Option<Duration>) -> Self {
        self.eviction_interval = interval;
        self
    }

    /// Whether any capacity limit is configured
    pub fn has_limits(&self) -> bool {
        self.max_bytes > 0 || self.max_entries > 0
    }

    /// Resolve the configured or default cache directory
    ///
    /// - Linux: ~/.cache/resource-cache
    /// - macOS: ~/Library/Caches/resource-cache
    /// - Windows: %LOCALAPPDATA%/resource-cache
    pub fn resolve_directory(&self) -> CacheResult<PathBuf> {
        match &self.directory {
            Some(path) => Ok(path.clone()),
            None => dirs::cache_dir()
                .map(|dir| dir.join(disk::APP_DIR_NAME))
                .ok_or_else(|| CacheError::DirectoryNotAccessible {
                    path: PathBuf::from("system cache directory"),
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DiskConfig::default();
        assert_eq!(config.directory, None);
        assert_eq!(config.max_bytes, disk::DEFAULT_MAX_BYTES);
        assert_eq!(config.max_entries, disk::DEFAULT_MAX_ENTRIES);
        assert_eq!(
            config.eviction_interval,
            Some(disk::DEFAULT_EVICTION_INTERVAL)
        );
        assert!(config.has_limits());
    }

    #[test]
    fn test_config_builder() {
        let dir = PathBuf::from("/tmp/resource-cache-test");
        let config = DiskConfig::with_directory(dir.clone())
            .with_max_bytes(0)
            .with_max_entries(0)
            .with_eviction_interval(None);

        assert_eq!(config.resolve_directory().unwrap(), dir);
        assert!(!config.has_limits());
        assert_eq!(config.eviction_interval, None);
    }

    #[test]
    fn test_interval_uses_humantime() {
        let config: DiskConfig = toml::from_str(
            r#"
directory = "/var/cache/images"
max_entries = 50
eviction_interval = "5m"
"#,
        )
        .unwrap();

        assert_eq!(config.eviction_interval, Some(Duration::from_secs(300)));
        assert_eq!(config.max_entries, 50);
        assert_eq!(config.max_bytes, disk::DEFAULT_MAX_BYTES);
    }
}
