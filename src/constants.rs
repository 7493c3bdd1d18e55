//! Application constants for the resource cache
//!
//! This module centralizes the defaults used throughout the crate, organized by
//! the component they configure.

use std::time::Duration;

/// Environment variable names
pub mod env {
    /// Overrides the disk cache directory
    pub const CACHE_DIR: &str = "RESOURCE_CACHE_DIR";

    /// Explicit configuration file path
    pub const CONFIG_FILE: &str = "RESOURCE_CACHE_CONFIG";
}

/// HTTP fetcher defaults
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = concat!("resource-cache/", env!("CARGO_PKG_VERSION"));

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum idle connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 8;

    /// Largest body accepted into the cache (32 MiB)
    pub const MAX_BODY_BYTES: u64 = 32 * 1024 * 1024;

    /// Default request rate limit (requests per second, 0 = unlimited)
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 0;
}

/// Memory tier defaults
pub mod memory {
    /// Default maximum number of entries held in memory
    pub const DEFAULT_MAX_ENTRIES: usize = 256;

    /// Default maximum total bytes held in memory (64 MiB)
    pub const DEFAULT_MAX_BYTES: u64 = 64 * 1024 * 1024;
}

/// Disk tier defaults and file naming
pub mod disk {
    use super::Duration;

    /// Directory name used under the OS cache directory
    pub const APP_DIR_NAME: &str = "resource-cache";

    /// Extension of committed cache blobs
    pub const BLOB_EXTENSION: &str = "blob";

    /// Suffix of in-progress writes
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";

    /// Default maximum total bytes on disk (512 MiB)
    pub const DEFAULT_MAX_BYTES: u64 = 512 * 1024 * 1024;

    /// Default maximum number of blobs on disk (0 = unlimited)
    pub const DEFAULT_MAX_ENTRIES: usize = 0;

    /// Default interval of the background eviction task
    pub const DEFAULT_EVICTION_INTERVAL: Duration = Duration::from_secs(600);
}

/// Configuration file locations
pub mod config {
    /// Project-local configuration file name
    pub const LOCAL_FILE_NAME: &str = "resource-cache.toml";

    /// File name inside the user configuration directory
    pub const USER_FILE_NAME: &str = "config.toml";
}

/// Logging defaults
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "warn";
}
