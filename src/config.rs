//! Configuration management for the resource cache
//!
//! This module provides unified configuration with multi-source loading and
//! zero-config defaults. Every section and field has a default, so a config
//! file only needs the values it changes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::{CoordinatorConfig, DiskConfig, FetcherConfig, MemoryConfig};
use crate::constants::{config as files, disk, env, http, logging, memory};
use crate::errors::{AppError, ConfigError, ConfigResult, Result};

/// Unified application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// In-memory tier bounds
    pub memory: MemoryConfig,
    /// On-disk tier location and limits
    pub disk: DiskConfig,
    /// HTTP fetcher settings
    pub fetcher: FetcherConfig,
    /// Request coordination settings
    pub coordinator: CoordinatorConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level for the application
    pub level: String,
    /// Enable colored output
    pub colored_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LOG_LEVEL.to_string(),
            colored_output: true,
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

impl AppConfig {
    /// Load configuration with multi-source precedence:
    /// 1. Default values
    /// 2. Config file (explicit path, `RESOURCE_CACHE_CONFIG`, or a standard location)
    /// 3. Environment variables (`RESOURCE_CACHE_DIR`)
    ///
    /// CLI overrides are applied by the caller on the returned value.
    pub async fn load(config_file_override: Option<PathBuf>) -> Result<Self> {
        let explicit = config_file_override.or_else(|| {
            std::env::var(env::CONFIG_FILE)
                .ok()
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from)
        });

        let mut config = match explicit {
            Some(path) if !path.exists() => {
                return Err(ConfigError::NotFound { path }.into());
            }
            Some(path) => Self::load_from_file(&path).await?,
            None => match Self::find_config_file()? {
                Some(path) => Self::load_from_file(&path).await?,
                None => Self::default(),
            },
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Override the disk directory
    pub fn with_cache_dir(mut self, directory: PathBuf) -> Self {
        self.disk.directory = Some(directory);
        self
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var(env::CACHE_DIR) {
            if !dir.trim().is_empty() {
                debug!("Cache directory overridden by {}: {}", env::CACHE_DIR, dir);
                self.disk.directory = Some(PathBuf::from(dir));
            }
        }
    }

    /// Reject values the cache cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        self.fetcher.validate()?;

        let level = self.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                value: self.logging.level.clone(),
                reason: format!("Expected one of: {}", LOG_LEVELS.join(", ")),
            });
        }

        Ok(())
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Result<Option<PathBuf>> {
        let mut search_paths = vec![PathBuf::from(files::LOCAL_FILE_NAME)];
        if let Ok(user_path) = Self::default_config_path() {
            search_paths.push(user_path);
        }

        for path in search_paths {
            if path.exists() {
                debug!("Found config file: {}", path.display());
                return Ok(Some(path));
            }
        }

        debug!("No config file found in standard locations");
        Ok(None)
    }

    /// Default config file path for the current user
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| AppError::generic("Could not determine user config directory"))?;

        Ok(config_dir
            .join(disk::APP_DIR_NAME)
            .join(files::USER_FILE_NAME))
    }

    /// Load configuration from a TOML file
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::generic(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: AppConfig = toml::from_str(&content).map_err(ConfigError::from)?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Render the effective configuration as TOML
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write the commented default configuration to `path`
    ///
    /// Refuses to overwrite an existing file unless `force` is set.
    pub async fn write_default(path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            return Err(AppError::generic(format!(
                "Config file already exists: {} (use --force to overwrite)",
                path.display()
            )));
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::generic(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        tokio::fs::write(path, Self::generate_default_config_content())
            .await
            .map_err(|e| {
                AppError::generic(format!(
                    "Failed to write config file {}: {}",
                    path.display(),
                    e
                ))
            })?;

        info!("Wrote default configuration to: {}", path.display());
        Ok(())
    }

    /// Generate default configuration content with helpful comments
    pub fn generate_default_config_content() -> String {
        let default_cache_path = dirs::cache_dir()
            .map(|dir| dir.join(disk::APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("./cache"));

        format!(
            r#"# Resource Cache Configuration
# Every setting is optional; removed lines fall back to these defaults.

[memory]
# Maximum entries held in memory (0 = unlimited)
max_entries = {memory_entries}
# Maximum payload bytes held in memory (0 = unlimited)
max_bytes = {memory_bytes}

[disk]
# Cache directory (default: {cache_path})
# directory = "/path/to/custom/cache"
# Evict oldest-by-mtime above this many bytes (0 = unlimited)
max_bytes = {disk_bytes}
# Evict oldest-by-mtime above this many files (0 = unlimited)
max_entries = {disk_entries}
# Background eviction interval ("0s" disables the background task)
eviction_interval = "{eviction_interval}s"

[fetcher]
request_timeout = "{request_timeout}s"
connect_timeout = "{connect_timeout}s"
pool_idle_timeout = "{pool_idle_timeout}s"
pool_max_per_host = {pool_max_per_host}
tcp_nodelay = true
# Requests per second across all fetches (0 = unlimited)
rate_limit_rps = {rate_limit}
# Largest accepted response body in bytes (0 = unlimited)
max_body_bytes = {max_body}

[coordinator]
# Abort a fetch once every caller waiting on it has cancelled
abort_orphaned_fetches = false

[logging]
level = "{level}"  # error, warn, info, debug, trace
colored_output = true
"#,
            memory_entries = memory::DEFAULT_MAX_ENTRIES,
            memory_bytes = memory::DEFAULT_MAX_BYTES,
            cache_path = default_cache_path.display(),
            disk_bytes = disk::DEFAULT_MAX_BYTES,
            disk_entries = disk::DEFAULT_MAX_ENTRIES,
            eviction_interval = disk::DEFAULT_EVICTION_INTERVAL.as_secs(),
            request_timeout = http::DEFAULT_TIMEOUT.as_secs(),
            connect_timeout = http::CONNECT_TIMEOUT.as_secs(),
            pool_idle_timeout = http::POOL_IDLE_TIMEOUT.as_secs(),
            pool_max_per_host = http::POOL_MAX_PER_HOST,
            rate_limit = http::DEFAULT_RATE_LIMIT_RPS,
            max_body = http::MAX_BODY_BYTES,
            level = logging::DEFAULT_LOG_LEVEL,
        )
    }
}
