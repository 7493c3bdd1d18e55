//! Error types for the resource cache
//!
//! Errors are split by the component that produces them. Fetch errors are the
//! only ones that can end a request in a failed state; cache (store) errors are
//! logged and absorbed by the coordinator, and configuration errors surface at
//! startup.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while retrieving bytes from a locator
///
/// These are broadcast verbatim to every waiter of an in-flight request, so
/// they carry only owned, cloneable context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Remote reported the resource as missing (404 / 410)
    #[error("Resource not found: {url}")]
    NotFound { url: String },

    /// Transport failure, timeout or non-success status
    #[error("Network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    /// Response arrived but failed the sanity check
    #[error("Invalid data from {url}: {reason}")]
    InvalidData { url: String, reason: String },

    /// The shared fetch ended without publishing a result (aborted or shut down)
    #[error("Fetch of {url} was interrupted before completion")]
    Interrupted { url: String },
}

impl FetchError {
    /// Short machine-friendly name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::NotFound { .. } => "not_found",
            FetchError::Network { .. } => "network",
            FetchError::InvalidData { .. } => "invalid_data",
            FetchError::Interrupted { .. } => "interrupted",
        }
    }

    /// Locator the failed fetch was addressed to
    pub fn url(&self) -> &str {
        match self {
            FetchError::NotFound { url }
            | FetchError::Network { url, .. }
            | FetchError::InvalidData { url, .. }
            | FetchError::Interrupted { url } => url,
        }
    }
}

/// Memory and disk store errors
#[derive(Error, Debug)]
pub enum CacheError {
    /// Filesystem operation failed
    #[error("Cache I/O error at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Cache directory could not be created or resolved
    #[error("Cache directory not accessible: {path}")]
    DirectoryNotAccessible { path: PathBuf },

    /// Entry is larger than the whole store may hold
    #[error("Entry of {size} bytes exceeds cache capacity of {capacity} bytes")]
    CapacityExceeded { size: u64, capacity: u64 },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }

    /// Soft errors are reported but never fail the caller
    pub fn is_soft(&self) -> bool {
        matches!(self, CacheError::CapacityExceeded { .. })
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Configuration could not be rendered as TOML
    #[error("Failed to serialize configuration")]
    Serialize(#[from] toml::ser::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Fetch error
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Cache error
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if re-issuing the request might succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Fetch(FetchError::Network { .. })
            | AppError::Fetch(FetchError::Interrupted { .. }) => true,

            AppError::Fetch(FetchError::NotFound { .. })
            | AppError::Fetch(FetchError::InvalidData { .. })
            | AppError::Config(_) => false,

            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Fetch(_) => "fetch",
            AppError::Cache(_) => "cache",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Fetch result type alias
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Cache result type alias
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Config result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_kind_and_url() {
        let err = FetchError::NotFound {
            url: "https://example.com/a.png".to_string(),
        };
        assert_eq!(err.kind(), "not_found");
        assert_eq!(err.url(), "https://example.com/a.png");

        let err = FetchError::Network {
            url: "https://example.com".to_string(),
            reason: "HTTP 500".to_string(),
        };
        assert_eq!(err.kind(), "network");
        assert!(err.to_string().contains("HTTP 500"));
    }

    #[test]
    fn test_capacity_exceeded_is_soft() {
        let soft = CacheError::CapacityExceeded {
            size: 10,
            capacity: 5,
        };
        assert!(soft.is_soft());

        let hard = CacheError::io(
            "/tmp/x",
            std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        );
        assert!(!hard.is_soft());
    }

    #[test]
    fn test_app_error_category() {
        let app_error = AppError::from(FetchError::Interrupted {
            url: "https://example.com".to_string(),
        });
        assert_eq!(app_error.category(), "fetch");
        assert!(app_error.is_recoverable());

        let not_found = AppError::from(FetchError::NotFound {
            url: "https://example.com".to_string(),
        });
        assert!(!not_found.is_recoverable());
        assert_eq!(AppError::generic("boom").category(), "generic");
    }
}
