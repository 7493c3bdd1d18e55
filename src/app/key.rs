//! Stable cache keys and their on-disk names
//!
//! A key addresses a resource in both tiers. On disk the key itself never
//! appears in a path: the filename stem is the MD5 digest of the key, which
//! keeps names fixed-length and free of filesystem-illegal characters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Stable identifier of a cached resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wrap an arbitrary stable string as a key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derive the key for a `(name, url)` item
    ///
    /// The name wins when it is non-blank; unnamed items fall back to the
    /// full locator so the same URL always maps to the same entry.
    pub fn derive(name: &str, locator: &str) -> Self {
        let name = name.trim();
        if name.is_empty() {
            Self(locator.to_string())
        } else {
            Self(name.to_string())
        }
    }

    /// The key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercase hex MD5 digest of the key, used as the filename stem
    pub fn file_stem(&self) -> String {
        format!("{:x}", md5::compute(self.0.as_bytes()))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CacheKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "key".to_string(),
                value: s.to_string(),
                reason: "Cache keys must not be empty".to_string(),
            });
        }
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}
