//! Prelude module for the resource cache library
//!
//! Re-exports the items most integrations need, so a single
//! `use resource_cache::prelude::*;` is enough for typical usage.
//!
//! # Usage
//!
//! ```rust,no_run
//! use resource_cache::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let cache = ResourceCache::initialize(AppConfig::default()).await?;
//!     let cache = ResourceCache::install_global(cache)?;
//!
//!     let url = url::Url::parse("https://example.com/logo.png").map_err(|e| AppError::generic(e.to_string()))?;
//!     let state = cache.load(CacheKey::new("logo"), url).wait().await;
//!     println!("{:?}", state.bytes().map(|b| b.len()));
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, CacheError, FetchError, Result};

// Configuration
pub use crate::config::AppConfig;

// Essential components
pub use crate::app::{
    CacheCoordinator, CacheKey, CacheStats, Fetcher, RequestHandle, RequestState, ResourceCache,
    Subscription,
};
