//! Network retrieval of resource bytes
//!
//! The coordinator only depends on the [`Fetcher`] trait, so tests and
//! embedders can swap in any byte source. [`HttpFetcher`] is the production
//! implementation.
//!
//! - [`config`] - HTTP client settings
//! - [`http`] - reqwest-backed fetcher

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::errors::FetchResult;

pub mod config;
pub mod http;

pub use config::FetcherConfig;
pub use http::HttpFetcher;

/// Retrieves the bytes behind a locator
///
/// Implementations must report a missing resource as `FetchError::NotFound`,
/// transport failures as `FetchError::Network`, and bodies failing a sanity
/// check as `FetchError::InvalidData`. Retrying is not their concern.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the resource at `locator`
    async fn fetch(&self, locator: &Url) -> FetchResult<Bytes>;
}
