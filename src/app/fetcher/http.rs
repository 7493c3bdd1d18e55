//! HTTP(S) fetcher backed by reqwest
//!
//! Maps transport outcomes onto the fetch error taxonomy: 404/410 become
//! `NotFound`, other non-2xx statuses and transport failures (timeouts
//! included) become `Network`, and empty or oversized bodies become
//! `InvalidData`. No retries happen here.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Jitter, Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use url::Url;

use crate::errors::{ConfigError, ConfigResult, FetchError, FetchResult};

use super::config::FetcherConfig;
use super::Fetcher;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Fetches bytes over HTTP(S)
#[derive(Debug)]
pub struct HttpFetcher {
    client: Client,
    rate_limiter: Option<DirectRateLimiter>,
    config: FetcherConfig,
}

impl HttpFetcher {
    /// Creates a new HttpFetcher from configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration is invalid or the HTTP
    /// client cannot be built
    pub fn new(config: FetcherConfig) -> ConfigResult<Self> {
        config.validate()?;

        let client = config
            .build_http_client()
            .map_err(|e| ConfigError::InvalidValue {
                field: "fetcher".to_string(),
                value: config.user_agent.clone(),
                reason: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            rate_limiter: Self::build_rate_limiter(config.rate_limit_rps),
            config,
        })
    }

    /// Builds the rate limiter, `None` when unlimited
    fn build_rate_limiter(rate_limit_rps: u32) -> Option<DirectRateLimiter> {
        NonZeroU32::new(rate_limit_rps).map(|rps| RateLimiter::direct(Quota::per_second(rps)))
    }

    /// Configuration in use
    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    fn transport_error(&self, locator: &Url, error: &reqwest::Error) -> FetchError {
        let reason = if error.is_timeout() {
            format!(
                "timed out after {}ms",
                self.config.request_timeout.as_millis()
            )
        } else if error.is_connect() {
            format!("connection failed: {}", error)
        } else {
            error.to_string()
        };

        FetchError::Network {
            url: locator.to_string(),
            reason,
        }
    }

    fn check_size(&self, locator: &Url, len: u64) -> FetchResult<()> {
        let max = self.config.max_body_bytes;
        if max > 0 && len > max {
            return Err(FetchError::InvalidData {
                url: locator.to_string(),
                reason: format!("body of {} bytes exceeds limit of {} bytes", len, max),
            });
        }
        Ok(())
    }

    /// Read the body chunk by chunk, failing once it passes the size limit
    ///
    /// Content-Length is only a hint; chunked or unannounced bodies are
    /// bounded here.
    async fn read_body(
        &self,
        locator: &Url,
        mut response: reqwest::Response,
    ) -> FetchResult<Bytes> {
        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| self.transport_error(locator, &e))?
        {
            self.check_size(locator, (body.len() + chunk.len()) as u64)?;
            body.extend_from_slice(&chunk);
        }
        Ok(body.freeze())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, locator: &Url) -> FetchResult<Bytes> {
        if let Some(limiter) = &self.rate_limiter {
            limiter
                .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(50)))
                .await;
        }

        let response = self
            .client
            .get(locator.clone())
            .send()
            .await
            .map_err(|e| self.transport_error(locator, &e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            tracing::debug!(url = %locator, status = status.as_u16(), "Resource not found");
            return Err(FetchError::NotFound {
                url: locator.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Network {
                url: locator.to_string(),
                reason: format!("HTTP {}", status.as_u16()),
            });
        }

        if let Some(len) = response.content_length() {
            self.check_size(locator, len)?;
        }

        let body = self.read_body(locator, response).await?;

        if body.is_empty() {
            return Err(FetchError::InvalidData {
                url: locator.to_string(),
                reason: "empty response body".to_string(),
            });
        }

        tracing::debug!(url = %locator, bytes = body.len(), "Fetched resource");
        Ok(body)
    }
}
