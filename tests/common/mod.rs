//! Shared helpers for the integration tests
//!
//! Stub fetchers that count invocations and can be held at a gate until the
//! test has lined up every concurrent caller.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tempfile::TempDir;
use tokio::sync::Semaphore;
use url::Url;

use resource_cache::app::{
    CacheCoordinator, CoordinatorConfig, DiskConfig, DiskStore, Fetcher, MemoryConfig, MemoryStore,
};
use resource_cache::errors::{FetchError, FetchResult};

/// Fetcher returning a canned response and counting calls
pub struct StubFetcher {
    calls: AtomicUsize,
    response: Mutex<FetchResult<Bytes>>,
    gate: Option<Semaphore>,
    enabled: AtomicBool,
}

impl StubFetcher {
    fn new(response: FetchResult<Bytes>, gated: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            response: Mutex::new(response),
            gate: gated.then(|| Semaphore::new(0)),
            enabled: AtomicBool::new(true),
        })
    }

    /// Responds immediately with `body`
    pub fn ok(body: Vec<u8>) -> Arc<Self> {
        Self::new(Ok(Bytes::from(body)), false)
    }

    /// Responds immediately with `error`
    pub fn failing(error: FetchError) -> Arc<Self> {
        Self::new(Err(error), false)
    }

    /// Responds with `body` once released
    pub fn gated_ok(body: Vec<u8>) -> Arc<Self> {
        Self::new(Ok(Bytes::from(body)), true)
    }

    /// Responds with `error` once released
    pub fn gated_failing(error: FetchError) -> Arc<Self> {
        Self::new(Err(error), true)
    }

    /// Let `n` pending or future fetches proceed
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Make every further call fail loudly
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    /// Number of fetch calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, locator: &Url) -> FetchResult<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.enabled.load(Ordering::SeqCst) {
            return Err(FetchError::Network {
                url: locator.to_string(),
                reason: "fetcher disabled".to_string(),
            });
        }

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        self.response.lock().unwrap().clone()
    }
}

/// Fetcher that panics mid-fetch
pub struct PanickingFetcher;

#[async_trait]
impl Fetcher for PanickingFetcher {
    async fn fetch(&self, locator: &Url) -> FetchResult<Bytes> {
        panic!("fetcher blew up for {}", locator);
    }
}

pub fn locator() -> Url {
    Url::parse("https://example.com/burger-banner.png").unwrap()
}

pub async fn disk_store(temp_dir: &TempDir) -> Arc<DiskStore> {
    let config = DiskConfig::with_directory(temp_dir.path().to_path_buf());
    Arc::new(DiskStore::open(config).await.unwrap())
}

pub async fn coordinator_with(
    temp_dir: &TempDir,
    fetcher: Arc<dyn Fetcher>,
    memory: MemoryConfig,
    config: CoordinatorConfig,
) -> CacheCoordinator {
    CacheCoordinator::new(
        Arc::new(MemoryStore::new(memory)),
        disk_store(temp_dir).await,
        fetcher,
        config,
    )
}

pub async fn coordinator(temp_dir: &TempDir, fetcher: Arc<dyn Fetcher>) -> CacheCoordinator {
    coordinator_with(
        temp_dir,
        fetcher,
        MemoryConfig::default(),
        CoordinatorConfig::default(),
    )
    .await
}

/// Poll `condition` until it holds, failing the test after five seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
