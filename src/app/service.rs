//! Process-wide entry point to the cache
//!
//! [`ResourceCache`] wires the tiers, the fetcher and the coordinator together
//! from an [`AppConfig`], runs startup housekeeping and owns the background
//! eviction task. One instance can be installed globally so every caller in
//! the process shares the same in-flight registry.

use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::app::coordinator::{CacheCoordinator, CacheStats};
use crate::app::disk::{enforce_limits, run_eviction_task, DiskStats, DiskStore, EvictionReport};
use crate::app::fetcher::{Fetcher, HttpFetcher};
use crate::app::key::CacheKey;
use crate::app::memory::MemoryStore;
use crate::app::request::RequestHandle;
use crate::app::signals::create_shutdown_channel;
use crate::config::AppConfig;
use crate::errors::{AppError, CacheResult, Result};

static GLOBAL: OnceLock<ResourceCache> = OnceLock::new();

/// Keyed async resource cache
#[derive(Debug)]
pub struct ResourceCache {
    coordinator: CacheCoordinator,
    config: AppConfig,
    shutdown_tx: broadcast::Sender<()>,
    eviction_task: Mutex<Option<JoinHandle<()>>>,
}

impl ResourceCache {
    /// Build the cache with the HTTP fetcher described by `config`
    pub async fn initialize(config: AppConfig) -> Result<Self> {
        config.validate()?;
        let fetcher = Arc::new(HttpFetcher::new(config.fetcher.clone())?);
        Self::with_fetcher(config, fetcher).await
    }

    /// Build the cache around a caller-supplied fetcher
    ///
    /// Opens the disk directory, removes temp files left by interrupted writes
    /// and starts the eviction task when the disk tier has limits and an
    /// interval.
    pub async fn with_fetcher(config: AppConfig, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        let memory = Arc::new(MemoryStore::new(config.memory.clone()));
        let disk = Arc::new(DiskStore::open(config.disk.clone()).await?);

        match disk.sweep_temp_files().await {
            Ok(0) => {}
            Ok(removed) => info!(removed, "Removed temp files from interrupted writes"),
            Err(e) => warn!("Failed to sweep temp files: {}", e),
        }

        let coordinator = CacheCoordinator::new(
            memory,
            Arc::clone(&disk),
            fetcher,
            config.coordinator.clone(),
        );

        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let eviction_task = Self::eviction_interval(&config).map(|interval| {
            tokio::spawn(run_eviction_task(Arc::clone(&disk), interval, shutdown_rx))
        });

        info!(
            directory = %disk.directory().display(),
            memory_entries = config.memory.max_entries,
            background_eviction = eviction_task.is_some(),
            "Resource cache initialized"
        );

        Ok(Self {
            coordinator,
            config,
            shutdown_tx,
            eviction_task: Mutex::new(eviction_task),
        })
    }

    fn eviction_interval(config: &AppConfig) -> Option<Duration> {
        config
            .disk
            .eviction_interval
            .filter(|interval| !interval.is_zero())
            .filter(|_| config.disk.has_limits())
    }

    /// Install `cache` as the process-wide instance
    ///
    /// # Errors
    ///
    /// Fails if an instance was already installed.
    pub fn install_global(cache: ResourceCache) -> Result<&'static ResourceCache> {
        GLOBAL
            .set(cache)
            .map_err(|_| AppError::generic("Resource cache is already initialized"))?;
        GLOBAL
            .get()
            .ok_or_else(|| AppError::generic("Resource cache is not initialized"))
    }

    /// The process-wide instance, if one was installed
    pub fn global() -> Option<&'static ResourceCache> {
        GLOBAL.get()
    }

    /// Request `key`, fetching from `locator` on a miss
    pub fn load(&self, key: CacheKey, locator: Url) -> RequestHandle {
        self.coordinator.request(key, locator)
    }

    /// Request a named item; the key is derived from the name and URL
    pub fn load_item(&self, name: &str, url: &Url) -> RequestHandle {
        self.load(CacheKey::derive(name, url.as_str()), url.clone())
    }

    /// Remove `key` from both tiers
    pub async fn invalidate(&self, key: &CacheKey) -> CacheResult<bool> {
        self.coordinator.invalidate(key).await
    }

    /// Request and tier counters
    pub fn stats(&self) -> CacheStats {
        self.coordinator.stats()
    }

    /// Blob count and size of the disk tier
    pub async fn disk_stats(&self) -> CacheResult<DiskStats> {
        self.coordinator.disk().stats().await
    }

    /// Empty both tiers
    pub async fn clear(&self) -> CacheResult<usize> {
        self.coordinator.clear().await
    }

    /// Run one disk eviction pass now
    pub async fn evict_now(&self) -> CacheResult<EvictionReport> {
        enforce_limits(self.disk()).await
    }

    /// Underlying coordinator
    pub fn coordinator(&self) -> &CacheCoordinator {
        &self.coordinator
    }

    /// Disk tier
    pub fn disk(&self) -> &DiskStore {
        self.coordinator.disk()
    }

    /// Configuration the cache was built from
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Stop background work and abort in-flight fetches
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        self.coordinator.shutdown();

        let task = self
            .eviction_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        if let Some(task) = task {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!("Eviction task ended abnormally: {}", e);
                }
            }
            debug!("Eviction task stopped");
        }
    }
}
