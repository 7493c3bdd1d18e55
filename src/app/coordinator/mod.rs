//! Cache coordinator: memory, then disk, then a single shared fetch
//!
//! The coordinator owns the lookup order and the in-flight registry. Concurrent
//! requests for one key share a single fetcher call; a successful fetch warms
//! both tiers before every waiter is resolved with the same bytes.
//!
//! # Key Features
//!
//! - **Deduplication**: at most one fetcher call per key at any time
//! - **Soft tier failures**: disk read errors count as misses and disk write
//!   errors never fail a request
//! - **Per-caller cancellation**: dropping a handle detaches only that caller
//!
//! # Module Organization
//!
//! - [`config`] - coordinator settings
//! - [`inflight`] - the registry of running fetches
//! - [`stats`] - request and tier counters

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

use crate::app::disk::DiskStore;
use crate::app::fetcher::Fetcher;
use crate::app::key::CacheKey;
use crate::app::memory::MemoryStore;
use crate::app::request::{RequestHandle, RequestState};
use crate::errors::{CacheResult, FetchError};

pub mod config;
pub mod inflight;
pub mod stats;

pub use config::CoordinatorConfig;
pub use inflight::InFlightRegistry;
pub use stats::CacheStats;

use inflight::Join;
use stats::{StatEvent, StatsCounters};

/// Two-tier cache with request deduplication
///
/// Cheap to clone; clones share stores, registry and counters.
#[derive(Clone)]
pub struct CacheCoordinator {
    shared: Arc<Shared>,
}

struct Shared {
    memory: Arc<MemoryStore>,
    disk: Arc<DiskStore>,
    fetcher: Arc<dyn Fetcher>,
    registry: Arc<InFlightRegistry>,
    stats: Arc<StatsCounters>,
    config: CoordinatorConfig,
}

impl std::fmt::Debug for CacheCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheCoordinator")
            .field("memory_entries", &self.shared.memory.len())
            .field("disk_directory", &self.shared.disk.directory())
            .field("in_flight", &self.shared.registry.len())
            .field("config", &self.shared.config)
            .finish()
    }
}

impl CacheCoordinator {
    /// Create a coordinator over the given tiers and fetcher
    pub fn new(
        memory: Arc<MemoryStore>,
        disk: Arc<DiskStore>,
        fetcher: Arc<dyn Fetcher>,
        config: CoordinatorConfig,
    ) -> Self {
        let registry = Arc::new(InFlightRegistry::new(config.abort_orphaned_fetches));
        Self {
            shared: Arc::new(Shared {
                memory,
                disk,
                fetcher,
                registry,
                stats: Arc::new(StatsCounters::default()),
                config,
            }),
        }
    }

    /// Memory tier
    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.shared.memory
    }

    /// Disk tier
    pub fn disk(&self) -> &Arc<DiskStore> {
        &self.shared.disk
    }

    /// In-flight registry
    pub fn registry(&self) -> &Arc<InFlightRegistry> {
        &self.shared.registry
    }

    /// Coordinator settings
    pub fn config(&self) -> &CoordinatorConfig {
        &self.shared.config
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> CacheStats {
        self.shared.stats.snapshot()
    }

    /// Start resolving `key`, fetching from `locator` on a miss in both tiers
    ///
    /// A memory hit resolves before this returns. Otherwise resolution runs on
    /// a spawned task, so this must be called from within a tokio runtime.
    pub fn request(&self, key: CacheKey, locator: Url) -> RequestHandle {
        let stats = &self.shared.stats;
        stats.record(StatEvent::Request);

        let (sender, receiver) = watch::channel(RequestState::Loading);

        if let Some(bytes) = self.shared.memory.get(&key) {
            stats.record(StatEvent::MemoryHit);
            sender.send_replace(RequestState::Success(bytes));
            return RequestHandle::new(key, locator, receiver, None, Arc::clone(stats));
        }

        let shared = Arc::clone(&self.shared);
        let task_key = key.clone();
        let task_locator = locator.clone();
        let task = tokio::spawn(async move {
            let state = shared.resolve(task_key, task_locator).await;
            sender.send_replace(state);
        });

        RequestHandle::new(
            key,
            locator,
            receiver,
            Some(task.abort_handle()),
            Arc::clone(stats),
        )
    }

    /// Remove `key` from both tiers
    ///
    /// Returns whether either tier held it. A fetch already in flight for the
    /// key is not affected.
    pub async fn invalidate(&self, key: &CacheKey) -> CacheResult<bool> {
        let in_memory = self.shared.memory.remove(key);
        let on_disk = self.shared.disk.remove(key).await?;
        debug!(key = %key, in_memory, on_disk, "Invalidated key");
        Ok(in_memory || on_disk)
    }

    /// Empty both tiers, returning the number of disk files removed
    pub async fn clear(&self) -> CacheResult<usize> {
        self.shared.memory.clear();
        self.shared.disk.clear().await
    }

    /// Abort every in-flight fetch and refuse new ones
    ///
    /// Waiters of aborted fetches resolve to `Failed(Interrupted)`. Requests
    /// issued afterwards are still served from the tiers.
    pub fn shutdown(&self) -> usize {
        let aborted = self.shared.registry.close();
        info!(aborted, "Cache coordinator shut down");
        aborted
    }
}

impl Shared {
    /// Disk lookup, then join or start the shared fetch
    async fn resolve(self: Arc<Self>, key: CacheKey, locator: Url) -> RequestState {
        match self.disk.get(&key).await {
            Ok(Some(bytes)) => {
                self.stats.record(StatEvent::DiskHit);
                debug!(key = %key, bytes = bytes.len(), "Disk hit, promoting to memory");
                self.promote(&key, bytes.clone());
                return RequestState::Success(bytes);
            }
            Ok(None) => {}
            Err(e) => {
                self.stats.record(StatEvent::DiskReadError);
                warn!(key = %key, error = %e, "Disk read failed, treating as miss");
            }
        }

        let mut waiter = match self.registry.join_or_start(&key, &self.memory) {
            Join::Cached(bytes) => {
                self.stats.record(StatEvent::MemoryHit);
                return RequestState::Success(bytes);
            }
            Join::Joined(waiter) => {
                self.stats.record(StatEvent::Coalesced);
                waiter
            }
            Join::Started { generation, waiter } => {
                let task = tokio::spawn(Arc::clone(&self).fetch(
                    key.clone(),
                    locator.clone(),
                    generation,
                ));
                self.registry.attach(&key, generation, task.abort_handle());
                waiter
            }
            Join::Closed => {
                return RequestState::Failed(FetchError::Interrupted {
                    url: locator.to_string(),
                });
            }
        };

        match waiter.outcome(&locator).await {
            Ok(bytes) => RequestState::Success(bytes),
            Err(error) => RequestState::Failed(error),
        }
    }

    /// The single fetch for one in-flight record
    ///
    /// The disk is consulted once more first: a blob committed by the previous
    /// record after this caller's lookup missed makes the network unnecessary.
    async fn fetch(self: Arc<Self>, key: CacheKey, locator: Url, generation: u64) {
        let mut guard = FetchGuard {
            registry: Arc::clone(&self.registry),
            key: key.clone(),
            generation,
            armed: true,
        };

        if let Ok(Some(bytes)) = self.disk.get(&key).await {
            self.stats.record(StatEvent::DiskHit);
            debug!(key = %key, generation, "Blob appeared on disk, skipping fetch");
            self.promote(&key, bytes.clone());
            let notified = self.registry.complete(&key, generation, Ok(bytes));
            guard.armed = false;
            debug!(key = %key, notified, "Resolved from disk");
            return;
        }

        self.stats.record(StatEvent::FetchStarted);
        debug!(key = %key, url = %locator, generation, "Fetching");
        let outcome = self.fetcher.fetch(&locator).await;

        match &outcome {
            Ok(bytes) => {
                if let Err(e) = self.disk.put(&key, bytes).await {
                    self.stats.record(StatEvent::DiskWriteFailure);
                    warn!(key = %key, error = %e, "Disk write failed, serving from memory only");
                }
                self.promote(&key, bytes.clone());
            }
            Err(e) => {
                self.stats.record(StatEvent::FetchFailure);
                warn!(key = %key, url = %locator, kind = e.kind(), "Fetch failed: {}", e);
            }
        }

        let notified = self.registry.complete(&key, generation, outcome);
        guard.armed = false;
        debug!(key = %key, notified, "Fetch completed");
    }

    fn promote(&self, key: &CacheKey, bytes: Bytes) {
        match self.memory.put(key.clone(), bytes) {
            Ok(evicted) if evicted > 0 => {
                debug!(key = %key, evicted, "Memory tier evicted entries");
            }
            Ok(_) => {}
            Err(e) if e.is_soft() => self.stats.record(StatEvent::CapacityRejection),
            Err(e) => warn!(key = %key, error = %e, "Memory insert failed"),
        }
    }
}

/// Removes the record if the fetch task ends without publishing
struct FetchGuard {
    registry: Arc<InFlightRegistry>,
    key: CacheKey,
    generation: u64,
    armed: bool,
}

impl Drop for FetchGuard {
    fn drop(&mut self) {
        if self.armed && self.registry.abandon(&self.key, self.generation) {
            debug!(key = %self.key, generation = self.generation, "Fetch ended without a result");
        }
    }
}
