//! Cache statistics tracking
//!
//! Counters are plain atomics bumped from the request path; [`CacheStats`] is
//! the serializable snapshot handed to callers and the CLI.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time view of the coordinator counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Requests issued
    pub requests: u64,
    /// Requests answered from memory (including the re-check under the registry lock)
    pub memory_hits: u64,
    /// Requests answered from disk
    pub disk_hits: u64,
    /// Disk reads that failed and fell through to the network
    pub disk_read_errors: u64,
    /// Fetcher invocations
    pub fetches_started: u64,
    /// Requests that joined a fetch already in flight
    pub coalesced: u64,
    /// Fetches that ended in an error
    pub fetch_failures: u64,
    /// Disk writes that failed after a successful fetch
    pub disk_write_failures: u64,
    /// Payloads the memory tier refused as too large
    pub capacity_rejections: u64,
    /// Requests cancelled before reaching a terminal state
    pub cancelled: u64,
    /// When this snapshot was taken
    pub captured_at: DateTime<Utc>,
}

impl CacheStats {
    /// Share of requests served without a fetch of their own
    pub fn hit_ratio(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        (self.memory_hits + self.disk_hits) as f64 / self.requests as f64
    }
}

/// Events counted by the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatEvent {
    Request,
    MemoryHit,
    DiskHit,
    DiskReadError,
    FetchStarted,
    Coalesced,
    FetchFailure,
    DiskWriteFailure,
    CapacityRejection,
    Cancelled,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    requests: AtomicU64,
    memory_hits: AtomicU64,
    disk_hits: AtomicU64,
    disk_read_errors: AtomicU64,
    fetches_started: AtomicU64,
    coalesced: AtomicU64,
    fetch_failures: AtomicU64,
    disk_write_failures: AtomicU64,
    capacity_rejections: AtomicU64,
    cancelled: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record(&self, event: StatEvent) {
        let counter = match event {
            StatEvent::Request => &self.requests,
            StatEvent::MemoryHit => &self.memory_hits,
            StatEvent::DiskHit => &self.disk_hits,
            StatEvent::DiskReadError => &self.disk_read_errors,
            StatEvent::FetchStarted => &self.fetches_started,
            StatEvent::Coalesced => &self.coalesced,
            StatEvent::FetchFailure => &self.fetch_failures,
            StatEvent::DiskWriteFailure => &self.disk_write_failures,
            StatEvent::CapacityRejection => &self.capacity_rejections,
            StatEvent::Cancelled => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CacheStats {
            requests: load(&self.requests),
            memory_hits: load(&self.memory_hits),
            disk_hits: load(&self.disk_hits),
            disk_read_errors: load(&self.disk_read_errors),
            fetches_started: load(&self.fetches_started),
            coalesced: load(&self.coalesced),
            fetch_failures: load(&self.fetch_failures),
            disk_write_failures: load(&self.disk_write_failures),
            capacity_rejections: load(&self.capacity_rejections),
            cancelled: load(&self.cancelled),
            captured_at: Utc::now(),
        }
    }
}
