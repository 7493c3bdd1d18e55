//! Out-of-band disk eviction
//!
//! Approximates LRU with file modification time: reads refresh the mtime, and
//! when the store exceeds `max_bytes` or `max_entries` the oldest blobs are
//! deleted until both limits hold again. Runs on demand or from a periodic
//! background task, never inside a request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::errors::CacheResult;

use super::store::DiskStore;

/// Result of one eviction pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvictionReport {
    /// Number of blobs deleted
    pub files_deleted: usize,
    /// Total bytes freed
    pub bytes_freed: u64,
    /// Store size before the pass
    pub size_before: u64,
    /// Store size after the pass
    pub size_after: u64,
    /// Duration of the pass in milliseconds
    pub duration_ms: u64,
}

impl EvictionReport {
    /// Whether the pass removed anything
    pub fn evicted_anything(&self) -> bool {
        self.files_deleted > 0
    }
}

/// Delete oldest-by-mtime blobs until the configured limits hold
pub async fn enforce_limits(store: &DiskStore) -> CacheResult<EvictionReport> {
    let start = Instant::now();
    let config = store.config();

    let mut entries = store.entries().await?;
    let size_before: u64 = entries.iter().map(|e| e.size_bytes).sum();

    let mut report = EvictionReport {
        size_before,
        size_after: size_before,
        ..Default::default()
    };

    if !config.has_limits() {
        return Ok(report);
    }

    // Oldest first; path breaks ties so passes are deterministic
    entries.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));

    let mut remaining_count = entries.len();
    let mut remaining_bytes = size_before;
    let over = |count: usize, bytes: u64| {
        (config.max_entries > 0 && count > config.max_entries)
            || (config.max_bytes > 0 && bytes > config.max_bytes)
    };

    for entry in entries {
        if !over(remaining_count, remaining_bytes) {
            break;
        }
        match tokio::fs::remove_file(&entry.path).await {
            Ok(()) => {
                remaining_count -= 1;
                remaining_bytes -= entry.size_bytes;
                report.files_deleted += 1;
                report.bytes_freed += entry.size_bytes;
                debug!(path = %entry.path.display(), bytes = entry.size_bytes, "Evicted blob");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                remaining_count -= 1;
                remaining_bytes -= entry.size_bytes;
            }
            Err(e) => {
                warn!("Failed to evict {}: {}", entry.path.display(), e);
            }
        }
    }

    report.size_after = remaining_bytes;
    report.duration_ms = start.elapsed().as_millis() as u64;
    Ok(report)
}

fn log_report(report: &EvictionReport) {
    if report.evicted_anything() {
        info!(
            files_deleted = report.files_deleted,
            bytes_freed = report.bytes_freed,
            size_before = report.size_before,
            size_after = report.size_after,
            duration_ms = report.duration_ms,
            "Disk cache eviction completed"
        );
    } else {
        debug!(size_bytes = report.size_before, "Disk cache within limits");
    }
}

/// Run eviction passes every `interval` until shutdown is broadcast
pub async fn run_eviction_task(
    store: Arc<DiskStore>,
    interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    info!(
        directory = %store.directory().display(),
        interval_secs = interval.as_secs(),
        "Starting disk eviction task"
    );

    loop {
        match enforce_limits(&store).await {
            Ok(report) => log_report(&report),
            Err(e) => warn!("Disk eviction pass failed: {}", e),
        }

        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Disk eviction task shutting down");
                break;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
