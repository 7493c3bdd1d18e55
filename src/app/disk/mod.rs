//! On-disk tier
//!
//! Persists byte blobs under hashed filenames in a dedicated directory.
//!
//! # Key Features
//!
//! - **Hashed filenames**: `md5(key).blob`, deterministic and filesystem-safe
//! - **Atomic writes**: temp file + fsync + rename, partial writes are never read
//! - **Out-of-band eviction**: oldest-by-mtime when `max_bytes`/`max_entries` is exceeded
//!
//! # Module Organization
//!
//! - [`config`] - directory and capacity settings
//! - [`store`] - the blob store
//! - [`eviction`] - eviction pass and its background task

pub mod config;
pub mod eviction;
pub mod store;

pub use config::DiskConfig;
pub use eviction::{enforce_limits, run_eviction_task, EvictionReport};
pub use store::{DiskEntry, DiskStats, DiskStore};
