//! In-memory tier
//!
//! A bounded, synchronous key -> bytes map with least-recently-used eviction.
//! Entries are owned by this tier only; evicting here never touches disk.
//!
//! - [`config`] - capacity bounds
//! - [`store`] - the LRU store itself

pub mod config;
pub mod store;

pub use config::MemoryConfig;
pub use store::{CacheEntry, MemoryStore};
