//! Core cache components
//!
//! Leaves first: the memory and disk tiers and the fetcher know nothing about
//! each other; the coordinator orders lookups across them and deduplicates
//! fetches; the service wires everything from configuration.
//!
//! # Examples
//!
//! ```rust,no_run
//! use resource_cache::app::{RequestState, ResourceCache};
//! use resource_cache::config::AppConfig;
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = ResourceCache::initialize(AppConfig::default()).await?;
//! let url = Url::parse("https://example.com/burger-banner.png")?;
//!
//! match cache.load_item("burger-banner", &url).wait().await {
//!     RequestState::Success(bytes) => println!("{} bytes", bytes.len()),
//!     RequestState::Failed(e) => eprintln!("failed: {}", e),
//!     RequestState::Loading => unreachable!(),
//! }
//!
//! cache.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod disk;
pub mod fetcher;
pub mod key;
pub mod memory;
pub mod request;
pub mod service;
pub mod signals;

// Re-export main public API
pub use coordinator::{CacheCoordinator, CacheStats, CoordinatorConfig, InFlightRegistry};
pub use disk::{enforce_limits, DiskConfig, DiskEntry, DiskStats, DiskStore, EvictionReport};
pub use fetcher::{Fetcher, FetcherConfig, HttpFetcher};
pub use key::CacheKey;
pub use memory::{CacheEntry, MemoryConfig, MemoryStore};
pub use request::{RequestHandle, RequestState, Subscription};
pub use service::ResourceCache;
pub use signals::{create_shutdown_channel, SignalHandler};
