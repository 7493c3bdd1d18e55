//! Integration tests for the process-wide cache service
//!
//! Covers startup housekeeping, the maintenance operations and an end-to-end
//! run against a mock HTTP server.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{locator, StubFetcher};
use resource_cache::app::{CacheKey, DiskConfig, RequestState, ResourceCache};
use resource_cache::config::AppConfig;
use resource_cache::errors::FetchError;

fn config_for(temp_dir: &TempDir) -> AppConfig {
    AppConfig::default().with_cache_dir(temp_dir.path().to_path_buf())
}

#[tokio::test]
async fn test_startup_sweeps_temp_files() {
    let temp_dir = TempDir::new().unwrap();
    let leftover = temp_dir.path().join("0123abcd.blob.00000000deadbeef.tmp");
    std::fs::write(&leftover, b"half written").unwrap();

    let cache = assert_ok!(
        ResourceCache::with_fetcher(config_for(&temp_dir), StubFetcher::ok(b"x".to_vec())).await
    );

    assert!(!leftover.exists());
    assert_eq!(cache.disk_stats().await.unwrap().entries, 0);
    cache.shutdown().await;
}

#[tokio::test]
async fn test_load_item_derives_key_from_name() {
    let temp_dir = TempDir::new().unwrap();
    let fetcher = StubFetcher::ok(vec![9u8; 64]);
    let cache = ResourceCache::with_fetcher(config_for(&temp_dir), fetcher.clone())
        .await
        .unwrap();

    let named = cache.load_item("burger-banner", &locator());
    assert_eq!(named.key(), &CacheKey::new("burger-banner"));
    assert!(named.wait().await.bytes().is_some());

    // Same name, same entry: served without another fetch
    let again = cache.load(CacheKey::new("burger-banner"), locator());
    assert!(again.state().is_terminal());
    assert_eq!(fetcher.calls(), 1);

    let unnamed = cache.load_item("  ", &locator());
    assert_eq!(unnamed.key().as_str(), locator().as_str());

    cache.shutdown().await;
}

#[tokio::test]
async fn test_invalidate_and_clear() {
    let temp_dir = TempDir::new().unwrap();
    let fetcher = StubFetcher::ok(b"body".to_vec());
    let cache = ResourceCache::with_fetcher(config_for(&temp_dir), fetcher.clone())
        .await
        .unwrap();

    for name in ["a", "b", "c"] {
        cache.load(CacheKey::new(name), locator()).wait().await;
    }
    assert_eq!(cache.disk_stats().await.unwrap().entries, 3);

    assert!(assert_ok!(cache.invalidate(&CacheKey::new("a")).await));
    assert!(!assert_ok!(cache.invalidate(&CacheKey::new("a")).await));

    // Invalidated keys are fetched again
    cache.load(CacheKey::new("a"), locator()).wait().await;
    assert_eq!(fetcher.calls(), 4);

    assert_eq!(assert_ok!(cache.clear().await), 3);
    assert_eq!(cache.disk_stats().await.unwrap().entries, 0);
    assert!(!cache.coordinator().memory().contains(&CacheKey::new("b")));

    cache.shutdown().await;
}

#[tokio::test]
async fn test_evict_now_enforces_entry_limit() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = config_for(&temp_dir);
    config.disk = DiskConfig::with_directory(temp_dir.path().to_path_buf())
        .with_max_entries(2)
        .with_eviction_interval(None);

    let cache = ResourceCache::with_fetcher(config, StubFetcher::ok(vec![0u8; 100]))
        .await
        .unwrap();

    for name in ["one", "two", "three", "four"] {
        cache.load(CacheKey::new(name), locator()).wait().await;
    }

    let report = assert_ok!(cache.evict_now().await);
    assert_eq!(report.files_deleted, 2);
    assert_eq!(report.bytes_freed, 200);
    assert_eq!(cache.disk_stats().await.unwrap().entries, 2);

    cache.shutdown().await;
}

#[tokio::test]
async fn test_background_eviction_runs() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = config_for(&temp_dir);
    config.disk = DiskConfig::with_directory(temp_dir.path().to_path_buf())
        .with_max_entries(1)
        .with_eviction_interval(Some(Duration::from_millis(20)));

    let cache = ResourceCache::with_fetcher(config, StubFetcher::ok(b"tiny".to_vec()))
        .await
        .unwrap();

    for name in ["first", "second", "third"] {
        cache.load(CacheKey::new(name), locator()).wait().await;
    }

    let mut entries = usize::MAX;
    for _ in 0..100 {
        entries = cache.disk_stats().await.unwrap().entries;
        if entries <= 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(entries, 1);

    cache.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let cache = ResourceCache::with_fetcher(config_for(&temp_dir), StubFetcher::ok(b"x".to_vec()))
        .await
        .unwrap();

    cache.shutdown().await;
    cache.shutdown().await;

    let state = cache.load(CacheKey::new("late"), locator()).wait().await;
    assert_eq!(
        state,
        RequestState::Failed(FetchError::Interrupted {
            url: locator().to_string()
        })
    );
}

#[tokio::test]
async fn test_initialize_rejects_invalid_config() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = config_for(&temp_dir);
    config.logging.level = "loud".to_string();

    assert_err!(ResourceCache::initialize(config).await);
}

#[tokio::test]
async fn test_end_to_end_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/burger-banner.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xCD; 2048]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let cache = Arc::new(
        ResourceCache::initialize(config_for(&temp_dir))
            .await
            .unwrap(),
    );
    let banner = Url::parse(&format!("{}/burger-banner.png", server.uri())).unwrap();
    let missing = Url::parse(&format!("{}/missing.png", server.uri())).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| cache.load_item("burger-banner", &banner))
        .collect();
    for handle in &handles {
        assert_eq!(handle.wait().await.bytes().unwrap().len(), 2048);
    }
    assert!(cache.disk().contains(&CacheKey::new("burger-banner")).await);

    let state = cache.load_item("missing", &missing).wait().await;
    assert_eq!(
        state,
        RequestState::Failed(FetchError::NotFound {
            url: missing.to_string()
        })
    );
    assert!(!cache.disk().contains(&CacheKey::new("missing")).await);

    cache.shutdown().await;
}

#[tokio::test]
async fn test_global_instance() {
    let temp_dir = TempDir::new().unwrap();
    let cache = ResourceCache::with_fetcher(config_for(&temp_dir), StubFetcher::ok(b"g".to_vec()))
        .await
        .unwrap();

    let installed = assert_ok!(ResourceCache::install_global(cache));
    assert!(std::ptr::eq(installed, ResourceCache::global().unwrap()));

    let second = ResourceCache::with_fetcher(config_for(&temp_dir), StubFetcher::ok(b"g".to_vec()))
        .await
        .unwrap();
    assert_err!(ResourceCache::install_global(second));

    installed.shutdown().await;
}
