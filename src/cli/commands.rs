//! Command handlers for the resource cache CLI

use std::path::PathBuf;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info};

use crate::app::{
    create_shutdown_channel, enforce_limits, DiskStore, RequestState, ResourceCache, SignalHandler,
};
use crate::cli::args::{CacheAction, CacheArgs, ConfigAction, ConfigArgs, FetchArgs};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};

/// Fetch one resource through the cache
pub async fn handle_fetch(args: FetchArgs, config: AppConfig) -> Result<()> {
    let key = args.cache_key();
    info!(key = %key, url = %args.url, "Fetching resource");

    let cache = ResourceCache::install_global(ResourceCache::initialize(config).await?)?;
    let handle = cache.load(key.clone(), args.url.clone());

    let spinner = new_spinner(format!("Loading {}...", args.url));

    let (shutdown_tx, mut shutdown_rx) = create_shutdown_channel();
    let signals = SignalHandler::new(shutdown_tx).setup();

    let state = tokio::select! {
        state = handle.wait() => Some(state),
        _ = shutdown_rx.recv() => None,
    };
    spinner.finish_and_clear();
    signals.abort();

    let Some(state) = state else {
        handle.cancel();
        cache.shutdown().await;
        return Err(AppError::generic("Interrupted"));
    };

    let result = match state {
        RequestState::Success(bytes) => {
            match &args.output {
                Some(path) => {
                    tokio::fs::write(path, &bytes).await?;
                    println!("✅ Wrote {} to {}", format_size(bytes.len() as u64), path.display());
                }
                None => {
                    println!("✅ {}: {}", key, format_size(bytes.len() as u64));
                    println!("   Cached at: {}", cache.disk().blob_path(&key).display());
                }
            }
            Ok(())
        }
        RequestState::Failed(e) => Err(AppError::Fetch(e)),
        RequestState::Loading => Err(AppError::generic("Request ended without a result")),
    };

    debug!(stats = ?cache.stats(), "Fetch finished");
    cache.shutdown().await;
    result
}

/// Handle cache management commands
pub async fn handle_cache(args: CacheArgs, config: AppConfig) -> Result<()> {
    let store = DiskStore::open(config.disk.clone()).await?;

    match args.action {
        CacheAction::Info { json } => handle_cache_info(&store, json).await,
        CacheAction::Clear => {
            let removed = store.clear().await?;
            println!("🧹 Removed {} cached files from {}", removed, store.directory().display());
            Ok(())
        }
        CacheAction::Evict => {
            let report = enforce_limits(&store).await?;
            if report.evicted_anything() {
                println!(
                    "🗑️  Evicted {} files, freed {} ({} -> {})",
                    report.files_deleted,
                    format_size(report.bytes_freed),
                    format_size(report.size_before),
                    format_size(report.size_after)
                );
            } else {
                println!("ℹ️  Cache is within its limits ({})", format_size(report.size_after));
            }
            Ok(())
        }
        CacheAction::Remove { key } => {
            if store.remove(&key).await? {
                println!("🗑️  Removed {}", key);
            } else {
                println!("ℹ️  {} is not cached", key);
            }
            Ok(())
        }
    }
}

/// Serializable summary for `cache info --json`
#[derive(Debug, Serialize)]
struct CacheInfo {
    directory: PathBuf,
    entries: usize,
    total_bytes: u64,
    max_bytes: u64,
    max_entries: usize,
}

async fn handle_cache_info(store: &DiskStore, json: bool) -> Result<()> {
    let stats = store.stats().await?;
    let config = store.config();

    if json {
        let info = CacheInfo {
            directory: stats.directory,
            entries: stats.entries,
            total_bytes: stats.total_bytes,
            max_bytes: config.max_bytes,
            max_entries: config.max_entries,
        };
        let rendered = serde_json::to_string_pretty(&info)
            .map_err(|e| AppError::generic(format!("Failed to render cache info: {}", e)))?;
        println!("{}", rendered);
        return Ok(());
    }

    println!("💾 Cache Information");
    println!("===================");
    println!("Location: {}", stats.directory.display());
    println!("Cached files: {}", stats.entries);
    println!("Cache size: {}", format_size(stats.total_bytes));
    println!("Size limit: {}", format_limit(config.max_bytes, format_size));
    println!("File limit: {}", format_limit(config.max_entries as u64, |n| n.to_string()));

    Ok(())
}

/// Handle configuration commands
pub async fn handle_config(
    args: ConfigArgs,
    config: AppConfig,
    config_path: Option<PathBuf>,
) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => AppConfig::default_config_path()?,
            };
            AppConfig::write_default(&path, force).await?;
            println!("📁 Created default configuration file:");
            println!("   {}", path.display());
            Ok(())
        }
    }
}

fn new_spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["◐", "◓", "◑", "◒"]);
    spinner.set_style(style);
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

fn format_limit(value: u64, render: impl Fn(u64) -> String) -> String {
    if value == 0 {
        "unlimited".to_string()
    } else {
        render(value)
    }
}

/// Human-readable byte size
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{CacheKey, DiskConfig};
    use tempfile::TempDir;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024 + 512 * 1024), "5.5 MB");
    }

    #[test]
    fn test_format_limit() {
        assert_eq!(format_limit(0, format_size), "unlimited");
        assert_eq!(format_limit(3, |n| n.to_string()), "3");
    }

    fn config_for(temp_dir: &TempDir) -> AppConfig {
        AppConfig::default().with_cache_dir(temp_dir.path().to_path_buf())
    }

    #[tokio::test]
    async fn test_cache_remove_and_clear() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_for(&temp_dir);
        let store = DiskStore::open(DiskConfig::with_directory(temp_dir.path().to_path_buf()))
            .await
            .unwrap();
        store.put(&CacheKey::new("a"), b"aaa").await.unwrap();
        store.put(&CacheKey::new("b"), b"bbb").await.unwrap();

        handle_cache(
            CacheArgs {
                action: CacheAction::Remove {
                    key: CacheKey::new("a"),
                },
            },
            config.clone(),
        )
        .await
        .unwrap();
        assert!(!store.contains(&CacheKey::new("a")).await);

        handle_cache(CacheArgs { action: CacheAction::Clear }, config)
            .await
            .unwrap();
        assert_eq!(store.stats().await.unwrap().entries, 0);
    }

    #[tokio::test]
    async fn test_config_init_writes_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        handle_config(
            ConfigArgs {
                action: ConfigAction::Init { force: false },
            },
            AppConfig::default(),
            Some(path.clone()),
        )
        .await
        .unwrap();

        assert!(path.exists());
    }
}
