//! Crash-safe blob store on the local filesystem
//!
//! Each key maps to `<directory>/<md5(key)>.blob`. Writes go to a uniquely
//! named temp file in the same directory, are fsynced, then renamed over the
//! final path, so `get` only ever observes complete blobs.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bytes::Bytes;
use filetime::FileTime;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::app::key::CacheKey;
use crate::constants::disk;
use crate::errors::{CacheError, CacheResult};

use super::config::DiskConfig;

/// A committed blob found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskEntry {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: SystemTime,
}

/// Aggregate usage of the disk tier
#[derive(Debug, Clone, Serialize)]
pub struct DiskStats {
    pub directory: PathBuf,
    pub entries: usize,
    pub total_bytes: u64,
}

/// On-disk tier of the cache
#[derive(Debug)]
pub struct DiskStore {
    config: DiskConfig,
    directory: PathBuf,
}

impl DiskStore {
    /// Open the store, creating its directory if necessary
    ///
    /// # Errors
    ///
    /// Returns `CacheError::DirectoryNotAccessible` if the directory cannot be
    /// resolved or created
    pub async fn open(config: DiskConfig) -> CacheResult<Self> {
        let directory = config.resolve_directory()?;

        fs::create_dir_all(&directory).await.map_err(|e| {
            warn!("Failed to create cache directory {}: {}", directory.display(), e);
            CacheError::DirectoryNotAccessible {
                path: directory.clone(),
            }
        })?;

        info!("Opened disk cache at {}", directory.display());
        Ok(Self { config, directory })
    }

    /// Directory holding the blobs
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Configuration this store was opened with
    pub fn config(&self) -> &DiskConfig {
        &self.config
    }

    /// Final path of the blob for a key
    pub fn blob_path(&self, key: &CacheKey) -> PathBuf {
        self.directory
            .join(format!("{}.{}", key.file_stem(), disk::BLOB_EXTENSION))
    }

    fn temp_path(&self, key: &CacheKey) -> PathBuf {
        self.directory.join(format!(
            "{}.{}.{:016x}{}",
            key.file_stem(),
            disk::BLOB_EXTENSION,
            fastrand::u64(..),
            disk::TEMP_FILE_SUFFIX
        ))
    }

    /// Read the blob for a key
    ///
    /// Returns `Ok(None)` when no blob exists. Any other read failure is an
    /// error, distinct from absence.
    pub async fn get(&self, key: &CacheKey) -> CacheResult<Option<Bytes>> {
        let path = self.blob_path(key);
        match fs::read(&path).await {
            Ok(data) => {
                debug!(key = %key, bytes = data.len(), "Disk hit");
                self.touch(path).await;
                Ok(Some(Bytes::from(data)))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(key = %key, "Disk miss");
                Ok(None)
            }
            Err(e) => Err(CacheError::io(path, e)),
        }
    }

    /// Refresh the mtime so eviction treats the blob as recently used
    async fn touch(&self, path: PathBuf) {
        let result = tokio::task::spawn_blocking(move || {
            filetime::set_file_mtime(&path, FileTime::now())
        })
        .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Could not refresh blob mtime: {}", e),
            Err(e) => debug!("Blob mtime task failed: {}", e),
        }
    }

    /// Write a blob atomically using temp file + rename
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Io` if any step fails; the temp file is removed and
    /// any previously committed blob for the key is left intact.
    pub async fn put(&self, key: &CacheKey, data: &[u8]) -> CacheResult<()> {
        let final_path = self.blob_path(key);
        let temp_path = self.temp_path(key);

        if let Err(e) = Self::write_temp(&temp_path, data).await {
            Self::discard_temp(&temp_path).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&temp_path, &final_path).await {
            Self::discard_temp(&temp_path).await;
            return Err(CacheError::io(&final_path, e));
        }

        debug!(key = %key, bytes = data.len(), path = %final_path.display(), "Stored blob");
        Ok(())
    }

    async fn write_temp(temp_path: &Path, data: &[u8]) -> CacheResult<()> {
        let mut file = fs::File::create(temp_path)
            .await
            .map_err(|e| CacheError::io(temp_path, e))?;
        file.write_all(data)
            .await
            .map_err(|e| CacheError::io(temp_path, e))?;
        file.flush().await.map_err(|e| CacheError::io(temp_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| CacheError::io(temp_path, e))?;
        Ok(())
    }

    async fn discard_temp(temp_path: &Path) {
        if let Err(e) = fs::remove_file(temp_path).await {
            if e.kind() != ErrorKind::NotFound {
                warn!("Failed to remove temp file {}: {}", temp_path.display(), e);
            }
        }
    }

    /// Whether a committed blob exists for the key
    pub async fn contains(&self, key: &CacheKey) -> bool {
        fs::metadata(self.blob_path(key))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Delete the blob for a key, returning whether one existed
    pub async fn remove(&self, key: &CacheKey) -> CacheResult<bool> {
        let path = self.blob_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key = %key, "Removed blob");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(path, e)),
        }
    }

    /// Delete every blob and temp file, returning how many files were removed
    pub async fn clear(&self) -> CacheResult<usize> {
        let mut removed = 0;
        for entry in self.scan(|name| is_blob(name) || is_temp(name)).await? {
            match fs::remove_file(&entry.path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(CacheError::io(entry.path, e)),
            }
        }
        info!("Cleared {} files from {}", removed, self.directory.display());
        Ok(removed)
    }

    /// Remove temp files left behind by interrupted writes
    pub async fn sweep_temp_files(&self) -> CacheResult<usize> {
        let mut removed = 0;
        for entry in self.scan(is_temp).await? {
            if fs::remove_file(&entry.path).await.is_ok() {
                removed += 1;
            }
        }
        if removed > 0 {
            info!("Removed {} orphaned temp files", removed);
        }
        Ok(removed)
    }

    /// All committed blobs, in directory order
    pub async fn entries(&self) -> CacheResult<Vec<DiskEntry>> {
        self.scan(is_blob).await
    }

    /// Count and total size of committed blobs
    pub async fn stats(&self) -> CacheResult<DiskStats> {
        let entries = self.entries().await?;
        Ok(DiskStats {
            directory: self.directory.clone(),
            entries: entries.len(),
            total_bytes: entries.iter().map(|e| e.size_bytes).sum(),
        })
    }

    /// Scan the cache directory in a blocking task
    async fn scan(&self, filter: fn(&str) -> bool) -> CacheResult<Vec<DiskEntry>> {
        let directory = self.directory.clone();
        tokio::task::spawn_blocking(move || scan_directory(&directory, filter))
            .await
            .map_err(|e| {
                CacheError::io(
                    &self.directory,
                    std::io::Error::new(ErrorKind::Other, e.to_string()),
                )
            })?
    }
}

fn is_blob(name: &str) -> bool {
    name.ends_with(&format!(".{}", disk::BLOB_EXTENSION))
}

fn is_temp(name: &str) -> bool {
    name.ends_with(disk::TEMP_FILE_SUFFIX)
}

fn scan_directory(directory: &Path, filter: fn(&str) -> bool) -> CacheResult<Vec<DiskEntry>> {
    let read_dir = std::fs::read_dir(directory).map_err(|e| CacheError::io(directory, e))?;

    let mut entries = Vec::new();
    for entry in read_dir.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !filter(name) {
            continue;
        }
        // Entries can vanish between read_dir and metadata
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        entries.push(DiskEntry {
            path: entry.path(),
            size_bytes: metadata.len(),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        });
    }
    Ok(entries)
}
