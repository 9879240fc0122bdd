//! # File Store
//!
//! Persistent content store. Every entry is a single file in a flat directory,
//! named by the lowercase hex digest of its key.
//!
//! New entries are staged in a temporary file and hard-linked into place.
//! Linking never replaces an existing file, so when two writers race on an
//! absent key the loser sees `AlreadyExists` and its content is dropped. The
//! existence check before staging is still not atomic with the link: both
//! writers may fetch and stage, only one entry survives.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::{self, AsyncWriteExt};
use tracing::{debug, warn};

use crate::cache::types::{CacheKey, CacheResult, PutOutcome};

use super::ContentStore;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    initialized: Arc<AtomicBool>,
}

impl FileStore {
    /// Create a file store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            initialized: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the store directory if it does not exist yet
    pub async fn ensure_initialized(&self) -> io::Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }

        fs::create_dir_all(&self.root).await?;
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    /// Path of the entry for `key`
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.digest())
    }

    fn staging_path_for(&self, key: &CacheKey) -> PathBuf {
        let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.root.join(format!(
            ".{}.{}.{seq}.tmp",
            key.digest(),
            std::process::id()
        ))
    }
}

async fn write_new_file(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o664);

    let mut file = options.open(path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    Ok(())
}

#[async_trait]
impl ContentStore for FileStore {
    async fn contains(&self, key: &CacheKey) -> CacheResult<bool> {
        fs::try_exists(self.path_for(key)).await
    }

    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Bytes>> {
        let path = self.path_for(key);

        match fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                warn!(path = ?path, error = %e, "Failed to read cache entry");
                Err(e)
            }
        }
    }

    async fn put(&self, key: &CacheKey, data: Bytes) -> CacheResult<PutOutcome> {
        self.ensure_initialized().await?;

        let path = self.path_for(key);
        if fs::try_exists(&path).await? {
            debug!(key = %key, "Cache entry already present, keeping existing content");
            return Ok(PutOutcome::AlreadyPresent);
        }

        let staging = self.staging_path_for(key);
        if let Err(e) = write_new_file(&staging, &data).await {
            warn!(path = ?staging, error = %e, "Failed to write staging file");
            let _ = fs::remove_file(&staging).await;
            return Err(e);
        }

        let linked = fs::hard_link(&staging, &path).await;
        let _ = fs::remove_file(&staging).await;

        match linked {
            Ok(()) => {
                debug!(key = %key, size = data.len(), "Stored cache entry");
                Ok(PutOutcome::Stored)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!(key = %key, "Concurrent writer stored entry first");
                Ok(PutOutcome::AlreadyPresent)
            }
            Err(e) => {
                warn!(from = ?staging, to = ?path, error = %e, "Failed to link cache entry");
                Err(e)
            }
        }
    }
}
