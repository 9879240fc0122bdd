//! # Content Store Provider
//!
//! The trait every content store implementation follows.

use async_trait::async_trait;
use bytes::Bytes;

use crate::cache::types::{CacheKey, CacheResult, PutOutcome};

/// Write-once storage of mirrored content keyed by request path
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Check if the store holds an entry for the given key
    async fn contains(&self, key: &CacheKey) -> CacheResult<bool>;

    /// Read the full entry for `key`, or `None` if nothing is stored
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Bytes>>;

    /// Store `data` under `key` unless an entry already exists.
    ///
    /// An existing entry is never replaced; the call then reports
    /// [`PutOutcome::AlreadyPresent`] and `data` is discarded.
    async fn put(&self, key: &CacheKey, data: Bytes) -> CacheResult<PutOutcome>;
}
