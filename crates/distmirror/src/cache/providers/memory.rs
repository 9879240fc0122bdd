//! # Memory Store
//!
//! In-process content store. Nothing survives a restart; useful for tests and
//! for running the mirror without a cache directory.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::cache::types::{CacheKey, CacheResult, PutOutcome};

use super::ContentStore;

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn contains(&self, key: &CacheKey) -> CacheResult<bool> {
        Ok(self.entries.read().contains_key(&key.digest()))
    }

    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Bytes>> {
        Ok(self.entries.read().get(&key.digest()).cloned())
    }

    async fn put(&self, key: &CacheKey, data: Bytes) -> CacheResult<PutOutcome> {
        match self.entries.write().entry(key.digest()) {
            Entry::Occupied(_) => Ok(PutOutcome::AlreadyPresent),
            Entry::Vacant(slot) => {
                slot.insert(data);
                Ok(PutOutcome::Stored)
            }
        }
    }
}
