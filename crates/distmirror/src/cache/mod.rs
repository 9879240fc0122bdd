//! # Content Store
//!
//! Content-addressed storage for mirrored bytes. Entries are located by the
//! SHA-256 digest of their request key, so the key itself never appears on disk.
//! Entries are write-once: the first successful `put` for a key wins.

pub mod providers;
mod types;

pub use providers::{ContentStore, FileStore, MemoryStore};
pub use types::{CacheKey, CacheResult, CacheStatus, PutOutcome};
