//! # Cache Types

use std::fmt;

use sha2::{Digest, Sha256};

/// Where a served artifact came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from the content store
    Hit,
    /// Fetched from upstream
    Miss,
}

/// Outcome of a store write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The entry was created with the given content
    Stored,
    /// An entry already existed and was left untouched
    AlreadyPresent,
}

/// Request key identifying a cached entry: the request path including any query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercase hex SHA-256 of the key, used as the on-disk filename
    pub fn digest(&self) -> String {
        let hash = Sha256::digest(self.0.as_bytes());
        hex::encode(hash)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Result of a store operation
pub type CacheResult<T> = std::result::Result<T, std::io::Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_sha256_of_key() {
        let key = CacheKey::new("abc");
        assert_eq!(
            key.digest(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_digest_is_stable_and_distinct() {
        let a = CacheKey::new("/dist/channel-rust-stable.toml");
        let b = CacheKey::new("/dist/channel-rust-stable.toml");
        let c = CacheKey::new("/dist/channel-rust-beta.toml");

        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
        assert_eq!(a.digest().len(), 64);
        assert!(a.digest().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_query_is_part_of_key() {
        let plain = CacheKey::new("/dist/rustc.tar.gz");
        let query = CacheKey::new("/dist/rustc.tar.gz?v=1");
        assert_ne!(plain.digest(), query.digest());
    }
}
