//! # Request Router
//!
//! Classifies inbound request paths and runs the matching handling branch:
//!
//! - manifest checksum requests (`/dist/channel*.sha256`) fetch the manifest,
//!   rewrite it to point at the mirror, cache the rewritten body, and answer
//!   with a checksum line for it;
//! - everything else is an opaque artifact served from the store or fetched
//!   from upstream and stored.
//!
//! The router holds no per-request state and performs no cross-request
//! locking. Concurrent misses for the same key may each fetch upstream; the
//! store keeps whichever write lands first.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, error, warn};

use crate::cache::{CacheKey, CacheStatus, ContentStore, PutOutcome};
use crate::manifest::{self, CHECKSUM_SUFFIX, ChecksumLine};
use crate::origin::Origin;
use crate::MirrorError;

/// URL segment identifying channel manifests
pub const CHANNEL_MANIFEST_SEGMENT: &str = "/dist/channel";

/// Kind of an inbound request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind<'a> {
    /// Checksum of a channel manifest. `manifest_path` is the URL path without
    /// the checksum suffix; any query string is kept alongside it.
    ManifestChecksum {
        manifest_path: &'a str,
        query: Option<&'a str>,
    },
    /// Any other path, proxied and cached verbatim
    Artifact,
}

impl<'a> RequestKind<'a> {
    /// Classify a request target (path plus optional `?query`).
    ///
    /// Only the path decides the kind; the query never hides the suffix.
    pub fn classify(target: &'a str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };

        if path.contains(CHANNEL_MANIFEST_SEGMENT) {
            if let Some(manifest_path) = path.strip_suffix(CHECKSUM_SUFFIX) {
                return Self::ManifestChecksum {
                    manifest_path,
                    query,
                };
            }
        }
        Self::Artifact
    }
}

/// Cache and fetch key of a manifest: its path with the request query, if any
fn manifest_key(manifest_path: &str, query: Option<&str>) -> String {
    match query {
        Some(query) => format!("{manifest_path}?{query}"),
        None => manifest_path.to_owned(),
    }
}

/// Successful outcome of a mirrored request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorResponse {
    Artifact {
        body: Bytes,
        /// Upstream content type; unknown for cache hits
        content_type: Option<String>,
        status: CacheStatus,
    },
    Checksum(ChecksumLine),
}

/// Shared handles for request handling, cloned into every request task
#[derive(Clone)]
pub struct MirrorState {
    store: Arc<dyn ContentStore>,
    origin: Arc<dyn Origin>,
    public_host: Arc<str>,
}

impl MirrorState {
    pub fn new(
        store: Arc<dyn ContentStore>,
        origin: Arc<dyn Origin>,
        public_host: impl Into<String>,
    ) -> Self {
        Self {
            store,
            origin,
            public_host: Arc::from(public_host.into()),
        }
    }

    pub fn public_host(&self) -> &str {
        &self.public_host
    }

    /// Handle a request for `path` (path and query of the inbound URI)
    pub async fn handle(&self, path: &str) -> Result<MirrorResponse, MirrorError> {
        match RequestKind::classify(path) {
            RequestKind::ManifestChecksum {
                manifest_path,
                query,
            } => self.handle_manifest_checksum(manifest_path, query).await,
            RequestKind::Artifact => self.handle_artifact(path).await,
        }
    }

    async fn handle_manifest_checksum(
        &self,
        manifest_path: &str,
        query: Option<&str>,
    ) -> Result<MirrorResponse, MirrorError> {
        let key = manifest_key(manifest_path, query);
        let fetched = self.fetch_upstream(&key).await?;

        let rewritten =
            manifest::rewrite(&fetched.body, self.origin.base_url(), &self.public_host);
        let line = ChecksumLine::new(rewritten.digest_hex, manifest_path);
        debug!(path = %key, digest = %line.digest_hex, "Rewrote manifest");

        self.store_best_effort(&CacheKey::new(key), rewritten.body).await;

        Ok(MirrorResponse::Checksum(line))
    }

    async fn handle_artifact(&self, path: &str) -> Result<MirrorResponse, MirrorError> {
        let key = CacheKey::new(path);

        match self.store.get(&key).await {
            Ok(Some(body)) => {
                debug!(key = %key, size = body.len(), "Cache hit");
                return Ok(MirrorResponse::Artifact {
                    body,
                    content_type: None,
                    status: CacheStatus::Hit,
                });
            }
            Ok(None) => debug!(key = %key, "Cache miss"),
            Err(e) => warn!(key = %key, error = %e, "Cache read failed, fetching upstream"),
        }

        let fetched = self.fetch_upstream(path).await?;
        self.store_best_effort(&key, fetched.body.clone()).await;

        Ok(MirrorResponse::Artifact {
            body: fetched.body,
            content_type: fetched.content_type,
            status: CacheStatus::Miss,
        })
    }

    async fn fetch_upstream(&self, path: &str) -> Result<crate::Fetched, MirrorError> {
        self.origin.fetch(path).await.inspect_err(|e| {
            error!(path = %path, error = %e, "Upstream fetch failed");
        })
    }

    async fn store_best_effort(&self, key: &CacheKey, body: Bytes) {
        match self.store.put(key, body).await {
            Ok(PutOutcome::Stored) => debug!(key = %key, "Cached entry"),
            Ok(PutOutcome::AlreadyPresent) => {
                debug!(key = %key, "Entry already cached, new content discarded")
            }
            Err(e) => warn!(key = %key, error = %e, "Failed to cache entry"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use reqwest::StatusCode;

    use crate::Fetched;
    use crate::cache::MemoryStore;
    use crate::manifest::sha256_hex;

    const UPSTREAM: &str = "https://static.rust-lang.org";
    const MIRROR: &str = "https://mirror.example.com";

    /// Origin double that serves canned bodies and records every fetched path
    #[derive(Default)]
    struct RecordingOrigin {
        bodies: HashMap<String, Bytes>,
        calls: Mutex<Vec<String>>,
    }

    impl RecordingOrigin {
        fn with(mut self, path: &str, body: impl Into<Bytes>) -> Self {
            self.bodies.insert(path.to_string(), body.into());
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl Origin for RecordingOrigin {
        fn base_url(&self) -> &str {
            UPSTREAM
        }

        async fn fetch(&self, path: &str) -> Result<Fetched, MirrorError> {
            self.calls.lock().push(path.to_string());
            match self.bodies.get(path) {
                Some(body) => Ok(Fetched {
                    body: body.clone(),
                    content_type: Some("application/octet-stream".to_string()),
                }),
                None => Err(MirrorError::UpstreamStatus {
                    url: format!("{UPSTREAM}{path}"),
                    status: StatusCode::SERVICE_UNAVAILABLE,
                }),
            }
        }
    }

    fn state(origin: Arc<RecordingOrigin>, store: Arc<MemoryStore>) -> MirrorState {
        MirrorState::new(store, origin, MIRROR)
    }

    #[test]
    fn test_classification() {
        assert_eq!(
            RequestKind::classify("/dist/channel-rust-stable.toml.sha256"),
            RequestKind::ManifestChecksum {
                manifest_path: "/dist/channel-rust-stable.toml",
                query: None,
            }
        );
        assert_eq!(
            RequestKind::classify("/dist/2024-01-01/channel-rust-nightly.toml.sha256"),
            RequestKind::Artifact,
            "date-scoped manifests live under /dist/<date>/ and do not contain /dist/channel"
        );
        assert_eq!(
            RequestKind::classify("/dist/2024-01-01/rustc-x.tar.gz.sha256"),
            RequestKind::Artifact
        );
        assert_eq!(
            RequestKind::classify("/dist/channel-rust-stable.toml"),
            RequestKind::Artifact
        );
        assert_eq!(
            RequestKind::classify("/dist/channel-rust-stable.toml.sha256?x=1"),
            RequestKind::ManifestChecksum {
                manifest_path: "/dist/channel-rust-stable.toml",
                query: Some("x=1"),
            }
        );
        assert_eq!(
            RequestKind::classify("/dist/x.tar.gz?from=/dist/channel.sha256"),
            RequestKind::Artifact,
            "text in the query never makes a checksum request"
        );
    }

    #[tokio::test]
    async fn test_checksum_with_query_is_rewritten_and_keyed_with_query() {
        let manifest = format!("url = \"{UPSTREAM}/dist/x\"\n");
        let origin = Arc::new(
            RecordingOrigin::default().with("/dist/channel-rust-stable.toml?x=1", manifest),
        );
        let store = Arc::new(MemoryStore::new());
        let state = state(origin.clone(), store.clone());

        let MirrorResponse::Checksum(line) = state
            .handle("/dist/channel-rust-stable.toml.sha256?x=1")
            .await
            .unwrap()
        else {
            panic!("expected checksum response");
        };

        assert_eq!(line.file_name, "channel-rust-stable.toml");
        assert_eq!(
            origin.calls(),
            vec!["/dist/channel-rust-stable.toml?x=1".to_string()]
        );

        let cached = store
            .get(&CacheKey::new("/dist/channel-rust-stable.toml?x=1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(line.digest_hex, sha256_hex(&cached));
        assert!(!std::str::from_utf8(&cached).unwrap().contains(UPSTREAM));
        assert!(
            !store
                .contains(&CacheKey::new("/dist/channel-rust-stable.toml.sha256?x=1"))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_artifact_miss_then_hit() {
        let path = "/dist/2024-01-01/rustc-x.tar.gz";
        let origin = Arc::new(RecordingOrigin::default().with(path, &b"tarball"[..]));
        let store = Arc::new(MemoryStore::new());
        let state = state(origin.clone(), store.clone());

        let first = state.handle(path).await.unwrap();
        assert_eq!(
            first,
            MirrorResponse::Artifact {
                body: Bytes::from_static(b"tarball"),
                content_type: Some("application/octet-stream".to_string()),
                status: CacheStatus::Miss,
            }
        );
        assert_eq!(origin.calls(), vec![path.to_string()]);
        assert_eq!(
            store.get(&CacheKey::new(path)).await.unwrap(),
            Some(Bytes::from_static(b"tarball"))
        );

        let second = state.handle(path).await.unwrap();
        match second {
            MirrorResponse::Artifact { body, status, .. } => {
                assert_eq!(&body[..], b"tarball");
                assert_eq!(status, CacheStatus::Hit);
            }
            other => panic!("unexpected response: {other:?}"),
        }
        assert_eq!(origin.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_manifest_checksum_matches_cached_body() {
        let manifest = format!(
            "[pkg.rustc.target.x86_64-unknown-linux-gnu]\nurl = \"{UPSTREAM}/dist/2024-01-01/rustc.tar.gz\"\n"
        );
        let origin = Arc::new(
            RecordingOrigin::default().with("/dist/channel-rust-stable.toml", manifest),
        );
        let store = Arc::new(MemoryStore::new());
        let state = state(origin.clone(), store.clone());

        let response = state
            .handle("/dist/channel-rust-stable.toml.sha256")
            .await
            .unwrap();

        assert_eq!(origin.calls(), vec!["/dist/channel-rust-stable.toml".to_string()]);

        let MirrorResponse::Checksum(line) = response else {
            panic!("expected checksum response");
        };
        assert_eq!(line.file_name, "channel-rust-stable.toml");

        let cached = store
            .get(&CacheKey::new("/dist/channel-rust-stable.toml"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(line.digest_hex, sha256_hex(&cached));

        let text = std::str::from_utf8(&cached).unwrap();
        assert!(text.contains("https://mirror.example.com/dist/2024-01-01/rustc.tar.gz"));
        assert!(!text.contains(UPSTREAM));

        // The checksum line itself is never stored
        assert!(
            !store
                .contains(&CacheKey::new("/dist/channel-rust-stable.toml.sha256"))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_manifest_served_after_checksum_is_rewritten_copy() {
        let manifest = format!("url = \"{UPSTREAM}/dist/x\"\n");
        let origin = Arc::new(
            RecordingOrigin::default().with("/dist/channel-rust-beta.toml", manifest),
        );
        let state = state(origin.clone(), Arc::new(MemoryStore::new()));

        let MirrorResponse::Checksum(line) = state
            .handle("/dist/channel-rust-beta.toml.sha256")
            .await
            .unwrap()
        else {
            panic!("expected checksum response");
        };

        let MirrorResponse::Artifact { body, status, .. } =
            state.handle("/dist/channel-rust-beta.toml").await.unwrap()
        else {
            panic!("expected artifact response");
        };
        assert_eq!(status, CacheStatus::Hit);
        assert_eq!(sha256_hex(&body), line.digest_hex);
        assert_eq!(origin.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_surfaced_and_nothing_cached() {
        let origin = Arc::new(RecordingOrigin::default());
        let store = Arc::new(MemoryStore::new());
        let state = state(origin, store.clone());

        let err = state.handle("/dist/missing.tar.gz").await.unwrap_err();
        assert!(err.is_upstream());

        let err = state
            .handle("/dist/channel-rust-stable.toml.sha256")
            .await
            .unwrap_err();
        assert!(err.is_upstream());

        assert!(store.is_empty());
    }

    /// Store whose every operation fails
    struct BrokenStore;

    #[async_trait]
    impl ContentStore for BrokenStore {
        async fn contains(&self, _key: &CacheKey) -> crate::cache::CacheResult<bool> {
            Err(std::io::Error::other("disk gone"))
        }

        async fn get(&self, _key: &CacheKey) -> crate::cache::CacheResult<Option<Bytes>> {
            Err(std::io::Error::other("disk gone"))
        }

        async fn put(
            &self,
            _key: &CacheKey,
            _body: Bytes,
        ) -> crate::cache::CacheResult<PutOutcome> {
            Err(std::io::Error::other("disk gone"))
        }
    }

    #[tokio::test]
    async fn test_cache_failures_fall_back_to_upstream() {
        let path = "/dist/2024-01-01/rustc-x.tar.gz";
        let origin = Arc::new(
            RecordingOrigin::default()
                .with(path, &b"tarball"[..])
                .with("/dist/channel-rust-stable.toml", "manifest"),
        );
        let state = MirrorState::new(Arc::new(BrokenStore), origin.clone(), MIRROR);

        let MirrorResponse::Artifact { body, status, .. } = state.handle(path).await.unwrap()
        else {
            panic!("expected artifact response");
        };
        assert_eq!(&body[..], b"tarball");
        assert_eq!(status, CacheStatus::Miss);

        let MirrorResponse::Checksum(line) = state
            .handle("/dist/channel-rust-stable.toml.sha256")
            .await
            .unwrap()
        else {
            panic!("expected checksum response");
        };
        assert_eq!(line.digest_hex, sha256_hex(b"manifest"));
        assert_eq!(origin.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_existing_manifest_is_not_replaced() {
        let path = "/dist/channel-rust-stable.toml";
        let origin = Arc::new(
            RecordingOrigin::default().with(path, format!("url = \"{UPSTREAM}/new\"\n")),
        );
        let store = Arc::new(MemoryStore::new());
        store
            .put(&CacheKey::new(path), Bytes::from_static(b"old manifest"))
            .await
            .unwrap();
        let state = state(origin, store.clone());

        state.handle("/dist/channel-rust-stable.toml.sha256").await.unwrap();

        let cached = store.get(&CacheKey::new(path)).await.unwrap().unwrap();
        assert_eq!(&cached[..], b"old manifest");
    }
}
