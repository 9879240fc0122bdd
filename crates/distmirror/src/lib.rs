//! # Distmirror
//!
//! A caching mirror for static release distribution servers such as
//! `static.rust-lang.org`.
//!
//! ## Features
//!
//! - Content-addressed on-disk cache keyed by request path
//! - Single upstream fetch point with a bounded timeout
//! - Channel manifest rewriting so clients resolve artifacts through the mirror
//! - Checksum lines computed over the rewritten manifest bytes
//! - Axum HTTP surface with explicit upstream error responses

pub mod builder;
pub mod cache;
pub mod config;
pub mod error;
pub mod manifest;
pub mod origin;
pub mod router;
pub mod server;

pub use builder::MirrorConfigBuilder;
pub use cache::{CacheKey, CacheStatus, ContentStore, FileStore, MemoryStore, PutOutcome};
pub use config::{DEFAULT_UPSTREAM_URL, MirrorConfig};
pub use error::MirrorError;
pub use manifest::{ChecksumLine, RewrittenManifest, rewrite};
pub use origin::{Fetched, HttpOrigin, Origin, create_client};
pub use router::{MirrorResponse, MirrorState, RequestKind};
pub use server::{app, serve};
