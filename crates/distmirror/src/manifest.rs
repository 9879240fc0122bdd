//! # Manifest Rewriter
//!
//! Channel manifests embed absolute URLs back to the upstream server. Before a
//! manifest is cached, every occurrence of the upstream URL is replaced with
//! the mirror's public URL, and the checksum served for it is computed over the
//! rewritten bytes so client integrity checks match what the mirror serves.

use std::fmt;

use bytes::Bytes;
use memchr::memmem;
use sha2::{Digest, Sha256};

/// Suffix identifying a checksum request for a manifest
pub const CHECKSUM_SUFFIX: &str = ".sha256";

/// A manifest body after host substitution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenManifest {
    pub body: Bytes,
    /// Lowercase hex SHA-256 of `body`
    pub digest_hex: String,
}

/// Replace every occurrence of `upstream_host` in `body` with `mirror_host`
/// and hash the result.
///
/// An empty `upstream_host` leaves the body unchanged.
pub fn rewrite(body: &[u8], upstream_host: &str, mirror_host: &str) -> RewrittenManifest {
    let body = replace_all(body, upstream_host.as_bytes(), mirror_host.as_bytes());
    let digest_hex = sha256_hex(&body);
    RewrittenManifest {
        body: Bytes::from(body),
        digest_hex,
    }
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn replace_all(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    if needle.is_empty() {
        return haystack.to_vec();
    }

    let mut out = Vec::with_capacity(haystack.len());
    let mut last = 0;
    for pos in memmem::find_iter(haystack, needle) {
        out.extend_from_slice(&haystack[last..pos]);
        out.extend_from_slice(replacement);
        last = pos + needle.len();
    }
    out.extend_from_slice(&haystack[last..]);
    out
}

/// The single-line checksum response: `<digest>  <basename>\n`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumLine {
    pub digest_hex: String,
    pub file_name: String,
}

impl ChecksumLine {
    /// Checksum line for the manifest at `manifest_path`
    pub fn new(digest_hex: impl Into<String>, manifest_path: &str) -> Self {
        Self {
            digest_hex: digest_hex.into(),
            file_name: basename(manifest_path).to_owned(),
        }
    }
}

impl fmt::Display for ChecksumLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}  {}", self.digest_hex, self.file_name)
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
