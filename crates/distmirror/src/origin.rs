//! # Origin Fetcher
//!
//! The single place outbound requests to the upstream distribution server are
//! issued. Bodies are read fully into memory so the bytes handed to the cache
//! and the bytes served to the client are the same buffer.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Proxy};
use rustls::{ClientConfig, crypto::aws_lc_rs};
use rustls_platform_verifier::BuilderVerifierExt;
use tracing::{debug, info};

use crate::{MirrorConfig, MirrorError};

/// A successfully fetched upstream body
#[derive(Debug, Clone)]
pub struct Fetched {
    pub body: Bytes,
    /// Upstream `Content-Type`, if it sent one
    pub content_type: Option<String>,
}

/// Source of upstream content
#[async_trait]
pub trait Origin: Send + Sync {
    /// Base URL that request paths are appended to
    fn base_url(&self) -> &str;

    /// Fetch `path` (path and query, starting with `/`) from upstream
    async fn fetch(&self, path: &str) -> Result<Fetched, MirrorError>;
}

/// Create a reqwest Client with the provided configuration
pub fn create_client(config: &MirrorConfig) -> Result<Client, MirrorError> {
    let provider = Arc::new(aws_lc_rs::default_provider());

    let tls_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| MirrorError::Client(format!("TLS protocol versions: {e}")))?
        .with_platform_verifier()
        .map_err(|e| MirrorError::Client(format!("platform verifier: {e}")))?
        .with_no_client_auth();

    let mut client_builder = Client::builder()
        .user_agent(&config.user_agent)
        .use_preconfigured_tls(tls_config)
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    if let Some(proxy_url) = &config.proxy {
        client_builder = client_builder.proxy(upstream_proxy(proxy_url)?);
        info!("Using explicitly configured proxy for upstream");
    } else if config.use_system_proxy {
        info!("Using system proxy settings for upstream");
    } else {
        client_builder = client_builder.no_proxy();
        debug!("Proxy disabled for upstream");
    }

    client_builder
        .build()
        .map_err(|e| MirrorError::Client(e.to_string()))
}

/// Proxy for all upstream traffic; the scheme selects HTTP, HTTPS or SOCKS5
fn upstream_proxy(proxy_url: &str) -> Result<Proxy, MirrorError> {
    Proxy::all(proxy_url).map_err(|e| MirrorError::Proxy(e.to_string()))
}

/// Origin backed by a reqwest client
#[derive(Debug, Clone)]
pub struct HttpOrigin {
    client: Client,
    base_url: String,
}

impl HttpOrigin {
    /// Build an origin for `config.upstream_url` with a client from [`create_client`]
    pub fn new(config: &MirrorConfig) -> Result<Self, MirrorError> {
        let client = create_client(config)?;
        Ok(Self::with_client(client, &config.upstream_url))
    }

    /// Build an origin around an existing client
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { client, base_url }
    }
}

fn join_url(base_url: &str, path: &str) -> String {
    format!("{base_url}{path}")
}

#[async_trait]
impl Origin for HttpOrigin {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch(&self, path: &str) -> Result<Fetched, MirrorError> {
        let url = join_url(&self.base_url, path);
        info!(url = %url, "Fetching from upstream");

        let response = self.client.get(&url).send().await.map_err(|source| {
            MirrorError::UpstreamUnreachable {
                url: url.clone(),
                source,
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MirrorError::UpstreamStatus { url, status });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response
            .bytes()
            .await
            .map_err(|source| MirrorError::BodyRead {
                url: url.clone(),
                source,
            })?;

        debug!(url = %url, size = body.len(), "Fetched upstream body");
        Ok(Fetched { body, content_type })
    }
}
