//! # HTTP Surface
//!
//! A single fallback handler mirrors every `GET` path. Failures are mapped to
//! status codes here; details stay in the log.
//!
//! Each mirrored request runs on its own task. A client that disconnects
//! mid-request drops only the response; the upstream fetch and the cache
//! write still finish. The upstream client timeout is the only time bound.

use std::net::SocketAddr;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::cache::CacheStatus;
use crate::{MirrorConfig, MirrorError, MirrorResponse, MirrorState};

const CACHE_STATUS_HEADER: &str = "x-cache";

/// Build the mirror router
pub fn app(state: MirrorState) -> Router {
    Router::new()
        .fallback(mirror_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bind the configured port and serve until Ctrl-C
pub async fn serve(config: &MirrorConfig, state: MirrorState) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!(
        addr = %addr,
        upstream = %config.upstream_url,
        public_host = %state.public_host(),
        "Mirror listening"
    );

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}

async fn mirror_handler(State(state): State<MirrorState>, method: Method, uri: Uri) -> Response {
    if method != Method::GET {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .unwrap_or_else(|| "/".to_owned());

    let task = tokio::spawn(async move { state.handle(&path).await });
    match task.await {
        Ok(Ok(response)) => response.into_response(),
        Ok(Err(e)) => e.into_response(),
        Err(e) => {
            error!(error = %e, "Request task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error\n").into_response()
        }
    }
}

impl IntoResponse for MirrorResponse {
    fn into_response(self) -> Response {
        match self {
            MirrorResponse::Artifact {
                body,
                content_type,
                status,
            } => {
                let content_type = content_type
                    .and_then(|ct| HeaderValue::from_str(&ct).ok())
                    .unwrap_or(HeaderValue::from_static("application/octet-stream"));
                let cache_status = match status {
                    CacheStatus::Hit => HeaderValue::from_static("HIT"),
                    CacheStatus::Miss => HeaderValue::from_static("MISS"),
                };
                (
                    [
                        (header::CONTENT_TYPE, content_type),
                        (header::HeaderName::from_static(CACHE_STATUS_HEADER), cache_status),
                    ],
                    body,
                )
                    .into_response()
            }
            MirrorResponse::Checksum(line) => (
                [(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))],
                line.to_string(),
            )
                .into_response(),
        }
    }
}

impl MirrorError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::UpstreamStatus { status, .. } if *status == StatusCode::NOT_FOUND => {
                StatusCode::NOT_FOUND
            }
            Self::UpstreamUnreachable { source, .. } if source.is_timeout() => {
                StatusCode::GATEWAY_TIMEOUT
            }
            Self::UpstreamUnreachable { .. } | Self::UpstreamStatus { .. } | Self::BodyRead { .. } => {
                StatusCode::BAD_GATEWAY
            }
            Self::Client(_) | Self::Proxy(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for MirrorError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match status {
            StatusCode::NOT_FOUND => "not found upstream",
            StatusCode::GATEWAY_TIMEOUT => "upstream timed out",
            StatusCode::BAD_GATEWAY => "upstream unavailable",
            _ => "internal error",
        };
        (status, format!("{message}\n")).into_response()
    }
}
