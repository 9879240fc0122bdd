use reqwest::StatusCode;

// Error type for mirror operations
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("Upstream unreachable at {url}: {source}")]
    UpstreamUnreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Upstream returned status code {status} for {url}")]
    UpstreamStatus { url: String, status: StatusCode },

    #[error("Failed to read upstream body from {url}: {source}")]
    BodyRead {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Invalid proxy configuration: {0}")]
    Proxy(String),
}

impl MirrorError {
    /// Whether the failure came from the upstream side of the request
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnreachable { .. } | Self::UpstreamStatus { .. } | Self::BodyRead { .. }
        )
    }
}
