use std::path::PathBuf;
use std::time::Duration;

/// Upstream distribution server mirrored by default
pub const DEFAULT_UPSTREAM_URL: &str = "https://static.rust-lang.org";

const DEFAULT_USER_AGENT: &str = concat!("distmirror/", env!("CARGO_PKG_VERSION"));

/// Configurable options for the mirror
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Port the HTTP server listens on
    pub port: u16,

    /// Root directory of the content-addressed cache
    pub cache_dir: PathBuf,

    /// Public URL of this mirror, substituted for the upstream URL in manifests
    pub public_host: String,

    /// Base URL of the upstream distribution server
    pub upstream_url: String,

    /// Overall timeout for a single upstream request
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// Whether to follow upstream redirects
    pub follow_redirects: bool,

    pub user_agent: String,

    /// Proxy URL for every upstream request (`http://`, `https://` or
    /// `socks5://`, credentials inline). Takes precedence over the system proxy.
    pub proxy: Option<String>,

    /// Whether to honour `HTTP_PROXY`/`HTTPS_PROXY`/`NO_PROXY` from the environment
    pub use_system_proxy: bool,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            cache_dir: PathBuf::from("./cache"),
            public_host: "http://localhost:8080".to_owned(),
            upstream_url: DEFAULT_UPSTREAM_URL.to_owned(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            proxy: None,
            use_system_proxy: true,
        }
    }
}

impl MirrorConfig {
    pub fn builder() -> crate::builder::MirrorConfigBuilder {
        crate::builder::MirrorConfigBuilder::new()
    }
}
