use std::process::exit;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use distmirror_engine::{FileStore, HttpOrigin, MirrorConfig, MirrorState, serve};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

mod cli;
mod error;

use cli::CliArgs;
use error::AppError;

#[tokio::main]
async fn main() {
    // A missing .env file is fine; the environment and flags still apply
    let _ = dotenvy::dotenv();

    let args = CliArgs::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
        exit(1);
    }

    if let Err(e) = run(args).await {
        error!(error = %e, "Mirror exited with an error");
        exit(1);
    }
}

async fn run(args: CliArgs) -> Result<(), AppError> {
    let config = build_config(&args);

    info!(
        "Upstream timeout configuration: overall={}s, connect={}s",
        config.timeout.as_secs(),
        config.connect_timeout.as_secs()
    );

    let store = FileStore::new(&config.cache_dir);
    store.ensure_initialized().await?;
    info!(cache_dir = %config.cache_dir.display(), "Cache directory ready");

    let origin = HttpOrigin::new(&config)?;
    let state = MirrorState::new(Arc::new(store), Arc::new(origin), config.public_host.clone());

    serve(&config, state).await?;
    info!("Mirror stopped");
    Ok(())
}

fn build_config(args: &CliArgs) -> MirrorConfig {
    let public_host = args
        .host
        .clone()
        .unwrap_or_else(|| format!("http://localhost:{}", args.port));

    let mut builder = MirrorConfig::builder()
        .with_port(args.port)
        .with_cache_dir(&args.cache_path)
        .with_public_host(public_host)
        .with_upstream_url(&args.upstream)
        .with_timeout(Duration::from_secs(args.timeout))
        .with_connect_timeout(Duration::from_secs(args.connect_timeout));

    if args.no_proxy {
        info!("All proxy settings disabled (--no-proxy flag)");
        builder = builder.with_system_proxy(false);
    } else if let Some(proxy_url) = args.proxy.as_ref() {
        builder = builder.with_proxy(proxy_url.clone());
    }

    builder.build()
}
