mod cli;
mod dist;
mod error;
mod prefetch;
mod server;

use crate::cli::Args;
use crate::error::{ErrorKind, Result};
use crate::prefetch::Prefetcher;
use crate::server::Credentials;
use clap::Parser;
use exn::ResultExt;
use skycache_config::Config;
use skycache_fetch::{AssetService, BulkDownloader, DownloadCoordinator, Origin};
use skycache_storage::AssetStore;
use std::net::SocketAddr;
use std::process::ExitCode;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "{e}");
            ExitCode::FAILURE
        },
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        true => EnvFilter::new("debug"),
        false => EnvFilter::new("info"),
    });
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

async fn run(args: Args) -> Result<()> {
    let config = Config::load(args.config.as_deref(), args.overrides()).or_raise(|| ErrorKind::Config)?;
    let root = config.cache_dir();
    tokio::fs::create_dir_all(&root).await.or_raise(|| ErrorKind::CacheDir(root.clone()))?;
    let store = AssetStore::new(&root).or_raise(|| ErrorKind::CacheDir(root.clone()))?;
    let origin = Origin::new(&config.cdn).or_raise(|| ErrorKind::Config)?;
    let coordinator = DownloadCoordinator::new();

    let prefetcher = Prefetcher::new(
        BulkDownloader::new(origin.clone(), coordinator.clone()).with_workers(config.workers),
        origin.base().clone(),
        store.root(),
        config.manifest.clone(),
    );
    if config.download {
        prefetcher.download().await?;
        tracing::info!("Download complete");
        return Ok(());
    }
    if config.download_cache {
        prefetcher.spawn_background();
    }

    let auth = config.auth().map(|(login, password)| Credentials::new(login, password));
    let app = server::router(AssetService::new(store, coordinator, origin), auth);
    let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], config.port)))
        .await
        .or_raise(|| ErrorKind::Server)?;
    tracing::info!("Starting server on http://localhost:{}", config.port);
    tracing::info!("cdn: {}", config.cdn);
    tracing::info!("cache: {}", root.display());
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .or_raise(|| ErrorKind::Server)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
