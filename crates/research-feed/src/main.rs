mod annotate;
mod artifact;
mod backends;
mod config;
mod corpus;
mod error;
mod model;
mod publish;
mod records;
mod server;
mod source;
mod tags;

use std::sync::Arc;

use rmcp::{ServiceExt, service::QuitReason, transport::stdio};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use band_common::http::HttpClient;
use band_common::redis::RedisCache;

use backends::{GitHubCommitStore, Web3Storage};
use config::Config;
use corpus::Corpus;
use publish::PublishCoordinator;
use records::RecordStore;
use server::ResearchFeedServer;
use source::GitHubSource;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing to stderr (stdout is reserved for MCP JSON-RPC)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting research-feed MCP server");

    // 1. Load config from environment
    let config = Config::from_env()?;
    info!(
        github_api_url = %config.github_api_url,
        feed_directory = %config.feed_directory,
        annotate_mode = ?config.annotate_mode,
        content_store_key = config.w3s_token.is_some(),
        commit_store_key = config.github_commit_token.is_some(),
        redis = config.redis_url.is_some(),
        "configuration loaded"
    );

    // 2. Record store (Redis optional)
    let redis = RedisCache::new(config.redis_url.as_deref());
    if redis.is_available().await {
        info!("redis connected");
    } else {
        info!("redis unavailable, token records kept in process only");
    }
    let records = Arc::new(RecordStore::new(redis));

    // 3. Outbound collaborators
    let http = HttpClient::new(config.http.clone())?;
    info!(timeout_ms = http.config().timeout.as_millis(), "http client configured");
    let source = Arc::new(GitHubSource::new(
        http.clone(),
        &config.github_api_url,
        &config.feed_directory,
    ));
    let content_store = Arc::new(Web3Storage::new(
        http.clone(),
        &config.w3s_api_url,
        &config.ipfs_gateway,
    ));
    let commit_store = Arc::new(GitHubCommitStore::new(http, &config.github_api_url));

    // 4. Publish pipeline; in-flight backend calls are abandoned on Ctrl-C
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested, cancelling in-flight publishes");
            let _ = shutdown_tx.send(true);
        }
    });
    let stop_serving = shutdown_rx.clone();
    let coordinator = Arc::new(PublishCoordinator::new(
        content_store,
        commit_store,
        Arc::clone(&records),
        config.backend_deadline(),
        shutdown_rx,
    ));

    // 5. Build MCP server and serve on stdio
    let server = ResearchFeedServer::new(
        Arc::new(Corpus::new()),
        source,
        coordinator,
        records,
        config,
    );

    info!("MCP server ready, serving on stdio");
    let service = server.serve(stdio()).await.inspect_err(|e| {
        tracing::error!(error = %e, "MCP server error");
    })?;

    let reason = server::run_until_shutdown(service, stop_serving).await?;
    info!(reason = ?reason, "MCP server shut down");
    if matches!(reason, QuitReason::Cancelled) {
        // The blocking stdin reader would otherwise hold the runtime open.
        std::process::exit(130);
    }
    Ok(())
}
