//! # QuickDocs Worker
//!
//! Queue-driven repository indexing: fetches a GitHub repository's tree,
//! parses a prioritized subset of its files, runs the LLM documentation
//! pipeline, and persists the result.
//!
//! The process hosts three things:
//! - an Axum API for enqueueing indexing jobs (`POST /enqueue`),
//! - a Redis-backed job queue with a pool of concurrent workers,
//! - the indexing orchestrator itself, sharing one process-global LLM
//!   governor across all workers.

mod api;
mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quickdocs_core::{
    DocumentStore, EmailClient, IndexHandler, LlmClient, RedisCache, RedisQueue, SelectorLimits,
    WorkerPool, new_pool,
};

use crate::config::{Config, LlmProvider};

/// Command line arguments for the QuickDocs worker
#[derive(Parser, Debug)]
#[command(name = "quickdocs-worker")]
#[command(about = "Queue-driven repository indexing worker with an HTTP enqueue API")]
struct Args {
    /// HTTP port for the enqueue API (overrides WORKER_API_PORT)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::from_env()?;
    if let Some(port) = args.port {
        config.api_port = port;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "quickdocs_worker=debug,quickdocs_core=debug,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("worker configuration loaded");
    info!(
        endpoint = %config.otel_endpoint,
        "telemetry export is delegated to the collector at this endpoint"
    );

    // Storage backends; failing here crashes startup on purpose.
    let pool = new_pool(&config.database_url).await?;
    let store = DocumentStore::new(pool);
    let cache = RedisCache::new(&config.redis_url).await?;

    // Startup sweep of stale locks. Correct only for single-writer
    // deployments (one worker process per queue).
    if let Err(e) = cache.clear_stale_locks().await {
        warn!("failed to clear stale locks: {e}");
    }

    let llm = Arc::new(match config.llm_provider {
        LlmProvider::Anthropic => LlmClient::anthropic(
            config.anthropic_api_key.clone(),
            config.llm_rate_limit_rpm,
            config.llm_rate_limit_tpm,
        )?,
        LlmProvider::OpenAi => LlmClient::openai(
            config.openai_api_key.clone(),
            config.llm_rate_limit_rpm,
            config.llm_rate_limit_tpm,
        )?,
    });
    info!("using LLM provider: {}", config.llm_provider);

    let email = EmailClient::new(
        &config.resend_api_key,
        &config.email_from,
        &config.app_base_url,
    );
    match &email {
        Some(_) => info!("email notifications enabled (from: {})", config.email_from),
        None => info!("email notifications disabled (no RESEND_API_KEY)"),
    }

    let queue = Arc::new(RedisQueue::new(cache.connection()));
    let handler = Arc::new(IndexHandler::new(
        store,
        cache,
        llm,
        email,
        SelectorLimits {
            max_files: config.max_files_per_repo,
            max_file_size_bytes: config.max_file_size_bytes,
            max_critical_file_size_bytes: config.max_critical_file_size_bytes,
        },
    ));

    let shutdown = CancellationToken::new();

    let pool_runner = WorkerPool::new(
        queue.clone(),
        handler,
        config.worker_concurrency,
        shutdown.clone(),
    );
    let worker_handles = pool_runner.spawn();

    // HTTP enqueue API.
    let app = api::router(queue);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("starting enqueue API on {addr}");

    let http_shutdown = shutdown.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { http_shutdown.cancelled().await })
            .await
    });

    shutdown_signal().await;
    info!("shutdown signal received, draining in-flight jobs...");
    shutdown.cancel();

    for handle in worker_handles {
        if let Err(e) = handle.await {
            error!("worker task aborted: {e}");
        }
    }
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("HTTP server error: {e}"),
        Err(e) => error!("HTTP server task aborted: {e}"),
    }

    info!("shutdown complete");
    Ok(())
}

/// Completes on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {e}");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
