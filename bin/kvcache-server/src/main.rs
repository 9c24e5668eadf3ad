//! KVCache Server - cached key-value HTTP service
//!
//! Settings come from an optional TOML file; CLI flags (or their
//! environment variables) override file values.

use anyhow::Result;
use clap::Parser;
use kvcache_cache::ConsistencyCoordinator;
use kvcache_common::config::{DEFAULT_CACHE_CAPACITY, StoreBackend};
use kvcache_common::{CacheMode, Config};
use kvcache_server::{AppState, flush_on_shutdown, open_store, router};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "kvcache-server")]
#[command(about = "Key-value server with an LRU cache in front of a backing store")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "kvcache.toml")]
    config: PathBuf,

    /// Cache capacity in entries (non-positive values fall back to the default)
    #[arg(long, env = "CACHE_SIZE", allow_negative_numbers = true)]
    cache_size: Option<i64>,

    /// Consistency mode: write-through or write-back
    #[arg(long, env = "CACHE_MODE")]
    cache_mode: Option<CacheMode>,

    /// Backing store: redb or memory
    #[arg(long, env = "STORE_BACKEND")]
    store_backend: Option<StoreBackend>,

    /// Database file for the redb backend
    #[arg(long, env = "STORE_PATH")]
    store_path: Option<PathBuf>,

    /// Listen address for the HTTP API
    #[arg(short, long, env = "SERVER_LISTEN")]
    listen: Option<SocketAddr>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Parse errors are fatal: a half-read config is worse than none
    let mut config = Config::load(&args.config)?;

    // Merge CLI args with config file (CLI takes precedence)
    let mut capacity_warning = None;
    if let Some(size) = args.cache_size {
        match usize::try_from(size) {
            Ok(size) if size > 0 => config.cache.capacity = size,
            _ => {
                capacity_warning = Some(size.to_string());
                config.cache.capacity = DEFAULT_CACHE_CAPACITY;
            }
        }
    }
    if config.cache.capacity == 0 {
        capacity_warning = Some("0".to_string());
        config.cache.capacity = DEFAULT_CACHE_CAPACITY;
    }
    if let Some(mode) = args.cache_mode {
        config.cache.mode = mode;
    }
    if let Some(backend) = args.store_backend {
        config.store.backend = backend;
    }
    if let Some(path) = args.store_path {
        config.store.path = path;
    }
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting KVCache server");
    info!("Config file: {}", args.config.display());
    if let Some(bad) = capacity_warning {
        warn!(
            "Invalid cache size {}. Using default value of {}",
            bad, DEFAULT_CACHE_CAPACITY
        );
    }
    config.validate()?;

    let store = open_store(&config.store)?;
    let store_name = store.name();
    let coordinator = Arc::new(ConsistencyCoordinator::new(
        config.cache.capacity,
        config.cache.mode,
        store,
    )?);

    let state = Arc::new(AppState::new(coordinator.clone(), store_name));
    let app = router(state);

    info!("Starting HTTP server on {}", config.server.listen);
    info!("Metrics endpoint: /metrics");
    let listener = TcpListener::bind(config.server.listen).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down...");
        })
        .await?;

    flush_on_shutdown(&coordinator).await;
    info!("KVCache server shut down gracefully");

    Ok(())
}
