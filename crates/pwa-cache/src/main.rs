//! PWA Cache - Offline caching agent for the producer registry web app

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use url::Url;

mod config;

use config::{Config, LoggingConfig, StorageConfig};
use pwa_api::{AppState, create_router};
use pwa_core::{CachePolicyController, Registration, UpdateOutcome};
use pwa_proxy::{OriginClient, OriginClientConfig};
use pwa_storage::{BucketStore, LocalStore, MemoryStore};

/// PWA Cache - Offline caching agent for a web application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "PWA_CACHE_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "PWA_CACHE_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args.config)?;

    // Initialize logging
    init_logging(&config.logging);

    info!("Starting PWA Cache v{}", env!("CARGO_PKG_VERSION"));

    let metrics_handle = if config.metrics.enabled {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        Some(Arc::new(handle))
    } else {
        None
    };

    // Initialize storage backend
    let store = open_store(&config.storage).await?;

    // Initialize origin client
    let controller_config = config.agent.controller_config()?;
    let upstream = Url::parse(&config.upstream.url)
        .with_context(|| format!("Invalid upstream URL: {}", config.upstream.url))?;
    let fetcher = Arc::new(OriginClient::new(OriginClientConfig {
        public_origin: controller_config.origin.clone(),
        upstream,
        skip_tls_verify: config.upstream.skip_tls_verify,
    })?);

    if !fetcher.ping().await {
        warn!(
            "Upstream {} is not reachable, precache will rely on existing buckets",
            config.upstream.url
        );
    }

    // Initialize the controller and bring it to the active state
    let controller = Arc::new(CachePolicyController::new(
        controller_config,
        store.clone(),
        fetcher.clone(),
    )?);
    let registration = Arc::new(Registration::new());

    match registration.update(controller.clone()).await? {
        UpdateOutcome::Activated { install, activate } => {
            pwa_api::routes::metrics::record_install(&install);
            info!(
                "Controller {} active: {} precached, {} failed, {} stale buckets removed",
                controller.config().version,
                install.cached.len(),
                install.failed.len(),
                activate.deleted.len()
            );
        }
        UpdateOutcome::Waiting { install } => {
            pwa_api::routes::metrics::record_install(&install);
            info!("Controller {} installed and waiting", controller.config().version);
        }
    }

    // Create application state
    let state = AppState::new(registration, controller, store, fetcher);

    // Create router
    let app = create_router(state, metrics_handle).layer(TraceLayer::new_for_http());

    // Determine bind address
    let bind_addr = args.bind.unwrap_or(config.server.bind_address);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_addr, port).parse()?;

    info!("Listening on {}", addr);
    info!("Origin: {} -> upstream {}", config.agent.origin, config.upstream.url);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Open the configured bucket store
async fn open_store(config: &StorageConfig) -> Result<Arc<dyn BucketStore>> {
    match config.backend.as_str() {
        "memory" => {
            info!("Using in-memory bucket store, cached responses will not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        _ => {
            tokio::fs::create_dir_all(&config.local.path)
                .await
                .with_context(|| format!("Failed to create {}", config.local.path))?;
            Ok(Arc::new(LocalStore::new(&config.local.path).await?))
        }
    }
}

/// Initialize logging
fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
