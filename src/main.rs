//! Offline Proxy - A network-first offline caching proxy
//!
//! Runs the caching worker in front of the app's upstream origin.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use offline_proxy::api::create_router;
use offline_proxy::{AppState, WorkerConfig};

/// Main entry point for the offline proxy.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the worker with an HTTP fetcher and cache storage, loading
///    persisted generations when `CACHE_DIR` is set
/// 4. Register the worker (install, then activate) unless disabled; if that
///    fails, resume on a stored copy of the current generation
/// 5. Start the HTTP proxy on the configured port
/// 6. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "offline_proxy=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting offline proxy");

    let config = WorkerConfig::from_env()?;
    info!(
        "Configuration loaded: cache={}, origin={}, assets={}, policy={:?}, port={}, cache_dir={:?}",
        config.cache_name,
        config.origin,
        config.assets.len(),
        config.install_policy,
        config.server_port,
        config.cache_dir
    );

    let state = AppState::from_config(&config)?;
    info!("Upstream fetcher: {}", state.fetcher.name());

    if config.auto_register {
        match state.worker.register().await {
            Ok(registration) => info!(
                "Worker registered: {} assets cached, {} stale caches deleted",
                registration.install.cached.len(),
                registration
                    .activate
                    .map(|report| report.deleted.len())
                    .unwrap_or(0)
            ),
            Err(err) => {
                warn!("Worker registration failed: {}", err);
                // Without a stored generation the proxy forwards everything
                match state.worker.resume().await {
                    Ok(Some(report)) => info!(
                        "Resumed on stored cache {}, {} stale caches deleted",
                        report.cache_name,
                        report.deleted.len()
                    ),
                    Ok(None) => warn!("No stored cache {}; forwarding all requests", config.cache_name),
                    Err(err) => warn!("Resume failed: {}", err),
                }
            }
        }
    }

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Proxy listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Proxy shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
