// Poolwright API server
// Decision: One PoolManager per process, shut down after the HTTP server stops

use std::sync::Arc;

use anyhow::{Context, Result};
use poolwright_core::{ManagerConfig, PoolManager};
use poolwright_server::{build_app, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // RUST_LOG overrides the default filter
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "poolwright_server=debug,poolwright_core=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("poolwright-server starting...");

    let manager_config = ManagerConfig::from_env();
    tracing::info!(
        default_max_workers = manager_config.default_max_workers,
        cleanup_interval_secs = manager_config.cleanup_interval.as_secs(),
        "Manager configured"
    );
    let manager = Arc::new(PoolManager::new(manager_config).context("Failed to start pool manager")?);

    let server_config = ServerConfig::from_env()?;
    if !server_config.api_prefix.is_empty() {
        tracing::info!(prefix = %server_config.api_prefix, "API prefix configured");
    }
    if server_config.cors_allowed_origins.is_empty() {
        tracing::info!("CORS not configured (same-origin requests only)");
    } else {
        tracing::info!(origins = ?server_config.cors_allowed_origins, "CORS origins configured");
    }

    let app = build_app(manager.clone(), &server_config);

    let listener = tokio::net::TcpListener::bind(server_config.addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("HTTP server listening on {}", server_config.addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("HTTP server stopped, shutting down pools");
    manager.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
