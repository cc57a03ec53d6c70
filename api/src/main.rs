use anyhow::{Context, Result};
use std::net::SocketAddr;

mod handlers;
mod routes;
mod state;

use common::bootstrap;
use common::config::Settings;
use common::telemetry;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Settings::load()?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    telemetry::init_logging(
        &config.observability.log_level,
        config.observability.json_logs,
        config.observability.tracing_endpoint.as_deref(),
    )?;

    tracing::info!("Starting API server");
    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        "Configuration loaded"
    );

    // Prometheus recorder, rendered by GET /metrics
    let metrics_handle = telemetry::install_metrics_recorder()?;

    let db_pool = bootstrap::init_database_pool(&config).await?;
    let push_sender = bootstrap::init_push_sender(&config)?;
    let notification_service =
        bootstrap::init_notification_service(&config, db_pool.clone(), push_sender.clone())?;
    let extractor = bootstrap::init_image_extractor(&config)?;

    // Create application state
    let state = AppState::new(
        db_pool.clone(),
        config.clone(),
        notification_service,
        push_sender,
        extractor,
        metrics_handle,
    );

    // Create router
    let app = routes::create_router(state);

    // Start server
    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .context("Invalid server host")?,
        config.server.port,
    ));
    tracing::info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db_pool.close().await;
    telemetry::shutdown_tracer();

    tracing::info!("API server stopped");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Initiating graceful shutdown");
}
