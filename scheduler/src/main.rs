// Scheduler binary entry point

use common::bootstrap;
use common::config::Settings;
use common::scheduler::{Scheduler, SchedulerEngine};
use common::telemetry;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Configuration comes first so logging honours its level and format
    let settings = Settings::load()?;
    settings.validate()?;

    telemetry::init_logging(
        &settings.observability.log_level,
        settings.observability.json_logs,
        settings.observability.tracing_endpoint.as_deref(),
    )?;

    info!("Starting medicine expiry notification scheduler");
    info!(
        tick_schedule = %settings.scheduler.tick_schedule,
        metrics_port = settings.observability.metrics_port,
        "Configuration loaded"
    );

    telemetry::init_metrics(settings.observability.metrics_port).map_err(|e| {
        error!(error = %e, "Failed to initialize metrics exporter");
        e
    })?;

    let db_pool = bootstrap::init_database_pool(&settings).await.map_err(|e| {
        error!(error = %e, "Failed to initialize database pool");
        e
    })?;

    let push_sender = bootstrap::init_push_sender(&settings)?;
    let service =
        bootstrap::init_notification_service(&settings, db_pool.clone(), push_sender)?;

    let scheduler = Arc::new(SchedulerEngine::new(&settings.scheduler, service)?);
    info!("Scheduler engine created");

    // Set up graceful shutdown on SIGINT/SIGTERM
    let scheduler_for_shutdown = scheduler.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        if let Err(e) = scheduler_for_shutdown.stop().await {
            error!(error = %e, "Error during scheduler shutdown");
        }
    });

    info!("Starting notification tick loop");
    let result = scheduler.start().await;

    db_pool.close().await;
    telemetry::shutdown_tracer();

    if let Err(e) = result {
        error!(error = %e, "Scheduler error");
        return Err(e);
    }

    info!("Scheduler stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal, initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM signal, initiating graceful shutdown"),
    }
}
