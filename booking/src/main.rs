//! Pencil-hold daemon.
//!
//! Runs the expiry sweep against the booking store and exports metrics for
//! Prometheus until interrupted.

use anyhow::Context;
use pencilbook_booking::{
    Config, ConflictDetectionEngine, ExpirySweep, HoldEnvironment, InMemoryBookingStore,
    PencilHoldService, RetryingStore, TracingNotifier,
};
use pencilbook_core::environment::SystemClock;
use pencilbook_runtime::metrics::MetricsServer;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.server.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting pencilbook");
    info!(
        hold_hours = config.holds.default_duration_hours,
        eligible = ?config.holds.eligible_statuses,
        buffer_minutes = config.conflicts.buffer_minutes,
        utc_offset_minutes = config.conflicts.utc_offset_minutes,
        sweep_secs = config.sweep.interval_secs,
        "Configuration loaded"
    );

    let metrics_addr: SocketAddr = format!("{}:{}", config.server.metrics_host, config.server.metrics_port)
        .parse()
        .context("invalid METRICS_HOST/METRICS_PORT")?;
    let mut metrics_server = MetricsServer::new(metrics_addr);
    metrics_server.start().context("failed to start metrics exporter")?;

    let store = Arc::new(RetryingStore::new(
        InMemoryBookingStore::new(),
        config.storage.retry_policy(),
    ));
    let env = HoldEnvironment::new(
        Arc::new(SystemClock),
        Arc::new(TracingNotifier),
        config.holds.clone(),
        ConflictDetectionEngine::from_config(&config.conflicts),
    );
    let service = Arc::new(PencilHoldService::new(store, env));
    let sweep = Arc::new(ExpirySweep::new(Arc::clone(&service)));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let interval = config.sweep.interval();
    let sweep_task = tokio::spawn({
        let sweep = Arc::clone(&sweep);
        async move { sweep.run(interval, shutdown_rx).await }
    });

    info!("Pencilbook running");
    shutdown_signal().await;

    shutdown_tx.send(()).ok();
    let grace = Duration::from_secs(config.server.shutdown_timeout);
    match tokio::time::timeout(grace, sweep_task).await {
        Ok(Ok(passes)) => info!(passes, "Expiry sweep stopped"),
        Ok(Err(e)) => warn!(error = %e, "Expiry sweep task panicked"),
        Err(_) => warn!(timeout_secs = grace.as_secs(), "Expiry sweep did not stop in time"),
    }

    info!("Pencilbook stopped");
    Ok(())
}

/// Waits for Ctrl+C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
