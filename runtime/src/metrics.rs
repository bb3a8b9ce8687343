//! Prometheus metrics for observability and monitoring.
//!
//! Metric names are described here once so every crate records into the same
//! registry. Recording happens through the `metrics` facade macros; nothing is
//! exported until [`MetricsServer::start`] installs the Prometheus recorder.
//!
//! # Example
//!
//! ```rust,no_run
//! use pencilbook_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use thiserror::Error;

// Re-export metrics macros for use in other crates
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics server.
///
/// Exposes metrics on an HTTP endpoint for Prometheus scraping.
#[derive(Debug)]
pub struct MetricsServer {
    addr: SocketAddr,
    started: bool,
}

impl MetricsServer {
    /// Create a new metrics server bound to `addr` once started.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            started: false,
        }
    }

    /// Address the exporter listens on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Whether the exporter has been installed.
    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.started
    }

    /// Describe all metrics and install the Prometheus exporter.
    ///
    /// Must be called from within a Tokio runtime; the exporter spawns its
    /// HTTP listener on it.
    ///
    /// # Errors
    ///
    /// Returns an error if the exporter cannot be configured or another
    /// recorder is already installed.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?
            .install()
            .map_err(|e| MetricsError::Install(e.to_string()))?;

        self.started = true;
        tracing::info!(addr = %self.addr, "Metrics exporter listening");
        Ok(())
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        "pencilbook_holds_total",
        "Pencil hold transitions committed, labelled by transition"
    );
    describe_counter!(
        "pencilbook_hold_rejections_total",
        "Pencil hold commands rejected, labelled by error kind"
    );
    describe_counter!(
        "pencilbook_conflict_checks_total",
        "Conflict detection runs, labelled by result"
    );
    describe_counter!(
        "pencilbook_commit_retries_total",
        "Optimistic concurrency retries after a version conflict"
    );
    describe_counter!(
        "pencilbook_sweep_holds_total",
        "Holds processed by the expiry sweep, labelled by outcome"
    );
    describe_histogram!(
        "pencilbook_sweep_duration_seconds",
        "Time taken by one expiry sweep pass"
    );
    describe_histogram!(
        "pencilbook_command_duration_seconds",
        "Time taken to load, reduce and commit one hold command"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_server_is_not_started() {
        let server = MetricsServer::new(SocketAddr::from(([127, 0, 0, 1], 9464)));
        assert!(!server.is_started());
        assert_eq!(server.addr().port(), 9464);
    }

    #[test]
    fn describing_without_recorder_is_harmless() {
        register_metrics();
        counter!("pencilbook_holds_total", "transition" => "created").increment(1);
    }
}
