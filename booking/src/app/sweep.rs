//! Expiry sweep.
//!
//! Ages out pending holds whose expiry has passed. Each due hold goes through
//! the same `expire_hold` command as any other transition, so a hold that was
//! confirmed or cancelled after the scan is skipped, and several instances
//! can sweep at once.

use super::service::PencilHoldService;
use crate::error::HoldError;
use crate::metrics;
use crate::store::BookingStore;
use pencilbook_runtime::periodic::run_periodic;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// Outcome of one sweep pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Holds moved to expired
    pub expired_count: usize,
    /// Holds that left pending before the sweep reached them
    pub skipped_count: usize,
    /// Holds that could not be expired this pass
    pub failed_count: usize,
}

/// Periodic expiry of lapsed pending holds
pub struct ExpirySweep<S> {
    service: Arc<PencilHoldService<S>>,
}

impl<S: BookingStore> ExpirySweep<S> {
    /// Creates a new `ExpirySweep`
    #[must_use]
    pub const fn new(service: Arc<PencilHoldService<S>>) -> Self {
        Self { service }
    }

    /// Expire every pending hold that is due
    ///
    /// A hold that fails is counted and left for the next pass.
    ///
    /// # Errors
    ///
    /// [`HoldError::Storage`] if the due holds cannot be listed.
    pub async fn run_once(&self) -> Result<SweepReport, HoldError> {
        let started = Instant::now();
        let due = self.service.pending_holds_due().await?;
        let mut report = SweepReport::default();

        for hold in due {
            match self.service.expire_hold(hold.id).await {
                Ok(Some(_)) => report.expired_count += 1,
                Ok(None) => report.skipped_count += 1,
                Err(error) => {
                    report.failed_count += 1;
                    tracing::warn!(hold_id = %hold.id, error = %error, "Failed to expire hold");
                },
            }
        }

        metrics::record_sweep(
            report.expired_count,
            report.skipped_count,
            report.failed_count,
            started.elapsed(),
        );
        if report != SweepReport::default() {
            tracing::info!(
                expired = report.expired_count,
                skipped = report.skipped_count,
                failed = report.failed_count,
                "Expiry sweep finished"
            );
        }

        Ok(report)
    }

    /// Sweep every `interval` until `shutdown` fires; returns the passes run
    pub async fn run(&self, interval: Duration, shutdown: broadcast::Receiver<()>) -> u64 {
        let sweep = self;
        run_periodic("expiry_sweep", interval, shutdown, move || async move {
            if let Err(error) = sweep.run_once().await {
                tracing::error!(error = %error, "Expiry sweep failed");
            }
        })
        .await
    }
}
