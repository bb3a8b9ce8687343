//! Business metrics for pencil holds.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `pencilbook_holds_total{transition}` - Committed transitions
//! - `pencilbook_hold_rejections_total{kind}` - Rejected commands by error kind
//! - `pencilbook_conflict_checks_total{result}` - Conflict checks by verdict
//! - `pencilbook_commit_retries_total{operation}` - Reloads after a version conflict
//! - `pencilbook_sweep_holds_total{outcome}` - Sweep results per hold
//!
//! ## Histograms
//! - `pencilbook_command_duration_seconds{operation}` - Load, reduce and commit
//! - `pencilbook_sweep_duration_seconds` - One sweep pass
//!
//! Descriptions are registered by the runtime's metrics server.

use crate::error::HoldError;
use crate::types::HoldOperation;
use metrics::{counter, histogram};
use std::time::Duration;

/// Record a committed transition
pub fn record_transition(operation: HoldOperation) {
    counter!("pencilbook_holds_total", "transition" => operation.as_str()).increment(1);
}

/// Record a rejected command
pub fn record_rejection(error: &HoldError) {
    counter!("pencilbook_hold_rejections_total", "kind" => error.kind()).increment(1);
}

/// Record a conflict check verdict
pub fn record_conflict_check(has_conflict: bool) {
    let result = if has_conflict { "conflict" } else { "clear" };
    counter!("pencilbook_conflict_checks_total", "result" => result).increment(1);
}

/// Record a retry after a version conflict
pub fn record_commit_retry(operation: HoldOperation) {
    counter!("pencilbook_commit_retries_total", "operation" => operation.as_str()).increment(1);
}

/// Record how long a command took
pub fn record_command_duration(operation: HoldOperation, elapsed: Duration) {
    histogram!("pencilbook_command_duration_seconds", "operation" => operation.as_str())
        .record(elapsed.as_secs_f64());
}

/// Record one sweep pass
pub fn record_sweep(expired: usize, skipped: usize, failed: usize, elapsed: Duration) {
    for (outcome, count) in [("expired", expired), ("skipped", skipped), ("failed", failed)] {
        counter!("pencilbook_sweep_holds_total", "outcome" => outcome)
            .increment(u64::try_from(count).unwrap_or(u64::MAX));
    }
    histogram!("pencilbook_sweep_duration_seconds").record(elapsed.as_secs_f64());
}
