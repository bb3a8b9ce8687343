//! # Pencilbook Runtime
//!
//! The imperative shell around the reducers in `pencilbook-core`.
//!
//! ## Components
//!
//! - [`effects`]: executes effect descriptions returned by reducers
//! - [`retry`]: exponential backoff for transient storage failures
//! - [`metrics`]: Prometheus exporter and metric descriptions
//! - [`periodic`]: restartable interval loop with cooperative shutdown,
//!   used by the hold expiry sweep

/// Effect execution
pub mod effects;

/// Retry logic with exponential backoff
pub mod retry;

/// Prometheus metrics for observability
pub mod metrics;

/// Periodic background tasks with graceful shutdown
pub mod periodic;

pub use effects::execute;
pub use periodic::run_periodic;
pub use retry::{RetryPolicy, retry_with_backoff, retry_with_predicate};
