//! Application layer: the command/query service and the expiry sweep.

pub mod service;
pub mod sweep;

pub use service::{CreateHoldRequest, PencilHoldService};
pub use sweep::{ExpirySweep, SweepReport};
