//! Aggregates for the booking domain.
//!
//! A pencil hold never changes alone: every transition also rewrites its
//! event's hold summary, so the hold reducer works over the event together
//! with all of its holds.

pub mod hold;

pub use hold::{BookingState, HoldEnvironment, PencilHoldAction, PencilHoldReducer};
