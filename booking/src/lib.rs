//! Pencil holds for community events.
//!
//! A pencil hold is a soft, time-limited reservation an organizer places on
//! an event slot before the event is confirmed. This crate provides:
//!
//! - **Conflict detection**: same-category, same-city overlap with a
//!   setup/teardown buffer, all-day and multi-day handling
//!   ([`conflict::ConflictDetectionEngine`]), plus a stricter venue check
//!   scoped to live holds ([`conflict::VenueCollisionPolicy`])
//! - **The hold state machine**: a reducer that validates every transition
//!   and keeps the owning event's hold count, hold summary and status in step
//!   ([`aggregates::PencilHoldReducer`])
//! - **Consistent writes**: each command commits the hold and its event as
//!   one versioned unit, retrying on conflict ([`app::PencilHoldService`])
//! - **Expiry**: a periodic sweep that ages out lapsed pending holds
//!   ([`app::ExpirySweep`])
//!
//! # Lifecycle
//!
//! ```text
//! (none) --create--> pending --confirm--> confirmed --approve--> converted
//!                       |                     |                  (event published)
//!                       |--cancel--+          +--cancel--> cancelled
//!                       +--expire (time)--> expired
//! ```

pub mod aggregates;
pub mod app;
pub mod config;
pub mod conflict;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod store;
pub mod types;

pub use aggregates::{BookingState, HoldEnvironment, PencilHoldAction, PencilHoldReducer};
pub use app::{CreateHoldRequest, ExpirySweep, PencilHoldService, SweepReport};
pub use config::Config;
pub use conflict::{ConflictDetectionEngine, ConflictResult};
pub use error::{HoldError, StoreError};
pub use notify::{HoldNotification, Notifier, TracingNotifier};
pub use store::{BookingStore, InMemoryBookingStore, RetryingStore};
