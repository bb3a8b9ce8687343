//! Error types for pencil holds and the record store.

use crate::conflict::{ConflictingEvent, VenueClaim};
use crate::types::{EntityKind, EventId, EventStatus, HoldId, HoldOperation, HoldStatus, UserId};
use chrono::{DateTime, Utc};
use pencilbook_core::version::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Which conflict policy rejected a hold
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictScope {
    /// Same category and city, overlapping time
    CategoryCity,
    /// Same venue held by another active hold, overlapping time
    Venue,
}

impl fmt::Display for ConflictScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CategoryCity => write!(f, "category/city"),
            Self::Venue => write!(f, "venue"),
        }
    }
}

/// Errors returned by pencil-hold operations.
///
/// Every variant except [`HoldError::Storage`] and
/// [`HoldError::ConcurrentModification`] is a user-facing outcome that the
/// calling layer translates into a response.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HoldError {
    /// Malformed input
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Overlaps other events or holds
    #[error(
        "Schedule conflict ({scope}): {} conflicting event(s), {} conflicting hold(s)",
        .events.len(),
        .holds.len()
    )]
    ScheduleConflict {
        /// Policy that found the conflict
        scope: ConflictScope,
        /// Conflicting events (category/city scope)
        events: Vec<ConflictingEvent>,
        /// Conflicting holds (venue scope)
        holds: Vec<VenueClaim>,
    },

    /// No seats left
    #[error("Event {event_id} is at capacity ({registrations}/{capacity})")]
    CapacityExceeded {
        /// The full event
        event_id: EventId,
        /// Seats
        capacity: u32,
        /// Registrations
        registrations: u32,
    },

    /// The user already holds this event
    #[error("User {user_id} already has a pencil hold on event {event_id}")]
    DuplicateHold {
        /// The event
        event_id: EventId,
        /// The user
        user_id: UserId,
    },

    /// The hold aged out
    #[error("Pencil hold {hold_id} expired at {expires_at}")]
    HoldExpired {
        /// The hold
        hold_id: HoldId,
        /// When it expired
        expires_at: DateTime<Utc>,
    },

    /// The transition table forbids this operation
    #[error("Cannot {action} pencil hold {hold_id} in status {from}")]
    InvalidStateTransition {
        /// The hold
        hold_id: HoldId,
        /// Its current status
        from: HoldStatus,
        /// Attempted operation
        action: HoldOperation,
    },

    /// Missing event or hold
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of record
        entity: EntityKind,
        /// Its ID
        id: String,
    },

    /// Second cancellation of the same hold
    #[error("Pencil hold {hold_id} is already cancelled")]
    AlreadyCancelled {
        /// The hold
        hold_id: HoldId,
    },

    /// Only the creator may confirm a hold
    #[error("User {user_id} does not own pencil hold {hold_id}")]
    NotHoldOwner {
        /// The hold
        hold_id: HoldId,
        /// The requesting user
        user_id: UserId,
    },

    /// The event's status does not accept holds
    #[error("Event {event_id} in status {status} is not eligible for a pencil hold")]
    IneligibleEvent {
        /// The event
        event_id: EventId,
        /// Its status
        status: EventStatus,
    },

    /// Optimistic retries ran out
    #[error("Concurrent modification: gave up after {attempts} attempt(s)")]
    ConcurrentModification {
        /// Commits attempted
        attempts: usize,
    },

    /// The store failed
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl HoldError {
    /// Creates a not-found error for an event
    #[must_use]
    pub fn event_not_found(id: EventId) -> Self {
        Self::NotFound {
            entity: EntityKind::Event,
            id: id.to_string(),
        }
    }

    /// Creates a not-found error for a hold
    #[must_use]
    pub fn hold_not_found(id: HoldId) -> Self {
        Self::NotFound {
            entity: EntityKind::Hold,
            id: id.to_string(),
        }
    }

    /// User-facing outcome rather than an infrastructure failure
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Storage(_) | Self::ConcurrentModification { .. })
    }

    /// Short label for metrics
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::ScheduleConflict { .. } => "schedule_conflict",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::DuplicateHold { .. } => "duplicate_hold",
            Self::HoldExpired { .. } => "hold_expired",
            Self::InvalidStateTransition { .. } => "invalid_state_transition",
            Self::NotFound { .. } => "not_found",
            Self::AlreadyCancelled { .. } => "already_cancelled",
            Self::NotHoldOwner { .. } => "not_hold_owner",
            Self::IneligibleEvent { .. } => "ineligible_event",
            Self::ConcurrentModification { .. } => "concurrent_modification",
            Self::Storage(_) => "storage",
        }
    }
}

/// Errors from the record store
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreError {
    /// The record changed since it was read
    #[error("Version conflict on {entity} {id}: expected {expected:?}, found {actual:?}")]
    VersionConflict {
        /// Kind of record
        entity: EntityKind,
        /// Its ID
        id: String,
        /// Version the writer read (`None` for an insert)
        expected: Option<Version>,
        /// Version in the store (`None` if absent)
        actual: Option<Version>,
    },

    /// A second hold for the same event and user
    #[error("Unique violation: user {user_id} already holds event {event_id}")]
    UniqueViolation {
        /// The event
        event_id: EventId,
        /// The user
        user_id: UserId,
    },

    /// Transient failure; safe to retry
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Worth retrying at the adapter level
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
