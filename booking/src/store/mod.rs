//! Event record store and hold store.
//!
//! Records are returned as [`Versioned`] snapshots. A hold command writes
//! back through [`BookingStore::commit`], stating the version it read for
//! every record it touches; the store applies the whole [`UnitOfWork`] or
//! nothing.

pub mod memory;
pub mod retrying;

pub use memory::InMemoryBookingStore;
pub use retrying::RetryingStore;

use crate::conflict::{CityMatch, VenueClaim};
use crate::error::StoreError;
use crate::types::{CategoryId, Event, EventId, HoldId, HoldStatus, PencilHold, UserId, Versioned};
use chrono::{DateTime, Duration, Utc};
use pencilbook_core::version::Version;
use std::future::Future;

/// Which side of a cutoff a hold's expiry must fall on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpiryFilter {
    /// `expires_at <= cutoff` (due for the sweep)
    AtOrBefore(DateTime<Utc>),
    /// `expires_at > cutoff` (still live)
    After(DateTime<Utc>),
}

impl ExpiryFilter {
    /// Whether `expires_at` passes the filter
    #[must_use]
    pub fn matches(self, expires_at: DateTime<Utc>) -> bool {
        match self {
            Self::AtOrBefore(cutoff) => expires_at <= cutoff,
            Self::After(cutoff) => expires_at > cutoff,
        }
    }
}

/// Half-open instant range `[start, end)` for candidate queries
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateRange {
    /// Inclusive start
    pub start: DateTime<Utc>,
    /// Exclusive end
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Creates a new `DateRange`
    #[must_use]
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// `[start - margin, end + margin)`
    #[must_use]
    pub fn around(start: DateTime<Utc>, end: DateTime<Utc>, margin: Duration) -> Self {
        Self::new(start - margin, end + margin)
    }

    /// Whether `[start, end)` intersects the range
    #[must_use]
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end && end > self.start
    }
}

/// A hold write with the version it was read at
#[derive(Clone, Debug, PartialEq)]
pub struct HoldWrite {
    /// New hold record
    pub hold: PencilHold,
    /// Version read; `None` inserts
    pub expected: Option<Version>,
}

/// Records written together by one hold command
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnitOfWork {
    /// Event update with the version it was read at
    pub event: Option<(Event, Version)>,
    /// Hold inserts and updates
    pub holds: Vec<HoldWrite>,
}

impl UnitOfWork {
    /// An empty unit of work
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the event update
    #[must_use]
    pub fn with_event(mut self, event: Event, expected: Version) -> Self {
        self.event = Some((event, expected));
        self
    }

    /// Adds a hold write
    #[must_use]
    pub fn with_hold(mut self, hold: PencilHold, expected: Option<Version>) -> Self {
        self.holds.push(HoldWrite { hold, expected });
        self
    }

    /// Nothing to write
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.event.is_none() && self.holds.is_empty()
    }
}

/// Storage for events and pencil holds
///
/// # Errors
///
/// Every method fails with [`StoreError::Unavailable`] when the backend
/// cannot be reached. Writes also report [`StoreError::VersionConflict`] and
/// [`StoreError::UniqueViolation`].
pub trait BookingStore: Send + Sync {
    /// Get an event, deleted or not
    fn get_event(
        &self,
        id: EventId,
    ) -> impl Future<Output = Result<Option<Versioned<Event>>, StoreError>> + Send;

    /// Insert (`expected = None`) or update an event; returns the new version
    fn save_event(
        &self,
        event: Event,
        expected: Option<Version>,
    ) -> impl Future<Output = Result<Version, StoreError>> + Send;

    /// Get a hold
    fn get_hold(
        &self,
        id: HoldId,
    ) -> impl Future<Output = Result<Option<Versioned<PencilHold>>, StoreError>> + Send;

    /// Every hold on an event, any status
    fn holds_for_event(
        &self,
        event_id: EventId,
    ) -> impl Future<Output = Result<Vec<Versioned<PencilHold>>, StoreError>> + Send;

    /// The hold a user placed on an event, any status
    fn find_hold_by_event_and_user(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<Versioned<PencilHold>>, StoreError>> + Send;

    /// Holds in one of `statuses` whose expiry passes `filter`
    fn find_holds_by_status_and_expiry(
        &self,
        statuses: &[HoldStatus],
        filter: ExpiryFilter,
    ) -> impl Future<Output = Result<Vec<PencilHold>, StoreError>> + Send;

    /// Active, undeleted events of a category in a city that touch `range`
    fn find_active_events_by_category_and_city(
        &self,
        category: CategoryId,
        city: &str,
        city_match: CityMatch,
        range: DateRange,
    ) -> impl Future<Output = Result<Vec<Event>, StoreError>> + Send;

    /// Venue claims of every live hold
    fn find_active_venue_claims(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<VenueClaim>, StoreError>> + Send;

    /// Flag an event deleted; returns false if it does not exist
    fn soft_delete_event(
        &self,
        id: EventId,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Remove an event together with its holds; returns the holds removed
    fn purge_event(&self, id: EventId) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Apply a unit of work atomically
    fn commit(&self, work: UnitOfWork) -> impl Future<Output = Result<(), StoreError>> + Send;
}
