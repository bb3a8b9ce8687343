//! Venue collision policy.
//!
//! A stricter check than the category/city engine, scoped to holds only: no
//! two live holds may claim the same venue for overlapping time.

use crate::types::{Event, EventId, HoldId, HoldStatus, Location, PencilHold};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A hold's claim on a venue for its event's time range
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VenueClaim {
    /// The claiming hold
    pub hold_id: HoldId,
    /// The held event
    pub event_id: EventId,
    /// The hold's status when read
    pub status: HoldStatus,
    /// When the hold expires
    pub expires_at: DateTime<Utc>,
    /// Venue name
    pub venue_name: String,
    /// Venue address
    pub venue_address: String,
    /// Event start
    pub start_date: DateTime<Utc>,
    /// Event end (exclusive)
    pub end_date: DateTime<Utc>,
}

impl VenueClaim {
    /// The claim `hold` makes through `event`
    #[must_use]
    pub fn new(hold: &PencilHold, event: &Event) -> Self {
        Self {
            hold_id: hold.id,
            event_id: event.id,
            status: hold.status,
            expires_at: hold.expires_at,
            venue_name: event.location.name.clone(),
            venue_address: event.location.address.clone(),
            start_date: event.start_date,
            end_date: event.end_date,
        }
    }

    /// Still active and not past its expiry
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status.is_active() && now <= self.expires_at
    }

    fn at_venue(&self, location: &Location) -> bool {
        self.venue_name == location.name && self.venue_address == location.address
    }

    fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_date < end && self.end_date > start
    }
}

/// Rejects holds on a venue already claimed for overlapping time
#[derive(Clone, Copy, Debug, Default)]
pub struct VenueCollisionPolicy;

impl VenueCollisionPolicy {
    /// Live claims by other events at `event`'s venue that overlap it
    ///
    /// Claims on `event` itself are ignored; several organizers holding the
    /// same event is governed by capacity and per-user uniqueness instead.
    #[must_use]
    pub fn collisions(event: &Event, claims: &[VenueClaim], now: DateTime<Utc>) -> Vec<VenueClaim> {
        claims
            .iter()
            .filter(|claim| claim.event_id != event.id)
            .filter(|claim| claim.is_live(now))
            .filter(|claim| claim.at_venue(&event.location))
            .filter(|claim| claim.overlaps(event.start_date, event.end_date))
            .cloned()
            .collect()
    }
}
