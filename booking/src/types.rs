//! Domain types for pencil-hold reservations.
//!
//! The [`Event`] is the reservable resource and the [`PencilHold`] is a
//! time-limited claim on it. The event carries a denormalized summary of its
//! holds ([`PencilHoldInfo`], `pencil_hold_count`) which only the hold reducer
//! writes; the hold record stays the source of truth.

use crate::error::HoldError;
use chrono::{DateTime, Duration, NaiveTime, Timelike, Utc};
use pencilbook_core::version::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random `EventId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `EventId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a pencil hold
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HoldId(Uuid);

impl HoldId {
    /// Creates a new random `HoldId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `HoldId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for HoldId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HoldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a user (organizer or administrator)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random `UserId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `UserId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an event category
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryId(Uuid);

impl CategoryId {
    /// Creates a new random `CategoryId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `CategoryId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for CategoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of record, used in not-found and version-conflict errors
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// An event record
    Event,
    /// A pencil hold record
    Hold,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event => write!(f, "event"),
            Self::Hold => write!(f, "pencil hold"),
        }
    }
}

// ============================================================================
// Statuses
// ============================================================================

/// Publication status of an event
///
/// Exactly one status holds at a time. It is where the CRUD lifecycle and
/// the reservation lifecycle meet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Being written by the organizer
    Draft,
    /// At least one pending pencil hold
    PencilHold,
    /// At least one confirmed pencil hold
    PencilHoldConfirmed,
    /// Submitted for admin review
    PendingApproval,
    /// Live on the public calendar
    Published,
    /// Refused by an administrator
    Rejected,
    /// Taken off the calendar
    Unpublished,
    /// Called off
    Cancelled,
    /// Took place
    Completed,
    /// Removed by its organizer
    Deleted,
}

impl EventStatus {
    /// All statuses, in lifecycle order
    pub const ALL: [Self; 10] = [
        Self::Draft,
        Self::PencilHold,
        Self::PencilHoldConfirmed,
        Self::PendingApproval,
        Self::Published,
        Self::Rejected,
        Self::Unpublished,
        Self::Cancelled,
        Self::Completed,
        Self::Deleted,
    ];

    /// Wire name of the status
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PencilHold => "pencil_hold",
            Self::PencilHoldConfirmed => "pencil_hold_confirmed",
            Self::PendingApproval => "pending_approval",
            Self::Published => "published",
            Self::Rejected => "rejected",
            Self::Unpublished => "unpublished",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
            Self::Deleted => "deleted",
        }
    }

    /// Whether events in this status take part in conflict detection
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::Draft
                | Self::Published
                | Self::PencilHold
                | Self::PencilHoldConfirmed
                | Self::PendingApproval
        )
    }

    /// Whether the status is derived from the event's holds
    ///
    /// Only these statuses are rewritten when holds change; an event that an
    /// administrator moved elsewhere keeps its status.
    #[must_use]
    pub const fn is_hold_driven(self) -> bool {
        matches!(self, Self::Draft | Self::PencilHold | Self::PencilHoldConfirmed)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = HoldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| HoldError::Validation(format!("unknown event status '{s}'")))
    }
}

/// Lifecycle status of a pencil hold
///
/// ```text
/// (none) --create--> pending
/// pending --confirm--> confirmed
/// pending --cancel--> cancelled
/// pending --expire--> expired
/// confirmed --approve--> converted
/// confirmed --cancel--> cancelled
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldStatus {
    /// Waiting for the organizer to confirm
    Pending,
    /// Confirmed by the organizer, waiting for admin approval
    Confirmed,
    /// Approved; the event is published
    Converted,
    /// Called off by a user
    Cancelled,
    /// Aged out while pending
    Expired,
}

impl HoldStatus {
    /// Wire name of the status
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Converted => "converted",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    /// Pending or confirmed: the hold still claims its slot
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    /// No transition leaves a terminal status
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Converted | Self::Cancelled | Self::Expired)
    }
}

impl fmt::Display for HoldStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations on a pencil hold, for errors, logs and metric labels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldOperation {
    /// Create a new hold
    Create,
    /// Organizer confirmation
    Confirm,
    /// Admin approval
    Approve,
    /// Cancellation
    Cancel,
    /// Push the expiry forward
    Extend,
    /// Time-driven expiry
    Expire,
}

impl HoldOperation {
    /// Label used in logs and metrics
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Confirm => "confirm",
            Self::Approve => "approve",
            Self::Cancel => "cancel",
            Self::Extend => "extend",
            Self::Expire => "expire",
        }
    }
}

impl fmt::Display for HoldOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Value Objects
// ============================================================================

/// Local time of day, written `HH:MM` or `HH:MM:SS`
///
/// Refines a day-level event range: a three-day festival running `10:00` to
/// `18:00` only occupies those hours on each of its days.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(NaiveTime);

impl ClockTime {
    /// Build from hour and minute
    ///
    /// # Errors
    ///
    /// Returns [`HoldError::Validation`] for an impossible time.
    pub fn from_hm(hour: u32, minute: u32) -> Result<Self, HoldError> {
        NaiveTime::from_hms_opt(hour, minute, 0)
            .map(Self)
            .ok_or_else(|| HoldError::Validation(format!("invalid clock time {hour}:{minute}")))
    }

    /// The wrapped time of day
    #[must_use]
    pub const fn as_naive(self) -> NaiveTime {
        self.0
    }
}

impl FromStr for ClockTime {
    type Err = HoldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        NaiveTime::parse_from_str(s, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
            .map(Self)
            .map_err(|_| HoldError::Validation(format!("invalid clock time '{s}', expected HH:MM")))
    }
}

impl TryFrom<String> for ClockTime {
    type Error = HoldError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(time: ClockTime) -> Self {
        time.to_string()
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.second() == 0 {
            write!(f, "{}", self.0.format("%H:%M"))
        } else {
            write!(f, "{}", self.0.format("%H:%M:%S"))
        }
    }
}

/// Hold priority, 0 to 10
///
/// Higher priority wins tie-breaks in listings and decides which hold the
/// event's summary mirrors. It never resolves a schedule conflict.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    /// Highest allowed priority
    pub const MAX: u8 = 10;

    /// Create a priority
    ///
    /// # Errors
    ///
    /// Returns [`HoldError::Validation`] if `value` exceeds [`Priority::MAX`].
    pub fn new(value: u8) -> Result<Self, HoldError> {
        if value > Self::MAX {
            return Err(HoldError::Validation(format!(
                "priority must be between 0 and {}, got {value}",
                Self::MAX
            )));
        }
        Ok(Self(value))
    }

    /// Numeric value
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Priority {
    type Error = HoldError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.0
    }
}

/// Geographic coordinates of a venue
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
}

/// Where an event takes place
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Venue name
    pub name: String,
    /// Street address
    pub address: String,
    /// City; scopes category conflicts
    pub city: String,
    /// Optional map position
    pub coordinates: Option<Coordinates>,
}

impl Location {
    /// Creates a location without coordinates
    #[must_use]
    pub fn new(name: impl Into<String>, address: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            city: city.into(),
            coordinates: None,
        }
    }

    /// Same venue: exact name and address
    #[must_use]
    pub fn same_venue(&self, other: &Self) -> bool {
        self.name == other.name && self.address == other.address
    }
}

// ============================================================================
// Entities
// ============================================================================

/// Summary of an event's primary active hold, stored on the event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PencilHoldInfo {
    /// The mirrored hold
    pub pencil_hold_id: HoldId,
    /// When it expires
    pub expires_at: DateTime<Utc>,
    /// Organizer notes
    pub notes: Option<String>,
    /// Its priority
    pub priority: Priority,
}

impl From<&PencilHold> for PencilHoldInfo {
    fn from(hold: &PencilHold) -> Self {
        Self {
            pencil_hold_id: hold.id,
            expires_at: hold.expires_at,
            notes: hold.notes.clone(),
            priority: hold.priority,
        }
    }
}

/// A reservable event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event ID
    pub id: EventId,
    /// URL slug
    pub slug: String,
    /// Title
    pub title: String,
    /// Organizer who owns the event
    pub organizer: UserId,
    /// Category; scopes conflicts
    pub category: CategoryId,
    /// Venue and city
    pub location: Location,
    /// Start instant
    pub start_date: DateTime<Utc>,
    /// End instant (exclusive)
    pub end_date: DateTime<Utc>,
    /// Daily start time, refining `start_date` on each day
    pub start_time: Option<ClockTime>,
    /// Daily end time, refining `end_date` on each day
    pub end_time: Option<ClockTime>,
    /// Last moment to register
    pub registration_deadline: Option<DateTime<Utc>>,
    /// Seats; `None` is unlimited
    pub capacity: Option<u32>,
    /// Seats taken
    pub registration_count: u32,
    /// Publication status
    pub status: EventStatus,
    /// Number of pending or confirmed holds
    pub pencil_hold_count: u32,
    /// Mirror of the primary active hold
    pub pencil_hold_info: Option<PencilHoldInfo>,
    /// When an administrator approved it
    pub approved_at: Option<DateTime<Utc>>,
    /// Who approved it
    pub approved_by: Option<UserId>,
    /// Soft-delete marker
    pub deleted_at: Option<DateTime<Utc>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Creates a draft event with unlimited capacity
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        organizer: UserId,
        category: CategoryId,
        location: Location,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let title = title.into();
        Self {
            id: EventId::new(),
            slug: slugify(&title),
            title,
            organizer,
            category,
            location,
            start_date,
            end_date,
            start_time: None,
            end_time: None,
            registration_deadline: None,
            capacity: None,
            registration_count: 0,
            status: EventStatus::Draft,
            pencil_hold_count: 0,
            pencil_hold_info: None,
            approved_at: None,
            approved_by: None,
            deleted_at: None,
            created_at,
            updated_at: created_at,
        }
    }

    /// Sets the daily clock times
    #[must_use]
    pub const fn with_clock_times(mut self, start: Option<ClockTime>, end: Option<ClockTime>) -> Self {
        self.start_time = start;
        self.end_time = end;
        self
    }

    /// Sets a seat limit
    #[must_use]
    pub const fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Sets the status
    #[must_use]
    pub const fn with_status(mut self, status: EventStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the registration deadline
    #[must_use]
    pub const fn with_registration_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.registration_deadline = Some(deadline);
        self
    }

    /// Checks the scheduling invariants
    ///
    /// # Errors
    ///
    /// Returns [`HoldError::Validation`] unless `end_date > start_date` and
    /// the registration deadline is not after the start.
    pub fn validate(&self) -> Result<(), HoldError> {
        if self.end_date <= self.start_date {
            return Err(HoldError::Validation(format!(
                "event {} ends at {} which is not after its start {}",
                self.id, self.end_date, self.start_date
            )));
        }
        if let Some(deadline) = self.registration_deadline {
            if deadline > self.start_date {
                return Err(HoldError::Validation(format!(
                    "event {} registration deadline {deadline} is after its start",
                    self.id
                )));
            }
        }
        Ok(())
    }

    /// Lasts 24 hours or more
    #[must_use]
    pub fn is_all_day(&self) -> bool {
        self.end_date - self.start_date >= Duration::hours(24)
    }

    /// Unlimited, or fewer registrations than seats
    #[must_use]
    pub fn has_capacity(&self) -> bool {
        self.capacity
            .is_none_or(|capacity| self.registration_count < capacity)
    }

    /// Soft-deleted
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// A soft, time-limited reservation on an event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PencilHold {
    /// Hold ID
    pub id: HoldId,
    /// The event being held
    pub event_id: EventId,
    /// Requesting organizer
    pub user_id: UserId,
    /// Stored status; see [`PencilHold::effective_status`]
    pub status: HoldStatus,
    /// Listing priority
    pub priority: Priority,
    /// Organizer notes
    pub notes: Option<String>,
    /// When the hold ages out if still pending
    pub expires_at: DateTime<Utc>,
    /// When the organizer confirmed
    pub confirmed_at: Option<DateTime<Utc>>,
    /// When an administrator approved
    pub approved_at: Option<DateTime<Utc>>,
    /// Approving administrator
    pub approved_by: Option<UserId>,
    /// When it was cancelled
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Why it was cancelled
    pub cancellation_reason: Option<String>,
    /// When the sweep expired it
    pub expired_at: Option<DateTime<Utc>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl PencilHold {
    /// Creates a pending hold
    #[must_use]
    pub const fn new(
        id: HoldId,
        event_id: EventId,
        user_id: UserId,
        priority: Priority,
        notes: Option<String>,
        expires_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            event_id,
            user_id,
            status: HoldStatus::Pending,
            priority,
            notes,
            expires_at,
            confirmed_at: None,
            approved_at: None,
            approved_by: None,
            cancelled_at: None,
            cancellation_reason: None,
            expired_at: None,
            created_at,
            updated_at: created_at,
        }
    }

    /// Past its expiry
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Status as readers should see it
    ///
    /// A pending hold past its expiry reads as expired before the sweep gets
    /// to it.
    #[must_use]
    pub fn effective_status(&self, now: DateTime<Utc>) -> HoldStatus {
        if self.status == HoldStatus::Pending && self.is_expired(now) {
            HoldStatus::Expired
        } else {
            self.status
        }
    }
}

/// Input to conflict detection
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProposedEvent {
    /// Category to scope by
    pub category: CategoryId,
    /// City to scope by
    pub city: String,
    /// Start instant
    pub start_date: DateTime<Utc>,
    /// End instant (exclusive)
    pub end_date: DateTime<Utc>,
    /// Optional daily start time
    pub start_time: Option<ClockTime>,
    /// Optional daily end time
    pub end_time: Option<ClockTime>,
}

impl ProposedEvent {
    /// Creates a proposal without clock times
    #[must_use]
    pub fn new(
        category: CategoryId,
        city: impl Into<String>,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Self {
        Self {
            category,
            city: city.into(),
            start_date,
            end_date,
            start_time: None,
            end_time: None,
        }
    }

    /// Sets the daily clock times
    #[must_use]
    pub const fn with_clock_times(mut self, start: Option<ClockTime>, end: Option<ClockTime>) -> Self {
        self.start_time = start;
        self.end_time = end;
        self
    }

    /// The proposal an existing event makes
    #[must_use]
    pub fn from_event(event: &Event) -> Self {
        Self {
            category: event.category,
            city: event.location.city.clone(),
            start_date: event.start_date,
            end_date: event.end_date,
            start_time: event.start_time,
            end_time: event.end_time,
        }
    }

    /// Lasts 24 hours or more
    #[must_use]
    pub fn is_all_day(&self) -> bool {
        self.end_date - self.start_date >= Duration::hours(24)
    }

    /// Rejects zero and negative durations
    ///
    /// # Errors
    ///
    /// Returns [`HoldError::Validation`] unless `end_date > start_date`.
    pub fn validate(&self) -> Result<(), HoldError> {
        if self.end_date <= self.start_date {
            return Err(HoldError::Validation(
                "proposed event must end after it starts".to_string(),
            ));
        }
        Ok(())
    }
}

/// A stored record and the version it was read at
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    /// The record
    pub value: T,
    /// Its version
    pub version: Version,
}

impl<T> Versioned<T> {
    /// Wraps a record
    #[must_use]
    pub const fn new(value: T, version: Version) -> Self {
        Self { value, version }
    }
}

fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
