//! Pencil-hold state machine.
//!
//! Validates hold commands against the transition table and records the
//! resulting events:
//!
//! ```text
//! (none) --create--> pending
//! pending --confirm--> confirmed
//! pending --cancel--> cancelled
//! pending --expire (time)--> expired
//! confirmed --approve--> converted      (event -> published)
//! confirmed --cancel--> cancelled
//! ```
//!
//! [`PencilHoldReducer::apply_event`] is the only code that changes a hold,
//! and [`PencilHoldReducer::sync_event_projection`] the only code that writes
//! the event's `pencil_hold_count`, `pencil_hold_info` and hold-driven status.
//! API handlers and the expiry sweep both go through here.

use crate::config::HoldConfig;
use crate::conflict::{ConflictDetectionEngine, VenueClaim, VenueCollisionPolicy};
use crate::error::{ConflictScope, HoldError};
use crate::notify::{HoldNotification, NotificationKind, Notifier};
use crate::types::{
    Event, EventId, EventStatus, HoldId, HoldOperation, HoldStatus, PencilHold, PencilHoldInfo,
    Priority, ProposedEvent, UserId,
};
use chrono::{DateTime, Duration, Utc};
use pencilbook_core::{SmallVec, effect::Effect, environment::Clock, reducer::Reducer, smallvec};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Days added by an extension that names no length
pub const DEFAULT_EXTENSION_DAYS: u32 = 7;

/// Reason recorded when a cancellation gives none
pub const DEFAULT_CANCELLATION_REASON: &str = "Cancelled by organizer";

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// Actions for the pencil-hold state machine
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PencilHoldAction {
    // Commands
    /// Place a hold on an event
    CreateHold {
        /// ID for the new hold
        hold_id: HoldId,
        /// Event to hold
        event_id: EventId,
        /// Requesting organizer
        user_id: UserId,
        /// Organizer notes
        notes: Option<String>,
        /// Priority, 0 to 10
        priority: u8,
        /// Explicit expiry; defaults to the configured duration
        expires_at: Option<DateTime<Utc>>,
    },

    /// Organizer confirms their hold
    ConfirmHold {
        /// Hold ID
        hold_id: HoldId,
        /// Requesting user
        user_id: UserId,
    },

    /// Administrator approves a confirmed hold
    ApproveHold {
        /// Hold ID
        hold_id: HoldId,
        /// Approving administrator
        approved_by: UserId,
    },

    /// Cancel a pending or confirmed hold
    CancelHold {
        /// Hold ID
        hold_id: HoldId,
        /// Why
        reason: Option<String>,
    },

    /// Push a pending hold's expiry forward
    ExtendHold {
        /// Hold ID
        hold_id: HoldId,
        /// Days to add
        days: Option<u32>,
    },

    /// Age out a pending hold whose expiry has passed
    ExpireHold {
        /// Hold ID
        hold_id: HoldId,
    },

    // Events
    /// Hold was placed
    HoldCreated {
        /// The new hold
        hold: PencilHold,
    },

    /// Hold was confirmed
    HoldConfirmed {
        /// Hold ID
        hold_id: HoldId,
        /// When
        confirmed_at: DateTime<Utc>,
    },

    /// Hold was approved and its event published
    HoldConverted {
        /// Hold ID
        hold_id: HoldId,
        /// Approving administrator
        approved_by: UserId,
        /// When
        approved_at: DateTime<Utc>,
    },

    /// Hold was cancelled
    HoldCancelled {
        /// Hold ID
        hold_id: HoldId,
        /// Why
        reason: String,
        /// When
        cancelled_at: DateTime<Utc>,
    },

    /// Hold expiry moved
    HoldExtended {
        /// Hold ID
        hold_id: HoldId,
        /// New expiry
        expires_at: DateTime<Utc>,
        /// When
        extended_at: DateTime<Utc>,
    },

    /// Hold aged out
    HoldExpired {
        /// Hold ID
        hold_id: HoldId,
        /// When
        expired_at: DateTime<Utc>,
    },

    /// A command failed validation
    CommandRejected {
        /// Why
        error: HoldError,
    },
}

impl PencilHoldAction {
    /// Operation a command performs; `None` for events
    #[must_use]
    pub const fn operation(&self) -> Option<HoldOperation> {
        match self {
            Self::CreateHold { .. } => Some(HoldOperation::Create),
            Self::ConfirmHold { .. } => Some(HoldOperation::Confirm),
            Self::ApproveHold { .. } => Some(HoldOperation::Approve),
            Self::CancelHold { .. } => Some(HoldOperation::Cancel),
            Self::ExtendHold { .. } => Some(HoldOperation::Extend),
            Self::ExpireHold { .. } => Some(HoldOperation::Expire),
            _ => None,
        }
    }
}

// ============================================================================
// State
// ============================================================================

/// Working set for one hold command
///
/// The owning event with every hold on it. Creation also needs the
/// candidates for both conflict policies.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BookingState {
    /// The event the holds belong to
    pub event: Option<Event>,
    /// Every hold on the event, any status
    pub holds: HashMap<HoldId, PencilHold>,
    /// Live holds on other events, for the venue policy
    pub venue_claims: Vec<VenueClaim>,
    /// Same category and city events, for the conflict engine
    pub schedule_candidates: Vec<Event>,
    /// Error from the last command
    pub last_error: Option<HoldError>,
}

impl BookingState {
    /// State for an event and its holds
    #[must_use]
    pub fn new(event: Option<Event>, holds: impl IntoIterator<Item = PencilHold>) -> Self {
        Self {
            event,
            holds: holds.into_iter().map(|hold| (hold.id, hold)).collect(),
            ..Self::default()
        }
    }

    /// Adds the conflict candidates creation checks against
    #[must_use]
    pub fn with_schedule(mut self, candidates: Vec<Event>, claims: Vec<VenueClaim>) -> Self {
        self.schedule_candidates = candidates;
        self.venue_claims = claims;
        self
    }

    /// Get a hold by ID
    #[must_use]
    pub fn hold(&self, hold_id: &HoldId) -> Option<&PencilHold> {
        self.holds.get(hold_id)
    }

    /// Pending and confirmed holds
    pub fn active_holds(&self) -> impl Iterator<Item = &PencilHold> {
        self.holds.values().filter(|hold| hold.status.is_active())
    }

    /// The active hold the event mirrors: highest priority, then earliest
    #[must_use]
    pub fn primary_hold(&self) -> Option<&PencilHold> {
        primary(self.active_holds())
    }
}

fn primary<'a>(holds: impl Iterator<Item = &'a PencilHold>) -> Option<&'a PencilHold> {
    holds.max_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| b.id.cmp(&a.id))
    })
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the pencil-hold reducer
#[derive(Clone)]
pub struct HoldEnvironment {
    /// Clock for timestamps and expiry
    pub clock: Arc<dyn Clock>,
    /// Delivery of hold notifications
    pub notifier: Arc<dyn Notifier>,
    /// Hold rules
    pub config: HoldConfig,
    /// Category/city conflict detection
    pub engine: ConflictDetectionEngine,
}

impl HoldEnvironment {
    /// Creates a new `HoldEnvironment`
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        config: HoldConfig,
        engine: ConflictDetectionEngine,
    ) -> Self {
        Self {
            clock,
            notifier,
            config,
            engine,
        }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the pencil-hold state machine
#[derive(Clone, Debug, Default)]
pub struct PencilHoldReducer;

impl PencilHoldReducer {
    /// Creates a new `PencilHoldReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn live_event(state: &BookingState, event_id: EventId) -> Result<&Event, HoldError> {
        state
            .event
            .as_ref()
            .filter(|event| event.id == event_id && !event.is_deleted())
            .ok_or_else(|| HoldError::event_not_found(event_id))
    }

    fn existing_hold(state: &BookingState, hold_id: HoldId) -> Result<&PencilHold, HoldError> {
        state.hold(&hold_id).ok_or_else(|| HoldError::hold_not_found(hold_id))
    }

    fn require_capacity(event: &Event) -> Result<(), HoldError> {
        if event.has_capacity() {
            Ok(())
        } else {
            Err(HoldError::CapacityExceeded {
                event_id: event.id,
                capacity: event.capacity.unwrap_or_default(),
                registrations: event.registration_count,
            })
        }
    }

    const fn invalid(hold: &PencilHold, action: HoldOperation) -> HoldError {
        HoldError::InvalidStateTransition {
            hold_id: hold.id,
            from: hold.status,
            action,
        }
    }

    /// Validates `CreateHold` and builds the new hold
    #[allow(clippy::too_many_arguments)] // Mirrors the command fields
    fn validate_create(
        state: &BookingState,
        env: &HoldEnvironment,
        hold_id: HoldId,
        event_id: EventId,
        user_id: UserId,
        notes: Option<String>,
        priority: u8,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<PencilHold, HoldError> {
        let event = Self::live_event(state, event_id)?;
        event.validate()?;

        let priority = Priority::new(priority)?;
        let expires_at = match expires_at {
            Some(expires_at) => expires_at,
            None => Duration::try_hours(env.config.default_duration_hours)
                .and_then(|lifetime| now.checked_add_signed(lifetime))
                .ok_or_else(|| {
                    HoldError::Validation(format!(
                        "default hold duration of {} hours is out of range",
                        env.config.default_duration_hours
                    ))
                })?,
        };
        if expires_at <= now {
            return Err(HoldError::Validation(format!(
                "hold expiry {expires_at} must be after {now}"
            )));
        }

        if !env.config.eligible_statuses.contains(&event.status) {
            return Err(HoldError::IneligibleEvent {
                event_id,
                status: event.status,
            });
        }

        if state.holds.values().any(|hold| hold.user_id == user_id) {
            return Err(HoldError::DuplicateHold { event_id, user_id });
        }

        Self::require_capacity(event)?;

        if env.config.check_category_conflicts {
            let result = env.engine.check(
                &ProposedEvent::from_event(event),
                &state.schedule_candidates,
                Some(event.id),
            );
            if result.has_conflict {
                return Err(HoldError::ScheduleConflict {
                    scope: ConflictScope::CategoryCity,
                    events: result.conflicts,
                    holds: Vec::new(),
                });
            }
        }

        let collisions = VenueCollisionPolicy::collisions(event, &state.venue_claims, now);
        if !collisions.is_empty() {
            return Err(HoldError::ScheduleConflict {
                scope: ConflictScope::Venue,
                events: Vec::new(),
                holds: collisions,
            });
        }

        Ok(PencilHold::new(hold_id, event_id, user_id, priority, notes, expires_at, now))
    }

    fn validate_confirm(
        state: &BookingState,
        hold_id: HoldId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), HoldError> {
        let hold = Self::existing_hold(state, hold_id)?;

        if hold.user_id != user_id {
            return Err(HoldError::NotHoldOwner { hold_id, user_id });
        }
        if hold.status != HoldStatus::Pending {
            return Err(Self::invalid(hold, HoldOperation::Confirm));
        }
        if hold.is_expired(now) {
            return Err(HoldError::HoldExpired {
                hold_id,
                expires_at: hold.expires_at,
            });
        }

        Self::require_capacity(Self::live_event(state, hold.event_id)?)
    }

    fn validate_approve(state: &BookingState, hold_id: HoldId) -> Result<(), HoldError> {
        let hold = Self::existing_hold(state, hold_id)?;

        if hold.status != HoldStatus::Confirmed {
            return Err(Self::invalid(hold, HoldOperation::Approve));
        }

        Self::require_capacity(Self::live_event(state, hold.event_id)?)
    }

    fn validate_cancel(state: &BookingState, hold_id: HoldId, now: DateTime<Utc>) -> Result<(), HoldError> {
        let hold = Self::existing_hold(state, hold_id)?;

        match hold.status {
            HoldStatus::Cancelled => Err(HoldError::AlreadyCancelled { hold_id }),
            HoldStatus::Converted | HoldStatus::Expired => {
                Err(Self::invalid(hold, HoldOperation::Cancel))
            },
            HoldStatus::Pending if hold.is_expired(now) => Err(HoldError::HoldExpired {
                hold_id,
                expires_at: hold.expires_at,
            }),
            HoldStatus::Pending | HoldStatus::Confirmed => Ok(()),
        }
    }

    fn validate_extend(
        state: &BookingState,
        hold_id: HoldId,
        days: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, HoldError> {
        let hold = Self::existing_hold(state, hold_id)?;

        if hold.status != HoldStatus::Pending {
            return Err(Self::invalid(hold, HoldOperation::Extend));
        }
        if hold.is_expired(now) {
            return Err(HoldError::HoldExpired {
                hold_id,
                expires_at: hold.expires_at,
            });
        }

        let days = days.unwrap_or(DEFAULT_EXTENSION_DAYS);
        if days == 0 {
            return Err(HoldError::Validation(
                "a hold must be extended by at least one day".to_string(),
            ));
        }

        Duration::try_days(i64::from(days))
            .and_then(|extension| hold.expires_at.checked_add_signed(extension))
            .ok_or_else(|| HoldError::Validation(format!("cannot extend a hold by {days} days")))
    }

    /// Applies an event to state
    ///
    /// The single authoritative transition function. Every hold change is
    /// followed by [`Self::sync_event_projection`].
    pub fn apply_event(state: &mut BookingState, action: &PencilHoldAction) {
        match action {
            PencilHoldAction::HoldCreated { hold } => {
                state.holds.insert(hold.id, hold.clone());
                Self::sync_event_projection(state, hold.created_at);
                state.last_error = None;
            },

            PencilHoldAction::HoldConfirmed {
                hold_id,
                confirmed_at,
            } => {
                if let Some(hold) = state.holds.get_mut(hold_id) {
                    hold.status = HoldStatus::Confirmed;
                    hold.confirmed_at = Some(*confirmed_at);
                    hold.updated_at = *confirmed_at;
                }
                Self::sync_event_projection(state, *confirmed_at);
                state.last_error = None;
            },

            PencilHoldAction::HoldConverted {
                hold_id,
                approved_by,
                approved_at,
            } => {
                if let Some(hold) = state.holds.get_mut(hold_id) {
                    hold.status = HoldStatus::Converted;
                    hold.approved_at = Some(*approved_at);
                    hold.approved_by = Some(*approved_by);
                    hold.updated_at = *approved_at;
                }
                if let Some(event) = state.event.as_mut() {
                    event.status = EventStatus::Published;
                    event.approved_at = Some(*approved_at);
                    event.approved_by = Some(*approved_by);
                }
                Self::sync_event_projection(state, *approved_at);
                state.last_error = None;
            },

            PencilHoldAction::HoldCancelled {
                hold_id,
                reason,
                cancelled_at,
            } => {
                if let Some(hold) = state.holds.get_mut(hold_id) {
                    hold.status = HoldStatus::Cancelled;
                    hold.cancelled_at = Some(*cancelled_at);
                    hold.cancellation_reason = Some(reason.clone());
                    hold.updated_at = *cancelled_at;
                }
                Self::sync_event_projection(state, *cancelled_at);
                state.last_error = None;
            },

            PencilHoldAction::HoldExtended {
                hold_id,
                expires_at,
                extended_at,
            } => {
                if let Some(hold) = state.holds.get_mut(hold_id) {
                    hold.expires_at = *expires_at;
                    hold.updated_at = *extended_at;
                }
                Self::sync_event_projection(state, *extended_at);
                state.last_error = None;
            },

            PencilHoldAction::HoldExpired {
                hold_id,
                expired_at,
            } => {
                if let Some(hold) = state.holds.get_mut(hold_id) {
                    hold.status = HoldStatus::Expired;
                    hold.expired_at = Some(*expired_at);
                    hold.updated_at = *expired_at;
                }
                Self::sync_event_projection(state, *expired_at);
                state.last_error = None;
            },

            PencilHoldAction::CommandRejected { error } => {
                state.last_error = Some(error.clone());
            },

            // Commands don't modify state
            PencilHoldAction::CreateHold { .. }
            | PencilHoldAction::ConfirmHold { .. }
            | PencilHoldAction::ApproveHold { .. }
            | PencilHoldAction::CancelHold { .. }
            | PencilHoldAction::ExtendHold { .. }
            | PencilHoldAction::ExpireHold { .. } => {},
        }
    }

    /// Re-derives the event's hold summary from its holds
    ///
    /// - `pencil_hold_count`: pending and confirmed holds
    /// - `pencil_hold_info`: mirror of the primary active hold, or cleared
    /// - status, only while it is hold-driven: `pencil_hold_confirmed` with
    ///   any confirmed hold, else `pencil_hold` with any pending hold, else
    ///   back to `draft`
    pub fn sync_event_projection(state: &mut BookingState, at: DateTime<Utc>) {
        let holds = &state.holds;
        let Some(event) = state.event.as_mut() else {
            return;
        };

        let active: Vec<&PencilHold> = holds.values().filter(|hold| hold.status.is_active()).collect();

        event.pencil_hold_count = u32::try_from(active.len()).unwrap_or(u32::MAX);
        event.pencil_hold_info = primary(active.iter().copied()).map(PencilHoldInfo::from);

        if event.status.is_hold_driven() {
            event.status = if active.iter().any(|hold| hold.status == HoldStatus::Confirmed) {
                EventStatus::PencilHoldConfirmed
            } else if active.is_empty() {
                EventStatus::Draft
            } else {
                EventStatus::PencilHold
            };
        }

        event.updated_at = at;
    }

    fn reject(state: &mut BookingState, error: HoldError) -> SmallVec<[Effect<PencilHoldAction>; 4]> {
        tracing::debug!(error = %error, "Hold command rejected");
        Self::apply_event(state, &PencilHoldAction::CommandRejected { error });
        SmallVec::new()
    }

    /// Notifies the hold's creator once the transition is committed
    fn notify(
        env: &HoldEnvironment,
        kind: NotificationKind,
        hold: Option<&PencilHold>,
        at: DateTime<Utc>,
    ) -> Effect<PencilHoldAction> {
        let Some(hold) = hold else {
            return Effect::None;
        };

        let notifier = Arc::clone(&env.notifier);
        let notification = HoldNotification {
            kind,
            hold_id: hold.id,
            event_id: hold.event_id,
            recipient: hold.user_id,
            at,
        };

        Effect::fire_and_forget(async move {
            let hold_id = notification.hold_id;
            if let Err(error) = notifier.notify(notification).await {
                tracing::warn!(hold_id = %hold_id, ?kind, error = %error, "Hold notification failed");
            }
        })
    }
}

impl Reducer for PencilHoldReducer {
    type State = BookingState;
    type Action = PencilHoldAction;
    type Environment = HoldEnvironment;

    #[allow(clippy::too_many_lines)] // One arm per command
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let now = env.clock.now();

        match action {
            // ========== Create ==========
            PencilHoldAction::CreateHold {
                hold_id,
                event_id,
                user_id,
                notes,
                priority,
                expires_at,
            } => {
                match Self::validate_create(
                    state, env, hold_id, event_id, user_id, notes, priority, expires_at, now,
                ) {
                    Ok(hold) => {
                        Self::apply_event(state, &PencilHoldAction::HoldCreated { hold });
                        smallvec![Self::notify(env, NotificationKind::HoldCreated, state.hold(&hold_id), now)]
                    },
                    Err(error) => Self::reject(state, error),
                }
            },

            // ========== Confirm ==========
            PencilHoldAction::ConfirmHold { hold_id, user_id } => {
                if let Err(error) = Self::validate_confirm(state, hold_id, user_id, now) {
                    return Self::reject(state, error);
                }

                Self::apply_event(
                    state,
                    &PencilHoldAction::HoldConfirmed {
                        hold_id,
                        confirmed_at: now,
                    },
                );
                smallvec![Self::notify(env, NotificationKind::HoldConfirmed, state.hold(&hold_id), now)]
            },

            // ========== Approve ==========
            PencilHoldAction::ApproveHold {
                hold_id,
                approved_by,
            } => {
                if let Err(error) = Self::validate_approve(state, hold_id) {
                    return Self::reject(state, error);
                }

                Self::apply_event(
                    state,
                    &PencilHoldAction::HoldConverted {
                        hold_id,
                        approved_by,
                        approved_at: now,
                    },
                );
                smallvec![Self::notify(env, NotificationKind::HoldApproved, state.hold(&hold_id), now)]
            },

            // ========== Cancel ==========
            PencilHoldAction::CancelHold { hold_id, reason } => {
                if let Err(error) = Self::validate_cancel(state, hold_id, now) {
                    return Self::reject(state, error);
                }

                let reason = reason
                    .filter(|reason| !reason.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_CANCELLATION_REASON.to_string());
                Self::apply_event(
                    state,
                    &PencilHoldAction::HoldCancelled {
                        hold_id,
                        reason,
                        cancelled_at: now,
                    },
                );
                smallvec![Self::notify(env, NotificationKind::HoldCancelled, state.hold(&hold_id), now)]
            },

            // ========== Extend ==========
            PencilHoldAction::ExtendHold { hold_id, days } => {
                let expires_at = match Self::validate_extend(state, hold_id, days, now) {
                    Ok(expires_at) => expires_at,
                    Err(error) => return Self::reject(state, error),
                };

                Self::apply_event(
                    state,
                    &PencilHoldAction::HoldExtended {
                        hold_id,
                        expires_at,
                        extended_at: now,
                    },
                );
                smallvec![Self::notify(env, NotificationKind::HoldExtended, state.hold(&hold_id), now)]
            },

            // ========== Expire (time-driven) ==========
            PencilHoldAction::ExpireHold { hold_id } => {
                let due = state
                    .hold(&hold_id)
                    .is_some_and(|hold| hold.status == HoldStatus::Pending && hold.expires_at <= now);

                if !due {
                    // Confirmed, cancelled or already expired meanwhile
                    tracing::debug!(hold_id = %hold_id, "Hold not due for expiry, skipping");
                    return SmallVec::new();
                }

                Self::apply_event(
                    state,
                    &PencilHoldAction::HoldExpired {
                        hold_id,
                        expired_at: now,
                    },
                );
                smallvec![Self::notify(env, NotificationKind::HoldExpired, state.hold(&hold_id), now)]
            },

            // ========== Events ==========
            event => {
                Self::apply_event(state, &event);
                SmallVec::new()
            },
        }
    }
}
