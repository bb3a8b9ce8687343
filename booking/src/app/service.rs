//! Pencil-hold service - command handlers over the booking store.
//!
//! Each command:
//! 1. Loads a versioned snapshot of the event and its holds
//! 2. Runs the reducer on a working copy
//! 3. Returns the recorded rejection, if any
//! 4. Diffs the copy against the snapshot into one [`UnitOfWork`]
//! 5. Commits, reloading and re-running on a version conflict
//! 6. Runs the reducer's effects once the commit has landed
//!
//! Every transition rewrites its event's hold summary, so the event's version
//! serializes all transitions on one event: of two racing commands, the
//! second is re-validated against the first one's result.

use crate::aggregates::{BookingState, HoldEnvironment, PencilHoldAction, PencilHoldReducer};
use crate::conflict::{ConflictResult, VenueClaim};
use crate::error::{HoldError, StoreError};
use crate::metrics;
use crate::store::{BookingStore, DateRange, ExpiryFilter, UnitOfWork};
use crate::types::{
    Event, EventId, HoldId, HoldOperation, HoldStatus, PencilHold, ProposedEvent, UserId, Versioned,
};
use chrono::{DateTime, Utc};
use pencilbook_core::reducer::Reducer;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Input for [`PencilHoldService::create_hold`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateHoldRequest {
    /// Event to hold
    pub event_id: EventId,
    /// Requesting organizer
    pub user_id: UserId,
    /// Organizer notes
    pub notes: Option<String>,
    /// Priority, 0 to 10
    pub priority: u8,
    /// Explicit expiry; defaults to the configured duration
    pub expires_at: Option<DateTime<Utc>>,
}

impl CreateHoldRequest {
    /// A request with no notes, priority 0 and the default expiry
    #[must_use]
    pub const fn new(event_id: EventId, user_id: UserId) -> Self {
        Self {
            event_id,
            user_id,
            notes: None,
            priority: 0,
            expires_at: None,
        }
    }

    /// Sets the notes
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Sets the priority
    #[must_use]
    pub const fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Sets an explicit expiry
    #[must_use]
    pub const fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

#[derive(Clone, Copy, Debug)]
enum Target {
    Event(EventId),
    Hold(HoldId),
}

enum Outcome {
    Committed(BookingState),
    Unchanged(BookingState),
}

/// Records as read, with their versions
#[derive(Default)]
struct Snapshot {
    event: Option<Versioned<Event>>,
    holds: HashMap<HoldId, Versioned<PencilHold>>,
}

impl Snapshot {
    fn state(&self) -> BookingState {
        BookingState::new(
            self.event.as_ref().map(|stored| stored.value.clone()),
            self.holds.values().map(|stored| stored.value.clone()),
        )
    }

    fn diff(&self, state: &BookingState) -> UnitOfWork {
        let mut work = UnitOfWork::new();

        if let (Some(before), Some(after)) = (&self.event, &state.event) {
            if before.value != *after {
                work = work.with_event(after.clone(), before.version);
            }
        }

        for hold in state.holds.values() {
            match self.holds.get(&hold.id) {
                Some(before) if before.value == *hold => {},
                Some(before) => work = work.with_hold(hold.clone(), Some(before.version)),
                None => work = work.with_hold(hold.clone(), None),
            }
        }

        work
    }
}

/// Pencil-hold command and query service
pub struct PencilHoldService<S> {
    store: Arc<S>,
    reducer: PencilHoldReducer,
    env: HoldEnvironment,
}

impl<S: BookingStore> PencilHoldService<S> {
    /// Creates a new `PencilHoldService`
    #[must_use]
    pub const fn new(store: Arc<S>, env: HoldEnvironment) -> Self {
        Self {
            store,
            reducer: PencilHoldReducer::new(),
            env,
        }
    }

    /// The backing store
    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The reducer environment
    #[must_use]
    pub const fn environment(&self) -> &HoldEnvironment {
        &self.env
    }

    // ========== Queries ==========

    /// Check a proposed event against active events of its category and city
    ///
    /// # Errors
    ///
    /// [`HoldError::Validation`] for a non-positive duration,
    /// [`HoldError::Storage`] if candidates cannot be loaded.
    pub async fn check_conflicts(
        &self,
        proposed: &ProposedEvent,
        exclude: Option<EventId>,
    ) -> Result<ConflictResult, HoldError> {
        proposed.validate()?;

        let engine = &self.env.engine;
        let range = DateRange::around(proposed.start_date, proposed.end_date, engine.search_margin());
        let candidates = self
            .store
            .find_active_events_by_category_and_city(
                proposed.category,
                &proposed.city,
                engine.city_match(),
                range,
            )
            .await?;

        let result = engine.check(proposed, &candidates, exclude);
        metrics::record_conflict_check(result.has_conflict);
        tracing::info!(
            category = %proposed.category,
            city = %proposed.city,
            candidates = candidates.len(),
            conflicts = result.conflicts.len(),
            "Conflict check"
        );

        Ok(result)
    }

    /// Get a hold, reading a lapsed pending hold as expired
    ///
    /// # Errors
    ///
    /// [`HoldError::NotFound`] or [`HoldError::Storage`].
    pub async fn get_hold(&self, hold_id: HoldId) -> Result<PencilHold, HoldError> {
        let stored = self
            .store
            .get_hold(hold_id)
            .await?
            .ok_or_else(|| HoldError::hold_not_found(hold_id))?;

        Ok(corrected(stored.value, self.env.clock.now()))
    }

    /// The hold a user placed on an event, any status, read-time corrected
    ///
    /// # Errors
    ///
    /// [`HoldError::Storage`] if the hold cannot be loaded.
    pub async fn hold_for_user(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<Option<PencilHold>, HoldError> {
        let now = self.env.clock.now();
        Ok(self
            .store
            .find_hold_by_event_and_user(event_id, user_id)
            .await?
            .map(|stored| corrected(stored.value, now)))
    }

    /// Holds on an event, highest priority first, then oldest first
    ///
    /// # Errors
    ///
    /// [`HoldError::Storage`] if the holds cannot be loaded.
    pub async fn list_holds_for_event(&self, event_id: EventId) -> Result<Vec<PencilHold>, HoldError> {
        let now = self.env.clock.now();
        let mut holds: Vec<PencilHold> = self
            .store
            .holds_for_event(event_id)
            .await?
            .into_iter()
            .map(|stored| corrected(stored.value, now))
            .collect();

        holds.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(holds)
    }

    /// Get an event
    ///
    /// # Errors
    ///
    /// [`HoldError::NotFound`] or [`HoldError::Storage`].
    pub async fn get_event(&self, event_id: EventId) -> Result<Event, HoldError> {
        self.store
            .get_event(event_id)
            .await?
            .map(|stored| stored.value)
            .ok_or_else(|| HoldError::event_not_found(event_id))
    }

    /// Pending holds whose expiry has passed
    ///
    /// # Errors
    ///
    /// [`HoldError::Storage`] if the holds cannot be loaded.
    pub async fn pending_holds_due(&self) -> Result<Vec<PencilHold>, HoldError> {
        let cutoff = self.env.clock.now();
        Ok(self
            .store
            .find_holds_by_status_and_expiry(&[HoldStatus::Pending], ExpiryFilter::AtOrBefore(cutoff))
            .await?)
    }

    // ========== Commands ==========

    /// Place a pencil hold on an event
    ///
    /// # Errors
    ///
    /// Any rejection from the state machine, [`HoldError::DuplicateHold`] if
    /// the same user raced a second hold in, or a storage failure.
    pub async fn create_hold(&self, request: CreateHoldRequest) -> Result<PencilHold, HoldError> {
        let hold_id = HoldId::new();
        let action = PencilHoldAction::CreateHold {
            hold_id,
            event_id: request.event_id,
            user_id: request.user_id,
            notes: request.notes,
            priority: request.priority,
            expires_at: request.expires_at,
        };

        self.command(HoldOperation::Create, Target::Event(request.event_id), hold_id, action)
            .await
    }

    /// Organizer confirms their pending hold
    ///
    /// # Errors
    ///
    /// Any rejection from the state machine, or a storage failure.
    pub async fn confirm_hold(&self, hold_id: HoldId, user_id: UserId) -> Result<PencilHold, HoldError> {
        let action = PencilHoldAction::ConfirmHold { hold_id, user_id };
        self.command(HoldOperation::Confirm, Target::Hold(hold_id), hold_id, action)
            .await
    }

    /// Administrator approves a confirmed hold, publishing its event
    ///
    /// The hold and the event are written in one commit.
    ///
    /// # Errors
    ///
    /// Any rejection from the state machine, or a storage failure.
    pub async fn approve_hold(&self, hold_id: HoldId, approved_by: UserId) -> Result<PencilHold, HoldError> {
        let action = PencilHoldAction::ApproveHold {
            hold_id,
            approved_by,
        };
        self.command(HoldOperation::Approve, Target::Hold(hold_id), hold_id, action)
            .await
    }

    /// Cancel a pending or confirmed hold
    ///
    /// # Errors
    ///
    /// Any rejection from the state machine, or a storage failure.
    pub async fn cancel_hold(&self, hold_id: HoldId, reason: Option<String>) -> Result<PencilHold, HoldError> {
        let action = PencilHoldAction::CancelHold { hold_id, reason };
        self.command(HoldOperation::Cancel, Target::Hold(hold_id), hold_id, action)
            .await
    }

    /// Push a pending hold's expiry forward by `days` (default 7)
    ///
    /// # Errors
    ///
    /// Any rejection from the state machine, or a storage failure.
    pub async fn extend_hold(&self, hold_id: HoldId, days: Option<u32>) -> Result<PencilHold, HoldError> {
        let action = PencilHoldAction::ExtendHold { hold_id, days };
        self.command(HoldOperation::Extend, Target::Hold(hold_id), hold_id, action)
            .await
    }

    /// Expire a pending hold that is due
    ///
    /// Returns `None` when there was nothing to do: the hold is missing, no
    /// longer pending, or not yet due.
    ///
    /// # Errors
    ///
    /// A storage failure, or [`HoldError::ConcurrentModification`].
    pub async fn expire_hold(&self, hold_id: HoldId) -> Result<Option<PencilHold>, HoldError> {
        let action = PencilHoldAction::ExpireHold { hold_id };
        match self
            .dispatch(HoldOperation::Expire, Target::Hold(hold_id), hold_id, action)
            .await?
        {
            Outcome::Committed(state) => Ok(state.hold(&hold_id).cloned()),
            Outcome::Unchanged(_) => Ok(None),
        }
    }

    async fn command(
        &self,
        operation: HoldOperation,
        target: Target,
        hold_id: HoldId,
        action: PencilHoldAction,
    ) -> Result<PencilHold, HoldError> {
        let (Outcome::Committed(state) | Outcome::Unchanged(state)) =
            self.dispatch(operation, target, hold_id, action).await?;

        state
            .hold(&hold_id)
            .cloned()
            .ok_or_else(|| HoldError::hold_not_found(hold_id))
    }

    async fn dispatch(
        &self,
        operation: HoldOperation,
        target: Target,
        hold_id: HoldId,
        action: PencilHoldAction,
    ) -> Result<Outcome, HoldError> {
        let started = Instant::now();
        let result = self.run_attempts(operation, target, hold_id, action).await;
        metrics::record_command_duration(operation, started.elapsed());

        if let Err(error) = &result {
            metrics::record_rejection(error);
            if error.is_recoverable() {
                tracing::warn!(hold_id = %hold_id, %operation, error = %error, "Hold command rejected");
            } else {
                tracing::error!(hold_id = %hold_id, %operation, error = %error, "Hold command failed");
            }
        }

        result
    }

    async fn run_attempts(
        &self,
        operation: HoldOperation,
        target: Target,
        hold_id: HoldId,
        action: PencilHoldAction,
    ) -> Result<Outcome, HoldError> {
        let attempts = self.env.config.max_commit_attempts.max(1);

        for attempt in 1..=attempts {
            let snapshot = self.load(target).await?;
            let mut state = snapshot.state();
            if operation == HoldOperation::Create {
                if let Some(event) = &state.event {
                    let (candidates, claims) = self.schedule_for(event).await?;
                    state = state.with_schedule(candidates, claims);
                }
            }

            let effects = self.reducer.reduce(&mut state, action.clone(), &self.env);
            if let Some(error) = state.last_error.take() {
                return Err(error);
            }

            let work = snapshot.diff(&state);
            if work.is_empty() {
                tracing::debug!(hold_id = %hold_id, %operation, "Nothing to commit");
                return Ok(Outcome::Unchanged(state));
            }

            match self.store.commit(work).await {
                Ok(()) => {
                    metrics::record_transition(operation);
                    tracing::info!(hold_id = %hold_id, %operation, attempt, "Hold transition committed");
                    pencilbook_runtime::execute(effects).await;
                    return Ok(Outcome::Committed(state));
                },
                Err(StoreError::VersionConflict { entity, id, .. }) => {
                    metrics::record_commit_retry(operation);
                    tracing::debug!(
                        hold_id = %hold_id,
                        %operation,
                        attempt,
                        %entity,
                        record = %id,
                        "Version conflict, reloading"
                    );
                },
                Err(StoreError::UniqueViolation { event_id, user_id }) => {
                    return Err(HoldError::DuplicateHold { event_id, user_id });
                },
                Err(error) => return Err(HoldError::Storage(error)),
            }
        }

        Err(HoldError::ConcurrentModification { attempts })
    }

    async fn load(&self, target: Target) -> Result<Snapshot, HoldError> {
        let event_id = match target {
            Target::Event(event_id) => Some(event_id),
            Target::Hold(hold_id) => self.store.get_hold(hold_id).await?.map(|stored| stored.value.event_id),
        };
        let Some(event_id) = event_id else {
            return Ok(Snapshot::default());
        };

        let event = self.store.get_event(event_id).await?;
        let holds = self
            .store
            .holds_for_event(event_id)
            .await?
            .into_iter()
            .map(|stored| (stored.value.id, stored))
            .collect();

        Ok(Snapshot { event, holds })
    }

    async fn schedule_for(&self, event: &Event) -> Result<(Vec<Event>, Vec<VenueClaim>), HoldError> {
        let candidates = if self.env.config.check_category_conflicts {
            let engine = &self.env.engine;
            let range = DateRange::around(event.start_date, event.end_date, engine.search_margin());
            self.store
                .find_active_events_by_category_and_city(
                    event.category,
                    &event.location.city,
                    engine.city_match(),
                    range,
                )
                .await?
        } else {
            Vec::new()
        };

        let claims = self.store.find_active_venue_claims(self.env.clock.now()).await?;
        Ok((candidates, claims))
    }
}

fn corrected(mut hold: PencilHold, now: DateTime<Utc>) -> PencilHold {
    hold.status = hold.effective_status(now);
    hold
}
