//! Storage adapter that retries transient failures.
//!
//! Only [`StoreError::Unavailable`] is retried. Version conflicts and unique
//! violations carry information the caller must act on, so they pass through
//! on the first attempt.

use super::{BookingStore, DateRange, ExpiryFilter, UnitOfWork};
use crate::conflict::{CityMatch, VenueClaim};
use crate::error::StoreError;
use crate::types::{CategoryId, Event, EventId, HoldId, HoldStatus, PencilHold, UserId, Versioned};
use chrono::{DateTime, Utc};
use pencilbook_core::version::Version;
use pencilbook_runtime::retry::{RetryPolicy, retry_with_predicate};
use std::future::Future;

/// Wraps a [`BookingStore`] with backoff retries
#[derive(Debug, Clone)]
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: BookingStore> RetryingStore<S> {
    /// Creates a new `RetryingStore`
    #[must_use]
    pub const fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The wrapped store
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    async fn retrying<F, Fut, T>(&self, operation: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        retry_with_predicate(&self.policy, operation, StoreError::is_transient).await
    }
}

impl<S: BookingStore> BookingStore for RetryingStore<S> {
    fn get_event(
        &self,
        id: EventId,
    ) -> impl Future<Output = Result<Option<Versioned<Event>>, StoreError>> + Send {
        self.retrying(move || self.inner.get_event(id))
    }

    fn save_event(
        &self,
        event: Event,
        expected: Option<Version>,
    ) -> impl Future<Output = Result<Version, StoreError>> + Send {
        self.retrying(move || self.inner.save_event(event.clone(), expected))
    }

    fn get_hold(
        &self,
        id: HoldId,
    ) -> impl Future<Output = Result<Option<Versioned<PencilHold>>, StoreError>> + Send {
        self.retrying(move || self.inner.get_hold(id))
    }

    fn holds_for_event(
        &self,
        event_id: EventId,
    ) -> impl Future<Output = Result<Vec<Versioned<PencilHold>>, StoreError>> + Send {
        self.retrying(move || self.inner.holds_for_event(event_id))
    }

    fn find_hold_by_event_and_user(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<Versioned<PencilHold>>, StoreError>> + Send {
        self.retrying(move || self.inner.find_hold_by_event_and_user(event_id, user_id))
    }

    fn find_holds_by_status_and_expiry(
        &self,
        statuses: &[HoldStatus],
        filter: ExpiryFilter,
    ) -> impl Future<Output = Result<Vec<PencilHold>, StoreError>> + Send {
        self.retrying(move || self.inner.find_holds_by_status_and_expiry(statuses, filter))
    }

    fn find_active_events_by_category_and_city(
        &self,
        category: CategoryId,
        city: &str,
        city_match: CityMatch,
        range: DateRange,
    ) -> impl Future<Output = Result<Vec<Event>, StoreError>> + Send {
        self.retrying(move || {
            self.inner
                .find_active_events_by_category_and_city(category, city, city_match, range)
        })
    }

    fn find_active_venue_claims(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<VenueClaim>, StoreError>> + Send {
        self.retrying(move || self.inner.find_active_venue_claims(now))
    }

    fn soft_delete_event(
        &self,
        id: EventId,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send {
        self.retrying(move || self.inner.soft_delete_event(id, at))
    }

    fn purge_event(&self, id: EventId) -> impl Future<Output = Result<usize, StoreError>> + Send {
        self.retrying(move || self.inner.purge_event(id))
    }

    fn commit(&self, work: UnitOfWork) -> impl Future<Output = Result<(), StoreError>> + Send {
        self.retrying(move || self.inner.commit(work.clone()))
    }
}
