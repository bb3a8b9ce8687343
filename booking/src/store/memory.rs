//! In-memory booking store.
//!
//! Reference adapter for tests and the single-node daemon. One `RwLock` over
//! both tables: reads share it, and `commit` takes it for writing, checks
//! every version and uniqueness rule, and only then applies the writes.

use super::{BookingStore, DateRange, ExpiryFilter, UnitOfWork};
use crate::conflict::{CityMatch, VenueClaim};
use crate::error::StoreError;
use crate::types::{
    CategoryId, EntityKind, Event, EventId, HoldId, HoldStatus, PencilHold, UserId, Versioned,
};
use chrono::{DateTime, Utc};
use pencilbook_core::version::Version;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    events: HashMap<EventId, Versioned<Event>>,
    holds: HashMap<HoldId, Versioned<PencilHold>>,
}

impl Tables {
    fn check(&self, work: &UnitOfWork) -> Result<(), StoreError> {
        if let Some((event, expected)) = &work.event {
            let actual = self.events.get(&event.id).map(|stored| stored.version);
            if actual != Some(*expected) {
                return Err(StoreError::VersionConflict {
                    entity: EntityKind::Event,
                    id: event.id.to_string(),
                    expected: Some(*expected),
                    actual,
                });
            }
        }

        for (index, write) in work.holds.iter().enumerate() {
            let hold = &write.hold;
            let actual = self.holds.get(&hold.id).map(|stored| stored.version);
            if actual != write.expected {
                return Err(StoreError::VersionConflict {
                    entity: EntityKind::Hold,
                    id: hold.id.to_string(),
                    expected: write.expected,
                    actual,
                });
            }

            let stored_twin = self.holds.values().any(|stored| {
                stored.value.id != hold.id
                    && stored.value.event_id == hold.event_id
                    && stored.value.user_id == hold.user_id
            });
            let pending_twin = work.holds[..index].iter().any(|other| {
                other.hold.id != hold.id
                    && other.hold.event_id == hold.event_id
                    && other.hold.user_id == hold.user_id
            });
            if stored_twin || pending_twin {
                return Err(StoreError::UniqueViolation {
                    event_id: hold.event_id,
                    user_id: hold.user_id,
                });
            }
        }

        Ok(())
    }

    fn apply(&mut self, work: UnitOfWork) {
        if let Some((event, expected)) = work.event {
            self.events.insert(event.id, Versioned::new(event, expected.next()));
        }

        for write in work.holds {
            let version = write.expected.map_or(Version::INITIAL, Version::next);
            self.holds.insert(write.hold.id, Versioned::new(write.hold, version));
        }
    }
}

/// In-memory [`BookingStore`]
///
/// Cloning shares the underlying tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBookingStore {
    tables: Arc<RwLock<Tables>>,
    outages: Arc<AtomicUsize>,
}

impl InMemoryBookingStore {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `commits` commits fail with [`StoreError::Unavailable`]
    pub fn inject_unavailable(&self, commits: usize) {
        self.outages.store(commits, Ordering::SeqCst);
    }

    /// Number of stored holds, any status
    pub async fn hold_count(&self) -> usize {
        self.tables.read().await.holds.len()
    }

    fn take_outage(&self) -> bool {
        self.outages
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

impl BookingStore for InMemoryBookingStore {
    fn get_event(
        &self,
        id: EventId,
    ) -> impl Future<Output = Result<Option<Versioned<Event>>, StoreError>> + Send {
        let tables = Arc::clone(&self.tables);

        async move { Ok(tables.read().await.events.get(&id).cloned()) }
    }

    fn save_event(
        &self,
        event: Event,
        expected: Option<Version>,
    ) -> impl Future<Output = Result<Version, StoreError>> + Send {
        let tables = Arc::clone(&self.tables);

        async move {
            let mut tables = tables.write().await;
            let actual = tables.events.get(&event.id).map(|stored| stored.version);
            if actual != expected {
                return Err(StoreError::VersionConflict {
                    entity: EntityKind::Event,
                    id: event.id.to_string(),
                    expected,
                    actual,
                });
            }

            let version = expected.map_or(Version::INITIAL, Version::next);
            tables.events.insert(event.id, Versioned::new(event, version));
            Ok(version)
        }
    }

    fn get_hold(
        &self,
        id: HoldId,
    ) -> impl Future<Output = Result<Option<Versioned<PencilHold>>, StoreError>> + Send {
        let tables = Arc::clone(&self.tables);

        async move { Ok(tables.read().await.holds.get(&id).cloned()) }
    }

    fn holds_for_event(
        &self,
        event_id: EventId,
    ) -> impl Future<Output = Result<Vec<Versioned<PencilHold>>, StoreError>> + Send {
        let tables = Arc::clone(&self.tables);

        async move {
            Ok(tables
                .read()
                .await
                .holds
                .values()
                .filter(|stored| stored.value.event_id == event_id)
                .cloned()
                .collect())
        }
    }

    fn find_hold_by_event_and_user(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<Versioned<PencilHold>>, StoreError>> + Send {
        let tables = Arc::clone(&self.tables);

        async move {
            Ok(tables
                .read()
                .await
                .holds
                .values()
                .find(|stored| stored.value.event_id == event_id && stored.value.user_id == user_id)
                .cloned())
        }
    }

    fn find_holds_by_status_and_expiry(
        &self,
        statuses: &[HoldStatus],
        filter: ExpiryFilter,
    ) -> impl Future<Output = Result<Vec<PencilHold>, StoreError>> + Send {
        let tables = Arc::clone(&self.tables);
        let statuses = statuses.to_vec();

        async move {
            let mut holds: Vec<PencilHold> = tables
                .read()
                .await
                .holds
                .values()
                .map(|stored| &stored.value)
                .filter(|hold| statuses.contains(&hold.status) && filter.matches(hold.expires_at))
                .cloned()
                .collect();
            holds.sort_by_key(|hold| (hold.expires_at, hold.id));
            Ok(holds)
        }
    }

    fn find_active_events_by_category_and_city(
        &self,
        category: CategoryId,
        city: &str,
        city_match: CityMatch,
        range: DateRange,
    ) -> impl Future<Output = Result<Vec<Event>, StoreError>> + Send {
        let tables = Arc::clone(&self.tables);
        let city = city.to_string();

        async move {
            Ok(tables
                .read()
                .await
                .events
                .values()
                .map(|stored| &stored.value)
                .filter(|event| {
                    event.category == category
                        && city_match.matches(&event.location.city, &city)
                        && event.status.is_active()
                        && !event.is_deleted()
                        && range.overlaps(event.start_date, event.end_date)
                })
                .cloned()
                .collect())
        }
    }

    fn find_active_venue_claims(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<VenueClaim>, StoreError>> + Send {
        let tables = Arc::clone(&self.tables);

        async move {
            let tables = tables.read().await;
            Ok(tables
                .holds
                .values()
                .map(|stored| &stored.value)
                .filter_map(|hold| {
                    let event = &tables.events.get(&hold.event_id)?.value;
                    let claim = VenueClaim::new(hold, event);
                    (claim.is_live(now) && !event.is_deleted()).then_some(claim)
                })
                .collect())
        }
    }

    fn soft_delete_event(
        &self,
        id: EventId,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send {
        let tables = Arc::clone(&self.tables);

        async move {
            let mut tables = tables.write().await;
            let Some(stored) = tables.events.get_mut(&id) else {
                return Ok(false);
            };

            stored.value.deleted_at = Some(at);
            stored.value.updated_at = at;
            stored.version = stored.version.next();
            Ok(true)
        }
    }

    fn purge_event(&self, id: EventId) -> impl Future<Output = Result<usize, StoreError>> + Send {
        let tables = Arc::clone(&self.tables);

        async move {
            let mut tables = tables.write().await;
            tables.events.remove(&id);
            let before = tables.holds.len();
            tables.holds.retain(|_, stored| stored.value.event_id != id);
            Ok(before - tables.holds.len())
        }
    }

    fn commit(&self, work: UnitOfWork) -> impl Future<Output = Result<(), StoreError>> + Send {
        let tables = Arc::clone(&self.tables);
        let outage = self.take_outage();

        async move {
            if outage {
                return Err(StoreError::Unavailable("injected outage".to_string()));
            }

            let mut tables = tables.write().await;
            tables.check(&work)?;
            tables.apply(work);
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{Location, Priority};
    use chrono::{Duration, TimeZone};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap()
    }

    fn event(city: &str, category: CategoryId) -> Event {
        Event::new(
            "Quiz night",
            UserId::new(),
            category,
            Location::new("Town Hall", "1 Queen St", city),
            at(18),
            at(20),
            at(0),
        )
    }

    fn hold_on(event: &Event, user_id: UserId) -> PencilHold {
        PencilHold::new(
            HoldId::new(),
            event.id,
            user_id,
            Priority::default(),
            None,
            at(0) + Duration::hours(48),
            at(0),
        )
    }

    async fn seeded() -> (InMemoryBookingStore, Event) {
        let store = InMemoryBookingStore::new();
        let event = event("Auckland", CategoryId::new());
        store.save_event(event.clone(), None).await.unwrap();
        (store, event)
    }

    #[tokio::test]
    async fn save_event_checks_versions() {
        let (store, event) = seeded().await;

        let stale = store.save_event(event.clone(), None).await;
        assert!(matches!(stale, Err(StoreError::VersionConflict { actual: Some(_), .. })));

        let v2 = store.save_event(event.clone(), Some(Version::INITIAL)).await.unwrap();
        assert_eq!(v2, Version::new(2));
        assert_eq!(store.get_event(event.id).await.unwrap().unwrap().version, v2);
    }

    #[tokio::test]
    async fn commit_writes_event_and_holds_together() {
        let (store, mut event) = seeded().await;
        let hold = hold_on(&event, UserId::new());
        event.pencil_hold_count = 1;

        let work = UnitOfWork::new()
            .with_event(event.clone(), Version::INITIAL)
            .with_hold(hold.clone(), None);
        store.commit(work).await.unwrap();

        let stored_event = store.get_event(event.id).await.unwrap().unwrap();
        assert_eq!(stored_event.version, Version::new(2));
        assert_eq!(stored_event.value.pencil_hold_count, 1);
        let stored_hold = store.get_hold(hold.id).await.unwrap().unwrap();
        assert_eq!(stored_hold.version, Version::INITIAL);
    }

    #[tokio::test]
    async fn stale_event_version_rejects_whole_unit() {
        let (store, event) = seeded().await;
        let hold = hold_on(&event, UserId::new());

        let work = UnitOfWork::new()
            .with_event(event.clone(), Version::new(7))
            .with_hold(hold.clone(), None);
        let result = store.commit(work).await;

        assert!(matches!(result, Err(StoreError::VersionConflict { entity: EntityKind::Event, .. })));
        assert!(store.get_hold(hold.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stale_hold_version_rejects_whole_unit() {
        let (store, event) = seeded().await;
        let mut hold = hold_on(&event, UserId::new());
        store.commit(UnitOfWork::new().with_hold(hold.clone(), None)).await.unwrap();

        hold.status = HoldStatus::Confirmed;
        let mut touched = event.clone();
        touched.pencil_hold_count = 9;
        let work = UnitOfWork::new()
            .with_event(touched, Version::INITIAL)
            .with_hold(hold.clone(), None);

        assert!(matches!(
            store.commit(work).await,
            Err(StoreError::VersionConflict { entity: EntityKind::Hold, .. })
        ));
        let stored = store.get_event(event.id).await.unwrap().unwrap();
        assert_eq!(stored.version, Version::INITIAL);
        assert_eq!(stored.value.pencil_hold_count, 0);
    }

    #[tokio::test]
    async fn second_hold_for_same_user_is_a_unique_violation() {
        let (store, event) = seeded().await;
        let user_id = UserId::new();
        store
            .commit(UnitOfWork::new().with_hold(hold_on(&event, user_id), None))
            .await
            .unwrap();

        let result = store
            .commit(UnitOfWork::new().with_hold(hold_on(&event, user_id), None))
            .await;
        assert!(matches!(result, Err(StoreError::UniqueViolation { .. })));
        assert_eq!(store.hold_count().await, 1);
    }

    #[tokio::test]
    async fn injected_outages_fail_then_clear() {
        let (store, event) = seeded().await;
        store.inject_unavailable(2);
        let work = UnitOfWork::new().with_hold(hold_on(&event, UserId::new()), None);

        assert!(matches!(store.commit(work.clone()).await, Err(StoreError::Unavailable(_))));
        assert!(matches!(store.commit(work.clone()).await, Err(StoreError::Unavailable(_))));
        store.commit(work).await.unwrap();
        assert_eq!(store.hold_count().await, 1);
    }

    #[tokio::test]
    async fn expiry_query_filters_status_and_cutoff() {
        let (store, event) = seeded().await;
        let due = hold_on(&event, UserId::new());
        let mut confirmed = hold_on(&event, UserId::new());
        confirmed.status = HoldStatus::Confirmed;
        let mut later = hold_on(&event, UserId::new());
        later.expires_at = at(0) + Duration::hours(72);

        let work = UnitOfWork::new()
            .with_hold(due.clone(), None)
            .with_hold(confirmed, None)
            .with_hold(later.clone(), None);
        store.commit(work).await.unwrap();

        let cutoff = at(0) + Duration::hours(48);
        let found = store
            .find_holds_by_status_and_expiry(&[HoldStatus::Pending], ExpiryFilter::AtOrBefore(cutoff))
            .await
            .unwrap();
        assert_eq!(found.iter().map(|h| h.id).collect::<Vec<_>>(), vec![due.id]);

        let live = store
            .find_holds_by_status_and_expiry(&[HoldStatus::Pending], ExpiryFilter::After(cutoff))
            .await
            .unwrap();
        assert_eq!(live.iter().map(|h| h.id).collect::<Vec<_>>(), vec![later.id]);
    }

    #[tokio::test]
    async fn category_city_query_skips_inactive_deleted_and_elsewhere() {
        let store = InMemoryBookingStore::new();
        let music = CategoryId::new();
        let wanted = event("Auckland", music);
        let elsewhere = event("Wellington", music);
        let other_category = event("Auckland", CategoryId::new());
        let cancelled = event("Auckland", music).with_status(crate::types::EventStatus::Cancelled);
        let deleted = event("Auckland", music);
        for event in [&wanted, &elsewhere, &other_category, &cancelled, &deleted] {
            store.save_event(event.clone(), None).await.unwrap();
        }
        assert!(store.soft_delete_event(deleted.id, at(1)).await.unwrap());

        let range = DateRange::new(at(0), at(23));
        let found = store
            .find_active_events_by_category_and_city(music, "Auckland", CityMatch::Exact, range)
            .await
            .unwrap();
        assert_eq!(found.iter().map(|e| e.id).collect::<Vec<_>>(), vec![wanted.id]);

        let normalized = store
            .find_active_events_by_category_and_city(music, " auckland", CityMatch::Normalized, range)
            .await
            .unwrap();
        assert_eq!(normalized.len(), 1);

        let before = DateRange::new(at(0), at(18));
        assert!(store
            .find_active_events_by_category_and_city(music, "Auckland", CityMatch::Exact, before)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn venue_claims_cover_live_holds_only() {
        let (store, event) = seeded().await;
        let live = hold_on(&event, UserId::new());
        let mut cancelled = hold_on(&event, UserId::new());
        cancelled.status = HoldStatus::Cancelled;
        let work = UnitOfWork::new().with_hold(live.clone(), None).with_hold(cancelled, None);
        store.commit(work).await.unwrap();

        let claims = store.find_active_venue_claims(at(1)).await.unwrap();
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].hold_id, live.id);
        assert_eq!(claims[0].venue_name, "Town Hall");

        let after_expiry = at(0) + Duration::hours(49);
        assert!(store.find_active_venue_claims(after_expiry).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn purge_removes_event_with_its_holds() {
        let (store, event) = seeded().await;
        let work = UnitOfWork::new()
            .with_hold(hold_on(&event, UserId::new()), None)
            .with_hold(hold_on(&event, UserId::new()), None);
        store.commit(work).await.unwrap();

        assert_eq!(store.purge_event(event.id).await.unwrap(), 2);
        assert!(store.get_event(event.id).await.unwrap().is_none());
        assert_eq!(store.hold_count().await, 0);
        assert!(!store.soft_delete_event(event.id, at(2)).await.unwrap());
    }
}
