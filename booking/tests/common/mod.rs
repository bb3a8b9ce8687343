//! Shared fixtures for booking integration tests.

#![allow(dead_code)] // Each test binary uses a different subset
#![allow(clippy::unwrap_used)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use futures::future::BoxFuture;
use pencilbook_booking::config::HoldConfig;
use pencilbook_booking::notify::{NotificationKind, NotifyError};
use pencilbook_booking::store::BookingStore;
use pencilbook_booking::types::{CategoryId, Event, Location, UserId};
use pencilbook_booking::{
    ConflictDetectionEngine, HoldEnvironment, HoldNotification, InMemoryBookingStore, Notifier,
    PencilHoldService,
};
use pencilbook_testing::TestClock;
use std::sync::{Arc, Mutex};

/// Notifier that remembers what it was asked to send
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<HoldNotification>>,
}

impl RecordingNotifier {
    pub fn kinds(&self) -> Vec<NotificationKind> {
        self.sent.lock().unwrap().iter().map(|n| n.kind).collect()
    }

    pub fn sent(&self) -> Vec<HoldNotification> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: HoldNotification) -> BoxFuture<'_, Result<(), NotifyError>> {
        self.sent.lock().unwrap().push(notification);
        Box::pin(async { Ok(()) })
    }
}

/// Service over an in-memory store with a settable clock
pub struct Harness {
    pub clock: Arc<TestClock>,
    pub memory: InMemoryBookingStore,
    pub notifier: Arc<RecordingNotifier>,
    pub service: Arc<PencilHoldService<InMemoryBookingStore>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(HoldConfig::default())
    }

    pub fn with_config(config: HoldConfig) -> Self {
        let clock = Arc::new(TestClock::new(start()));
        let memory = InMemoryBookingStore::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let env = HoldEnvironment::new(
            clock.clone(),
            notifier.clone(),
            config,
            ConflictDetectionEngine::default(),
        );
        let service = Arc::new(PencilHoldService::new(Arc::new(memory.clone()), env));

        Self {
            clock,
            memory,
            notifier,
            service,
        }
    }

    pub async fn seed(&self, event: Event) -> Event {
        self.memory.save_event(event.clone(), None).await.unwrap();
        event
    }

    pub async fn event(&self, event: &Event) -> Event {
        self.service.get_event(event.id).await.unwrap()
    }
}

/// 2025-03-01 09:00 UTC
pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

/// `hour` o'clock UTC on 2025-03-15
pub fn show_day(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 15, hour, minute, 0).unwrap()
}

pub fn music() -> CategoryId {
    CategoryId::from_uuid(uuid::Uuid::from_u128(0x4d55_5349_43))
}

pub fn hall(name: &str) -> Location {
    Location::new(name, format!("{name}, 1 Queen St"), "Auckland")
}

/// A draft music event in Auckland on show day
pub fn gig(venue: &str, begin: DateTime<Utc>, end: DateTime<Utc>) -> Event {
    Event::new("Late show", UserId::new(), music(), hall(venue), begin, end, start() - Duration::days(1))
}
