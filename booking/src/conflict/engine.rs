//! Category/city conflict detection.
//!
//! An existing event conflicts with a proposal when it has the same category,
//! the same city and an active status, and their schedules come too close:
//!
//! - if either event is all-day (24h or longer, with no clock times refining
//!   it), sharing a calendar day is enough;
//! - otherwise both are projected onto each day (explicit clock times refine
//!   the stored instants) and compared with a setup/teardown buffer, which
//!   reaches across midnight into neighbouring days.
//!
//! The engine is pure: callers pass in the candidate events. It re-applies
//! the scope filter itself, so a loose store query never widens the verdict.

use super::suggestions::{AlternativeSuggestions, suggest};
use super::CityMatch;
use crate::config::ConflictConfig;
use crate::types::{ClockTime, Event, EventId, EventStatus, ProposedEvent};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Why an event conflicts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// One side blocks the whole day
    AllDay,
    /// Buffered time windows overlap
    TimeOverlap,
}

/// An existing event in the way of a proposal
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConflictingEvent {
    /// The event
    pub event_id: EventId,
    /// Its title
    pub title: String,
    /// Its slug
    pub slug: String,
    /// Its status
    pub status: EventStatus,
    /// Calendar day of the conflict
    pub day: NaiveDate,
    /// Start of the conflicting window
    pub start: DateTime<Utc>,
    /// End of the conflicting window
    pub end: DateTime<Utc>,
    /// Why it conflicts
    pub kind: ConflictKind,
}

/// Verdict of a conflict check
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConflictResult {
    /// Any conflict found
    pub has_conflict: bool,
    /// One entry per conflicting (event, day)
    pub conflicts: Vec<ConflictingEvent>,
    /// Human-readable summary
    pub message: String,
    /// Advisory alternatives; empty without a conflict
    pub suggestions: AlternativeSuggestions,
}

/// Longest setup/teardown buffer the engine applies, in minutes
pub const MAX_BUFFER_MINUTES: i64 = 24 * 60;

/// Detects same-category, same-city schedule conflicts
#[derive(Clone, Debug)]
pub struct ConflictDetectionEngine {
    buffer: Duration,
    offset: FixedOffset,
    city_match: CityMatch,
    alternative_venues: Vec<String>,
}

impl Default for ConflictDetectionEngine {
    fn default() -> Self {
        Self::new(Duration::minutes(60))
    }
}

impl ConflictDetectionEngine {
    /// Engine with the given buffer, UTC days and exact city matching
    ///
    /// The buffer is clamped to `0..=MAX_BUFFER_MINUTES`.
    #[must_use]
    pub fn new(buffer: Duration) -> Self {
        Self {
            buffer: buffer.clamp(Duration::zero(), Duration::minutes(MAX_BUFFER_MINUTES)),
            offset: utc(),
            city_match: CityMatch::Exact,
            alternative_venues: Vec::new(),
        }
    }

    /// Engine described by configuration
    #[must_use]
    pub fn from_config(config: &ConflictConfig) -> Self {
        let offset = FixedOffset::east_opt(config.utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| {
                tracing::warn!(
                    utc_offset_minutes = config.utc_offset_minutes,
                    "UTC offset out of range, counting days in UTC"
                );
                utc()
            });
        let city_match = if config.normalize_city {
            CityMatch::Normalized
        } else {
            CityMatch::Exact
        };

        let buffer = Duration::try_minutes(config.buffer_minutes).unwrap_or_else(|| {
            tracing::warn!(
                buffer_minutes = config.buffer_minutes,
                "Buffer out of range, using the maximum"
            );
            Duration::minutes(MAX_BUFFER_MINUTES)
        });

        Self::new(buffer)
            .with_utc_offset(offset)
            .with_city_match(city_match)
            .with_alternative_venues(config.alternative_venues.clone())
    }

    /// Count calendar days in `offset`
    #[must_use]
    pub const fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Compare cities with `city_match`
    #[must_use]
    pub const fn with_city_match(mut self, city_match: CityMatch) -> Self {
        self.city_match = city_match;
        self
    }

    /// Venues to suggest on conflict
    #[must_use]
    pub fn with_alternative_venues(mut self, venues: Vec<String>) -> Self {
        self.alternative_venues = venues;
        self
    }

    /// Setup/teardown buffer
    #[must_use]
    pub const fn buffer(&self) -> Duration {
        self.buffer
    }

    /// City comparison in use
    #[must_use]
    pub const fn city_match(&self) -> CityMatch {
        self.city_match
    }

    /// How far beyond a proposal's range a candidate can still matter
    ///
    /// Callers widen their candidate query by this much on both sides.
    #[must_use]
    pub fn search_margin(&self) -> Duration {
        self.buffer + Duration::days(2)
    }

    /// Check `proposed` against `existing`, ignoring `exclude`
    #[must_use]
    pub fn check(
        &self,
        proposed: &ProposedEvent,
        existing: &[Event],
        exclude: Option<EventId>,
    ) -> ConflictResult {
        let candidates: Vec<&Event> = existing
            .iter()
            .filter(|event| self.in_scope(proposed, event, exclude))
            .collect();

        let conflicts = if Schedule::from(proposed).blocks_whole_days() {
            self.all_day_conflicts(proposed, &candidates)
        } else {
            self.per_day_conflicts(proposed, &candidates)
        };

        let has_conflict = !conflicts.is_empty();
        tracing::debug!(
            category = %proposed.category,
            city = %proposed.city,
            candidates = candidates.len(),
            conflicts = conflicts.len(),
            "Conflict check complete"
        );

        if has_conflict {
            ConflictResult {
                has_conflict,
                message: format!(
                    "Found {} conflicting event(s) in the same category and city",
                    conflicts.len()
                ),
                conflicts,
                suggestions: suggest(proposed, self.offset, &self.alternative_venues),
            }
        } else {
            ConflictResult {
                has_conflict,
                conflicts,
                message: "No conflicts found".to_string(),
                suggestions: AlternativeSuggestions::default(),
            }
        }
    }

    fn in_scope(&self, proposed: &ProposedEvent, event: &Event, exclude: Option<EventId>) -> bool {
        Some(event.id) != exclude
            && event.category == proposed.category
            && self.city_match.matches(&event.location.city, &proposed.city)
            && event.status.is_active()
            && !event.is_deleted()
    }

    fn all_day_conflicts(&self, proposed: &ProposedEvent, candidates: &[&Event]) -> Vec<ConflictingEvent> {
        let days: Vec<NaiveDate> = self.days(proposed.start_date, proposed.end_date).collect();
        let ours = Window {
            start: proposed.start_date,
            end: proposed.end_date,
        };

        candidates
            .iter()
            .filter_map(|event| {
                if let Some(day) = days.iter().copied().find(|day| self.touches(event, *day)) {
                    return Some(conflict(event, day, event.start_date, event.end_date, ConflictKind::AllDay));
                }

                // Within the buffer of the first or last day
                days.iter().copied().filter(|day| self.near(event, *day)).find_map(|day| {
                    let window = self
                        .windows_around(day, event)
                        .into_iter()
                        .find(|theirs| overlaps_with_buffer(ours, *theirs, self.buffer))?;
                    Some(conflict(event, day, window.start, window.end, ConflictKind::TimeOverlap))
                })
            })
            .collect()
    }

    fn per_day_conflicts(&self, proposed: &ProposedEvent, candidates: &[&Event]) -> Vec<ConflictingEvent> {
        let schedule = Schedule::from(proposed);
        let mut seen = HashSet::new();
        let mut conflicts = Vec::new();

        for day in self.days(proposed.start_date, proposed.end_date) {
            let ours = self.windows_on(day, &schedule);

            for event in candidates.iter().filter(|event| self.near(event, day)) {
                if seen.contains(&(event.id, day)) {
                    continue;
                }

                if Schedule::from(*event).blocks_whole_days() && self.touches(event, day) {
                    seen.insert((event.id, day));
                    conflicts.push(conflict(
                        event,
                        day,
                        event.start_date,
                        event.end_date,
                        ConflictKind::AllDay,
                    ));
                    continue;
                }

                let theirs = self.windows_around(day, event);
                let hit = theirs
                    .iter()
                    .find(|t| ours.iter().any(|o| overlaps_with_buffer(*o, **t, self.buffer)));

                if let Some(window) = hit {
                    seen.insert((event.id, day));
                    conflicts.push(conflict(event, day, window.start, window.end, ConflictKind::TimeOverlap));
                }
            }
        }

        conflicts
    }

    /// Calendar days covered by `[start, end)`
    fn days(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> impl Iterator<Item = NaiveDate> {
        let first = self.local_date(start);
        let last = self.local_date(end - Duration::nanoseconds(1)).max(first);
        first.iter_days().take_while(move |day| *day <= last)
    }

    fn touches(&self, event: &Event, day: NaiveDate) -> bool {
        self.touches_within(event, day, Duration::zero())
    }

    /// Close enough to `day` for the buffered test to reach it
    ///
    /// Both sides of the test carry the buffer, so the reach is twice the
    /// buffer.
    fn near(&self, event: &Event, day: NaiveDate) -> bool {
        self.touches_within(event, day, self.buffer * 2)
    }

    fn touches_within(&self, event: &Event, day: NaiveDate, margin: Duration) -> bool {
        let day_start = self.at(day, NaiveTime::MIN);
        let day_end = day_start + Duration::days(1);
        event.start_date < day_end + margin && event.end_date > day_start - margin
    }

    /// An existing event's windows on the days around `day` that it
    /// actually runs on
    fn windows_around(&self, day: NaiveDate, event: &Event) -> Vec<Window> {
        let schedule = Schedule::from(event);
        (-2..=2)
            .filter_map(|shift| day.checked_add_signed(Duration::days(shift)))
            .filter(|d| self.touches(event, *d))
            .flat_map(|d| self.windows_on(d, &schedule))
            .collect()
    }

    /// Windows a schedule occupies on `day`
    ///
    /// With clock times this includes the previous day's window when it runs
    /// past midnight into `day`.
    fn windows_on(&self, day: NaiveDate, schedule: &Schedule) -> Vec<Window> {
        let mut windows = vec![self.project(day, schedule)];

        if schedule.has_clock_times() {
            if let Some(previous) = day.pred_opt() {
                if previous >= self.local_date(schedule.start_date) {
                    let carried = self.project(previous, schedule);
                    if carried.end > self.at(day, NaiveTime::MIN) {
                        windows.push(carried);
                    }
                }
            }
        }

        windows
    }

    fn project(&self, day: NaiveDate, schedule: &Schedule) -> Window {
        let start = schedule
            .start_time
            .map_or(schedule.start_date, |t| self.at(day, t.as_naive()));
        let mut end = schedule
            .end_time
            .map_or(schedule.end_date, |t| self.at(day, t.as_naive()));

        if schedule.has_clock_times() && end <= start {
            end += Duration::days(1);
        }

        Window { start, end }
    }

    fn at(&self, day: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        let offset = Duration::seconds(i64::from(self.offset.local_minus_utc()));
        (day.and_time(time) - offset).and_utc()
    }

    fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }
}

/// Half-open time window
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Window {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

struct Schedule {
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    start_time: Option<ClockTime>,
    end_time: Option<ClockTime>,
    all_day: bool,
}

impl Schedule {
    const fn has_clock_times(&self) -> bool {
        self.start_time.is_some() || self.end_time.is_some()
    }

    const fn blocks_whole_days(&self) -> bool {
        self.all_day && !self.has_clock_times()
    }
}

impl From<&ProposedEvent> for Schedule {
    fn from(proposed: &ProposedEvent) -> Self {
        Self {
            start_date: proposed.start_date,
            end_date: proposed.end_date,
            start_time: proposed.start_time,
            end_time: proposed.end_time,
            all_day: proposed.is_all_day(),
        }
    }
}

impl From<&Event> for Schedule {
    fn from(event: &Event) -> Self {
        Self {
            start_date: event.start_date,
            end_date: event.end_date,
            start_time: event.start_time,
            end_time: event.end_time,
            all_day: event.is_all_day(),
        }
    }
}

/// `(s2 - b) < (e1 + b) && e2 > s1`, tested from both sides
fn overlaps_with_buffer(a: Window, b: Window, buffer: Duration) -> bool {
    fn directional(first: Window, second: Window, buffer: Duration) -> bool {
        second.start - buffer < first.end + buffer && second.end > first.start
    }

    directional(a, b, buffer) || directional(b, a, buffer)
}

fn conflict(
    event: &Event,
    day: NaiveDate,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    kind: ConflictKind,
) -> ConflictingEvent {
    ConflictingEvent {
        event_id: event.id,
        title: event.title.clone(),
        slug: event.slug.clone(),
        status: event.status,
        day,
        start,
        end,
        kind,
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{CategoryId, Location, UserId};
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn music() -> CategoryId {
        CategoryId::from_uuid(uuid::Uuid::from_u128(1))
    }

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, minute, 0).unwrap()
    }

    fn existing(start: DateTime<Utc>, end: DateTime<Utc>) -> Event {
        Event::new(
            "Existing gig",
            UserId::new(),
            music(),
            Location::new("Town Hall", "1 Queen St", "Auckland"),
            start,
            end,
            at(1, 0, 0),
        )
        .with_status(EventStatus::Published)
    }

    fn proposal(start: DateTime<Utc>, end: DateTime<Utc>) -> ProposedEvent {
        ProposedEvent::new(music(), "Auckland", start, end)
    }

    fn engine() -> ConflictDetectionEngine {
        ConflictDetectionEngine::default()
    }

    fn time(s: &str) -> Option<ClockTime> {
        Some(s.parse().unwrap())
    }

    #[test]
    fn scenario_a_thirty_minute_gap_conflicts() {
        let events = vec![existing(at(14, 14, 0), at(14, 16, 0))];
        let result = engine().check(&proposal(at(14, 16, 30), at(14, 18, 0)), &events, None);

        assert!(result.has_conflict);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].event_id, events[0].id);
        assert_eq!(result.conflicts[0].kind, ConflictKind::TimeOverlap);
        assert_eq!(result.conflicts[0].day, NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
    }

    #[test]
    fn scenario_b_ninety_minute_gap_still_conflicts() {
        // 17:30 - 60min = 16:30, which is before 16:00 + 60min = 17:00
        let events = vec![existing(at(14, 14, 0), at(14, 16, 0))];
        let result = engine().check(&proposal(at(14, 17, 30), at(14, 19, 0)), &events, None);
        assert!(result.has_conflict);
    }

    #[test]
    fn two_hour_gap_is_clear_on_either_side() {
        let events = vec![existing(at(14, 14, 0), at(14, 16, 0))];

        let after = engine().check(&proposal(at(14, 18, 0), at(14, 20, 0)), &events, None);
        assert!(!after.has_conflict);
        assert_eq!(after.message, "No conflicts found");
        assert!(after.suggestions.is_empty());

        let before = engine().check(&proposal(at(14, 11, 0), at(14, 12, 0)), &events, None);
        assert!(!before.has_conflict);

        let close_before = engine().check(&proposal(at(14, 11, 0), at(14, 12, 30)), &events, None);
        assert!(close_before.has_conflict);
    }

    #[test]
    fn buffer_is_configurable() {
        let events = vec![existing(at(14, 14, 0), at(14, 16, 0))];
        let tight = ConflictDetectionEngine::new(Duration::minutes(10));
        assert!(!tight.check(&proposal(at(14, 16, 30), at(14, 18, 0)), &events, None).has_conflict);
        assert!(tight.check(&proposal(at(14, 16, 15), at(14, 18, 0)), &events, None).has_conflict);
    }

    #[test]
    fn conflict_carries_message_and_suggestions() {
        let events = vec![existing(at(14, 14, 0), at(14, 16, 0))];
        let engine = engine().with_alternative_venues(vec!["Pier 1".into()]);
        let result = engine.check(&proposal(at(14, 15, 0), at(14, 17, 0)), &events, None);

        assert_eq!(result.message, "Found 1 conflicting event(s) in the same category and city");
        assert_eq!(result.suggestions.time_slots.len(), 3);
        assert_eq!(result.suggestions.dates.len(), 7);
        assert_eq!(result.suggestions.venues, vec!["Pier 1".to_string()]);
    }

    #[test]
    fn inactive_and_deleted_events_never_conflict() {
        for status in [
            EventStatus::Cancelled,
            EventStatus::Completed,
            EventStatus::Rejected,
            EventStatus::Unpublished,
            EventStatus::Deleted,
        ] {
            let events = vec![existing(at(14, 14, 0), at(14, 16, 0)).with_status(status)];
            let result = engine().check(&proposal(at(14, 14, 0), at(14, 16, 0)), &events, None);
            assert!(!result.has_conflict, "{status} should not conflict");
        }

        let mut deleted = existing(at(14, 14, 0), at(14, 16, 0));
        deleted.deleted_at = Some(at(2, 0, 0));
        let result = engine().check(&proposal(at(14, 14, 0), at(14, 16, 0)), &[deleted], None);
        assert!(!result.has_conflict);
    }

    #[test]
    fn scope_is_category_city_and_not_self() {
        let event = existing(at(14, 14, 0), at(14, 16, 0));
        let same_slot = proposal(at(14, 14, 0), at(14, 16, 0));

        let other_category = ProposedEvent { category: CategoryId::new(), ..same_slot.clone() };
        assert!(!engine().check(&other_category, &[event.clone()], None).has_conflict);

        let other_city = ProposedEvent { city: "Wellington".into(), ..same_slot.clone() };
        assert!(!engine().check(&other_city, &[event.clone()], None).has_conflict);

        assert!(!engine().check(&same_slot, &[event.clone()], Some(event.id)).has_conflict);
        assert!(engine().check(&same_slot, &[event], None).has_conflict);
    }

    #[test]
    fn city_comparison_is_exact_unless_normalized() {
        let events = vec![existing(at(14, 14, 0), at(14, 16, 0))];
        let sloppy = ProposedEvent { city: " auckland".into(), ..proposal(at(14, 14, 0), at(14, 16, 0)) };

        assert!(!engine().check(&sloppy, &events, None).has_conflict);
        let normalized = engine().with_city_match(CityMatch::Normalized);
        assert!(normalized.check(&sloppy, &events, None).has_conflict);
    }

    #[test]
    fn all_day_proposal_blocks_every_touched_day() {
        let events = vec![
            existing(at(15, 20, 0), at(15, 22, 0)),
            existing(at(17, 9, 0), at(17, 10, 0)),
        ];
        let result = engine().check(&proposal(at(14, 0, 0), at(16, 0, 0)), &events, None);

        assert!(result.has_conflict);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].kind, ConflictKind::AllDay);
        assert_eq!(result.conflicts[0].event_id, events[0].id);
    }

    #[test]
    fn existing_all_day_event_blocks_short_proposals() {
        let events = vec![existing(at(14, 0, 0), at(15, 0, 0))];
        let result = engine().check(&proposal(at(14, 21, 0), at(14, 22, 0)), &events, None);

        assert!(result.has_conflict);
        assert_eq!(result.conflicts[0].kind, ConflictKind::AllDay);
    }

    #[test]
    fn clock_times_refine_multi_day_events() {
        // Three-day festival, 10:00 to 12:00 each day
        let festival = existing(at(14, 10, 0), at(16, 12, 0)).with_clock_times(time("10:00"), time("12:00"));
        let events = vec![festival];

        let lunchtime = proposal(at(15, 12, 30), at(15, 13, 0));
        assert!(engine().check(&lunchtime, &events, None).has_conflict);

        let afternoon = proposal(at(15, 15, 0), at(15, 16, 0));
        assert!(!engine().check(&afternoon, &events, None).has_conflict);
    }

    #[test]
    fn proposal_spanning_midnight_checks_both_days() {
        let events = vec![
            existing(at(14, 18, 0), at(14, 19, 0)),
            existing(at(15, 2, 30), at(15, 4, 0)),
            existing(at(15, 9, 0), at(15, 10, 0)),
        ];
        let result = engine().check(&proposal(at(14, 20, 0), at(15, 2, 0)), &events, None);

        let hits: Vec<_> = result.conflicts.iter().map(|c| (c.event_id, c.day)).collect();
        assert_eq!(
            hits,
            vec![
                (events[0].id, NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()),
                (events[1].id, NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()),
            ]
        );
    }

    #[test]
    fn overnight_clock_times_roll_into_the_next_day() {
        let late_show = proposal(at(14, 22, 0), at(15, 1, 0)).with_clock_times(time("22:00"), time("01:00"));
        let events = vec![existing(at(15, 0, 30), at(15, 2, 0))];

        let result = engine().check(&late_show, &events, None);
        assert!(result.has_conflict);
        assert_eq!(result.conflicts.len(), 1);
    }

    #[test]
    fn event_touching_two_days_is_reported_per_day() {
        let events = vec![existing(at(14, 23, 0), at(15, 1, 0))];
        let result = engine().check(&proposal(at(14, 22, 0), at(15, 3, 0)), &events, None);

        assert_eq!(result.conflicts.len(), 2);
        let unique: HashSet<_> = result.conflicts.iter().map(|c| (c.event_id, c.day)).collect();
        assert_eq!(unique.len(), 2);
    }

    #[test]
    fn days_follow_the_configured_offset() {
        // In UTC+13 the existing event is 23:00 to midnight on the 14th and
        // the two-day proposal starts half an hour into the 15th
        let events = vec![existing(at(14, 10, 0), at(14, 11, 0))];
        let two_days = proposal(at(14, 11, 30), at(16, 11, 30));

        let in_utc = engine().check(&two_days, &events, None);
        assert!(in_utc.has_conflict);
        assert_eq!(in_utc.conflicts[0].kind, ConflictKind::AllDay);
        assert_eq!(in_utc.conflicts[0].day, NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());

        let auckland = ConflictDetectionEngine::new(Duration::zero())
            .with_utc_offset(FixedOffset::east_opt(13 * 3600).unwrap());
        assert!(!auckland.check(&two_days, &events, None).has_conflict);
    }

    #[test]
    fn buffer_reaches_across_midnight() {
        let events = vec![existing(at(14, 23, 0), at(14, 23, 45))];
        let result = engine().check(&proposal(at(15, 0, 30), at(15, 1, 30)), &events, None);

        assert!(result.has_conflict);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].kind, ConflictKind::TimeOverlap);
        assert_eq!(result.conflicts[0].day, NaiveDate::from_ymd_opt(2025, 3, 15).unwrap());

        let reverse = engine().check(
            &ProposedEvent::from_event(&events[0]),
            &[existing(at(15, 0, 30), at(15, 1, 30))],
            None,
        );
        assert!(reverse.has_conflict);
    }

    #[test]
    fn buffer_reaches_a_clock_timed_event_on_the_previous_day() {
        let late = existing(at(14, 22, 0), at(14, 23, 30)).with_clock_times(time("22:00"), time("23:30"));
        let result = engine().check(&proposal(at(15, 0, 15), at(15, 1, 0)), &[late], None);
        assert!(result.has_conflict);
    }

    #[test]
    fn all_day_proposal_sees_buffered_neighbours() {
        // Two-day proposal ending at midnight; the next morning's event
        // starts inside the buffer
        let events = vec![existing(at(16, 0, 30), at(16, 2, 0))];
        let result = engine().check(&proposal(at(14, 0, 0), at(16, 0, 0)), &events, None);

        assert!(result.has_conflict);
        assert_eq!(result.conflicts[0].kind, ConflictKind::TimeOverlap);
    }

    #[test]
    fn buffer_is_clamped_to_a_day() {
        assert_eq!(ConflictDetectionEngine::new(Duration::weeks(52)).buffer(), Duration::days(1));
        assert_eq!(ConflictDetectionEngine::new(Duration::minutes(-5)).buffer(), Duration::zero());

        let engine = ConflictDetectionEngine::from_config(&ConflictConfig {
            buffer_minutes: i64::MAX,
            ..ConflictConfig::default()
        });
        assert_eq!(engine.buffer(), Duration::days(1));
    }

    #[test]
    fn all_day_proposal_with_clock_times_is_compared_per_day() {
        let weekend = proposal(at(14, 10, 0), at(16, 12, 0)).with_clock_times(time("10:00"), time("12:00"));
        let evening = vec![existing(at(15, 19, 0), at(15, 21, 0))];
        assert!(!engine().check(&weekend, &evening, None).has_conflict);

        let coarse = proposal(at(14, 10, 0), at(16, 12, 0));
        assert!(engine().check(&coarse, &evening, None).has_conflict);
    }

    #[test]
    fn from_config_applies_every_setting() {
        let engine = ConflictDetectionEngine::from_config(&ConflictConfig {
            buffer_minutes: 15,
            utc_offset_minutes: 780,
            normalize_city: true,
            alternative_venues: vec!["Pier 1".into()],
        });
        assert_eq!(engine.buffer(), Duration::minutes(15));
        assert_eq!(engine.city_match(), CityMatch::Normalized);
        assert_eq!(engine.offset.local_minus_utc(), 780 * 60);
        assert_eq!(engine.alternative_venues, vec!["Pier 1".to_string()]);
    }

    proptest! {
        #[test]
        fn verdict_is_symmetric(
            a_start in 0i64..4320,
            a_len in 15i64..2160,
            b_start in 0i64..4320,
            b_len in 15i64..2160,
            buffer in 0i64..180,
        ) {
            let base = at(14, 0, 0);
            let a = existing(base + Duration::minutes(a_start), base + Duration::minutes(a_start + a_len));
            let b = existing(base + Duration::minutes(b_start), base + Duration::minutes(b_start + b_len));
            let engine = ConflictDetectionEngine::new(Duration::minutes(buffer));

            let a_vs_b = engine.check(&ProposedEvent::from_event(&a), std::slice::from_ref(&b), None);
            let b_vs_a = engine.check(&ProposedEvent::from_event(&b), std::slice::from_ref(&a), None);
            prop_assert_eq!(a_vs_b.has_conflict, b_vs_a.has_conflict);
        }

        #[test]
        fn buffered_intersection_is_reported(
            a_start in 0i64..4320,
            a_len in 15i64..1439,
            b_start in 0i64..4320,
            b_len in 15i64..1439,
            buffer in 0i64..180,
        ) {
            let base = at(14, 0, 0);
            let (a_from, a_to) = (base + Duration::minutes(a_start), base + Duration::minutes(a_start + a_len));
            let (b_from, b_to) = (base + Duration::minutes(b_start), base + Duration::minutes(b_start + b_len));
            let b = existing(b_from, b_to);
            let gap = Duration::minutes(buffer);

            let expected = (b_from - gap < a_to + gap && b_to > a_from)
                || (a_from - gap < b_to + gap && a_to > b_from);
            let result = ConflictDetectionEngine::new(gap).check(&proposal(a_from, a_to), &[b], None);
            prop_assert_eq!(result.has_conflict, expected);
        }

        #[test]
        fn inactive_status_never_conflicts(
            start in 0i64..1440,
            len in 15i64..600,
            status in prop::sample::select(vec![
                EventStatus::Cancelled,
                EventStatus::Completed,
                EventStatus::Rejected,
                EventStatus::Unpublished,
                EventStatus::Deleted,
            ]),
        ) {
            let base = at(14, 0, 0);
            let event = existing(base + Duration::minutes(start), base + Duration::minutes(start + len))
                .with_status(status);
            let result = engine().check(&ProposedEvent::from_event(&event), &[event.clone()], None);
            prop_assert!(!result.has_conflict);
        }
    }
}
