//! Advisory alternatives offered alongside a conflict.
//!
//! Nothing here is checked against the calendar. The time bands are a fixed
//! menu and the venues a configured list.

use crate::types::{ClockTime, ProposedEvent};
use chrono::{FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

/// A same-day time band
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlotSuggestion {
    /// Band name
    pub label: String,
    /// Start of the band
    pub start: ClockTime,
    /// End of the band
    pub end: ClockTime,
}

/// Non-binding hints for moving a conflicting event
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternativeSuggestions {
    /// Time bands on the same day
    pub time_slots: Vec<TimeSlotSuggestion>,
    /// The following calendar days
    pub dates: Vec<NaiveDate>,
    /// Other venues
    pub venues: Vec<String>,
}

impl AlternativeSuggestions {
    /// Nothing to suggest
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.time_slots.is_empty() && self.dates.is_empty() && self.venues.is_empty()
    }
}

const BANDS: [(&str, u32, u32); 3] = [("Morning", 9, 12), ("Afternoon", 13, 17), ("Evening", 18, 22)];

const ALTERNATIVE_DAYS: usize = 7;

pub(super) fn suggest(
    proposed: &ProposedEvent,
    offset: FixedOffset,
    venues: &[String],
) -> AlternativeSuggestions {
    let time_slots = BANDS
        .iter()
        .filter_map(|&(label, start, end)| {
            Some(TimeSlotSuggestion {
                label: label.to_string(),
                start: hour(start)?,
                end: hour(end)?,
            })
        })
        .collect();

    let first_day = proposed.start_date.with_timezone(&offset).date_naive();
    let dates = first_day
        .iter_days()
        .skip(1)
        .take(ALTERNATIVE_DAYS)
        .collect();

    AlternativeSuggestions {
        time_slots,
        dates,
        venues: venues.to_vec(),
    }
}

fn hour(h: u32) -> Option<ClockTime> {
    ClockTime::from_hm(h, 0).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::CategoryId;
    use chrono::{TimeZone, Utc};

    #[test]
    fn offers_three_bands_seven_days_and_the_venues() {
        let start = Utc.with_ymd_and_hms(2025, 3, 14, 16, 30, 0).unwrap();
        let proposed = ProposedEvent::new(CategoryId::new(), "Auckland", start, start + chrono::Duration::hours(2));
        let venues = vec!["Pier 1".to_string()];

        let suggestions = suggest(&proposed, FixedOffset::east_opt(0).unwrap(), &venues);

        let labels: Vec<_> = suggestions.time_slots.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["Morning", "Afternoon", "Evening"]);
        assert_eq!(suggestions.time_slots[2].start.to_string(), "18:00");
        assert_eq!(suggestions.time_slots[2].end.to_string(), "22:00");

        assert_eq!(suggestions.dates.len(), 7);
        assert_eq!(suggestions.dates[0], NaiveDate::from_ymd_opt(2025, 3, 15).unwrap());
        assert_eq!(suggestions.dates[6], NaiveDate::from_ymd_opt(2025, 3, 21).unwrap());
        assert_eq!(suggestions.venues, venues);
    }

    #[test]
    fn dates_follow_the_local_calendar() {
        // 23:30 UTC on the 14th is already the 15th in Auckland (+13:00)
        let start = Utc.with_ymd_and_hms(2025, 3, 14, 23, 30, 0).unwrap();
        let proposed = ProposedEvent::new(CategoryId::new(), "Auckland", start, start + chrono::Duration::hours(1));

        let suggestions = suggest(&proposed, FixedOffset::east_opt(13 * 3600).unwrap(), &[]);
        assert_eq!(suggestions.dates[0], NaiveDate::from_ymd_opt(2025, 3, 16).unwrap());
    }
}
