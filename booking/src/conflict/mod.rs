//! Conflict policies for pencil holds.
//!
//! Two independent checks guard hold creation:
//!
//! - [`ConflictDetectionEngine`]: same category and city, buffered time
//!   overlap against every active event.
//! - [`VenueCollisionPolicy`]: same venue, plain time overlap against other
//!   active holds only.
//!
//! They have different scopes and report through different
//! [`ConflictScope`](crate::error::ConflictScope)s, so they stay separate.

mod engine;
mod suggestions;
mod venue;

pub use engine::{ConflictDetectionEngine, ConflictKind, ConflictResult, ConflictingEvent, MAX_BUFFER_MINUTES};
pub use suggestions::{AlternativeSuggestions, TimeSlotSuggestion};
pub use venue::{VenueClaim, VenueCollisionPolicy};

use serde::{Deserialize, Serialize};

/// How cities are compared when scoping conflicts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CityMatch {
    /// Literal string equality
    #[default]
    Exact,
    /// Equality after trimming and lowercasing
    Normalized,
}

impl CityMatch {
    /// Whether two city names denote the same city
    #[must_use]
    pub fn matches(self, a: &str, b: &str) -> bool {
        match self {
            Self::Exact => a == b,
            Self::Normalized => a.trim().to_lowercase() == b.trim().to_lowercase(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_is_literal() {
        assert!(CityMatch::Exact.matches("Auckland", "Auckland"));
        assert!(!CityMatch::Exact.matches("Auckland", "auckland "));
    }

    #[test]
    fn normalized_match_ignores_case_and_padding() {
        assert!(CityMatch::Normalized.matches("Auckland", "  auckland "));
        assert!(!CityMatch::Normalized.matches("Auckland", "Wellington"));
    }
}
