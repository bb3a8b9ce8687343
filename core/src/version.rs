//! Record versioning for optimistic concurrency control.
//!
//! Every persisted record (event document, pencil hold) carries a [`Version`].
//! A writer states the version it read; the store rejects the write if the
//! record moved on in the meantime. The caller then reloads and re-validates
//! instead of silently overwriting someone else's transition.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Version number of a stored record.
///
/// Versions start at [`Version::INITIAL`] when a record is first inserted and
/// increment by one on every successful write.
///
/// # Examples
///
/// ```
/// use pencilbook_core::version::Version;
///
/// let v1 = Version::INITIAL.next();
/// assert_eq!(v1, Version::new(2));
/// assert_eq!(v1.value(), 2);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// The version assigned to a freshly inserted record.
    pub const INITIAL: Self = Self(1);

    /// Create a new `Version` with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the version number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Get the next version (current + 1).
    ///
    /// Saturates at `u64::MAX`; no record is written that often.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Version> for u64 {
    fn from(version: Version) -> Self {
        version.0
    }
}
