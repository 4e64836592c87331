//! Closed time interval used as a request filter and as an accumulator.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A closed interval `[start_at, end_at]`.
///
/// The zero range has both bounds at the zero instant (`DateTime::<Utc>::default()`).
/// Construction does not enforce `start_at <= end_at`; callers check [`TimeRange::is_valid`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start_at: DateTime<Utc>, end_at: DateTime<Utc>) -> Self {
        Self { start_at, end_at }
    }

    /// The zero instant.
    pub fn zero_instant() -> DateTime<Utc> {
        DateTime::<Utc>::default()
    }

    pub fn is_zero(&self) -> bool {
        self.start_at == Self::zero_instant() && self.end_at == Self::zero_instant()
    }

    pub fn is_valid(&self) -> bool {
        self.start_at <= self.end_at
    }

    /// Inclusive on both ends.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start_at <= t && t <= self.end_at
    }

    pub fn duration(&self) -> Duration {
        self.end_at - self.start_at
    }

    /// Widen the range to cover a log that lived from `created` to `completed`.
    ///
    /// A zero `start_at` is always replaced, even by an instant later than
    /// one already seen; after that only earlier instants replace it.
    pub fn widen(&mut self, created: DateTime<Utc>, completed: DateTime<Utc>) {
        if self.start_at > created || self.start_at == Self::zero_instant() {
            self.start_at = created;
        }
        if self.end_at < completed {
            self.end_at = completed;
        }
    }
}
