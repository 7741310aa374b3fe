use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Half-open time window `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The window of length `lookback` ending at `now`.
    pub fn trailing(now: DateTime<Utc>, lookback: Duration) -> Self {
        Self {
            start: now - lookback,
            end: now,
        }
    }

    /// True when `start >= end`; such a range selects nothing.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    pub fn duration(&self) -> Duration {
        if self.is_empty() {
            Duration::zero()
        } else {
            self.end - self.start
        }
    }

    /// Start as epoch milliseconds.
    pub fn start_millis(&self) -> i64 {
        self.start.timestamp_millis()
    }

    /// Last included millisecond, for APIs whose end bound is inclusive.
    pub fn inclusive_end_millis(&self) -> i64 {
        self.end.timestamp_millis() - 1
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_half_open() {
        let range = TimeRange::new(at(1, 0), at(2, 0));
        assert!(range.contains(at(1, 0)));
        assert!(range.contains(at(1, 23)));
        assert!(!range.contains(at(2, 0)));
    }

    #[test]
    fn test_empty_ranges() {
        assert!(TimeRange::new(at(2, 0), at(2, 0)).is_empty());
        assert!(TimeRange::new(at(3, 0), at(2, 0)).is_empty());
        assert_eq!(TimeRange::new(at(3, 0), at(2, 0)).duration(), Duration::zero());
    }

    #[test]
    fn test_inclusive_end_millis() {
        let range = TimeRange::new(at(1, 0), at(2, 0));
        assert_eq!(range.inclusive_end_millis(), at(2, 0).timestamp_millis() - 1);
    }

    #[test]
    fn test_trailing() {
        let range = TimeRange::trailing(at(2, 0), Duration::hours(24));
        assert_eq!(range.start, at(1, 0));
        assert_eq!(range.end, at(2, 0));
    }
}
