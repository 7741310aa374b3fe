use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Minutes per bucket for every interval code the engine knows about.
const INTERVAL_MINUTES: &[(&str, i64)] = &[
    ("1m", 1),
    ("3m", 3),
    ("5m", 5),
    ("15m", 15),
    ("30m", 30),
    ("1h", 60),
    ("2h", 120),
    ("4h", 240),
    ("6h", 360),
    ("8h", 480),
    ("12h", 720),
    ("1d", 1_440),
    ("3d", 4_320),
    ("1w", 10_080),
    ("1M", 43_800),
];

/// Fallback granularity for codes missing from the table.
const DAILY_MINUTES: i64 = 1_440;

/// Candle granularity code as understood by upstream APIs ("1m", "1h", "1d", ...).
///
/// Codes are case-sensitive: "1m" is one minute, "1M" is one month.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Interval(String);

impl Interval {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the code is in the lookup table.
    pub fn is_known(&self) -> bool {
        Self::lookup(&self.0).is_some()
    }

    /// Length of one bucket. Unknown codes fall back to one day.
    pub fn duration(&self) -> Duration {
        Duration::minutes(Self::lookup(&self.0).unwrap_or(DAILY_MINUTES))
    }

    /// Every interval code in the lookup table, shortest first.
    pub fn known() -> impl Iterator<Item = Interval> {
        INTERVAL_MINUTES.iter().map(|(code, _)| Interval::new(*code))
    }

    fn lookup(code: &str) -> Option<i64> {
        INTERVAL_MINUTES
            .iter()
            .find(|(known, _)| *known == code)
            .map(|(_, minutes)| *minutes)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Interval {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}
