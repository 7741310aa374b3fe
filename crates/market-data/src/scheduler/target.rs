use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Interval, TimeRange};

/// Funding history is collected at hourly granularity.
pub const FUNDING_INTERVAL: &str = "1h";

/// Longer lookbacks are clamped to about a century.
const MAX_LOOKBACK_MINUTES: u64 = 100 * 365 * 24 * 60;

/// How much history a target collects per cycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CollectionMode {
    /// The trailing window ending now.
    Latest { lookback_minutes: u64 },
    /// A fixed historical range; an open end means "until now".
    Backfill {
        start: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end: Option<DateTime<Utc>>,
    },
}

impl CollectionMode {
    /// The `[start, end)` window to collect when run at `now`.
    pub fn range(&self, now: DateTime<Utc>) -> TimeRange {
        match self {
            Self::Latest { lookback_minutes } => {
                let minutes = (*lookback_minutes).min(MAX_LOOKBACK_MINUTES) as i64;
                TimeRange::trailing(now, Duration::minutes(minutes))
            }
            Self::Backfill { start, end } => TimeRange::new(*start, end.unwrap_or(now)),
        }
    }
}

/// Symbols to collect from one provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollectionTarget {
    /// Registry name of the provider.
    pub provider: String,
    pub symbols: Vec<String>,
    pub interval: Interval,
    pub mode: CollectionMode,
    /// Also collect funding history for each symbol.
    #[serde(default)]
    pub include_funding: bool,
}

impl CollectionTarget {
    pub fn latest(
        provider: impl Into<String>,
        symbols: impl IntoIterator<Item = impl Into<String>>,
        interval: Interval,
        lookback_minutes: u64,
    ) -> Self {
        Self {
            provider: provider.into(),
            symbols: symbols.into_iter().map(Into::into).collect(),
            interval,
            mode: CollectionMode::Latest { lookback_minutes },
            include_funding: false,
        }
    }

    pub fn with_funding(mut self) -> Self {
        self.include_funding = true;
        self
    }
}
