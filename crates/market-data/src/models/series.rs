use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::candle::Candle;
use super::interval::Interval;
use super::range::TimeRange;

/// What a series' rows represent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    /// OHLCV candles.
    Ohlcv,
    /// Perpetual funding rate history.
    Funding,
    /// Rows of a saved analytics query.
    Query,
}

impl SeriesKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ohlcv => "ohlcv",
            Self::Funding => "funding",
            Self::Query => "query",
        }
    }
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a persisted series: (provider, symbol, kind, interval).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub provider: String,
    pub symbol: String,
    pub kind: SeriesKind,
    pub interval: Interval,
}

impl SeriesKey {
    pub fn ohlcv(provider: impl Into<String>, symbol: impl Into<String>, interval: Interval) -> Self {
        Self {
            provider: provider.into(),
            symbol: symbol.into(),
            kind: SeriesKind::Ohlcv,
            interval,
        }
    }

    /// Dataset identifier used in the collection log, e.g. `ETH_ohlcv_1h`.
    pub fn dataset_id(&self) -> String {
        format!("{}_{}_{}", self.symbol, self.kind, self.interval)
    }
}

/// Ordered rows for one (provider, symbol, interval).
///
/// Rows are sorted ascending by `open_time` and no two rows share a
/// (symbol, open_time) pair. Every constructor enforces this.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub provider: String,
    pub symbol: String,
    pub interval: Interval,
    pub kind: SeriesKind,
    candles: Vec<Candle>,
}

impl TimeSeries {
    pub fn empty(
        provider: impl Into<String>,
        symbol: impl Into<String>,
        interval: Interval,
        kind: SeriesKind,
    ) -> Self {
        Self {
            provider: provider.into(),
            symbol: symbol.into(),
            interval,
            kind,
            candles: Vec::new(),
        }
    }

    /// Build a series from rows in arrival order.
    ///
    /// The first occurrence of each (symbol, open_time) wins; the survivors
    /// are then sorted ascending by `open_time`.
    pub fn from_rows(
        provider: impl Into<String>,
        symbol: impl Into<String>,
        interval: Interval,
        kind: SeriesKind,
        rows: Vec<Candle>,
    ) -> Self {
        Self {
            candles: dedup_sorted(rows),
            ..Self::empty(provider, symbol, interval, kind)
        }
    }

    pub fn key(&self) -> SeriesKey {
        SeriesKey {
            provider: self.provider.clone(),
            symbol: self.symbol.clone(),
            kind: self.kind,
            interval: self.interval.clone(),
        }
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn into_candles(self) -> Vec<Candle> {
        self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn first_open_time(&self) -> Option<DateTime<Utc>> {
        self.candles.first().map(|c| c.open_time)
    }

    pub fn last_open_time(&self) -> Option<DateTime<Utc>> {
        self.candles.last().map(|c| c.open_time)
    }

    /// Drop rows whose `open_time` falls outside `range`.
    pub fn retain_within(&mut self, range: &TimeRange) {
        self.candles.retain(|c| range.contains(c.open_time));
    }
}

/// First-seen dedup on (symbol, open_time) followed by a stable ascending sort.
pub(crate) fn dedup_sorted(rows: Vec<Candle>) -> Vec<Candle> {
    let mut seen: HashSet<(String, DateTime<Utc>)> = HashSet::with_capacity(rows.len());
    let mut unique: Vec<Candle> = rows
        .into_iter()
        .filter(|c| seen.insert((c.symbol.clone(), c.open_time)))
        .collect();
    unique.sort_by_key(|c| c.open_time);
    unique
}
