use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::interval::Interval;
use super::series::{SeriesKey, SeriesKind};
use super::types::DatasetId;

/// One successful dataset write. Append-only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionLogRecord {
    pub timestamp: DateTime<Utc>,
    pub provider: String,
    pub symbol: String,
    pub kind: SeriesKind,
    pub interval: Interval,
    /// e.g. "ETH_ohlcv_1h"
    pub dataset: DatasetId,
    pub rows: usize,
    /// Where the sink put the data.
    pub location: String,
}

impl CollectionLogRecord {
    pub fn key(&self) -> SeriesKey {
        SeriesKey {
            provider: self.provider.clone(),
            symbol: self.symbol.clone(),
            kind: self.kind,
            interval: self.interval.clone(),
        }
    }
}

/// Summary of the latest stored data for one dataset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatedEntry {
    pub provider: String,
    pub dataset: DatasetId,
    pub rows: usize,
    pub first_open_time: Option<DateTime<Utc>>,
    pub last_open_time: Option<DateTime<Utc>>,
    pub consolidated_at: DateTime<Utc>,
}
