//! In-memory collection log.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{CollectionLogRecord, SeriesKey};

/// Aggregate view over the collection log.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub total_records: usize,
    pub per_provider: BTreeMap<String, usize>,
    pub per_dataset: BTreeMap<String, usize>,
    pub total_rows: usize,
    pub latest: Option<DateTime<Utc>>,
}

/// Append-only record of every dataset written, in write order.
#[derive(Clone, Debug, Default)]
pub struct CollectionLog {
    records: Vec<CollectionLogRecord>,
}

impl CollectionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<CollectionLogRecord>) -> Self {
        Self { records }
    }

    pub fn append(&mut self, record: CollectionLogRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[CollectionLogRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Most recent record of every distinct series.
    pub fn latest_per_series(&self) -> BTreeMap<SeriesKey, &CollectionLogRecord> {
        let mut latest: BTreeMap<SeriesKey, &CollectionLogRecord> = BTreeMap::new();
        for record in &self.records {
            let key = record.key();
            match latest.get(&key) {
                Some(existing) if existing.timestamp > record.timestamp => {}
                _ => {
                    latest.insert(key, record);
                }
            }
        }
        latest
    }

    pub fn stats(&self) -> CollectionStats {
        let mut stats = CollectionStats {
            total_records: self.records.len(),
            ..CollectionStats::default()
        };
        for record in &self.records {
            *stats.per_provider.entry(record.provider.clone()).or_default() += 1;
            *stats.per_dataset.entry(record.dataset.clone()).or_default() += 1;
            stats.total_rows += record.rows;
            stats.latest = stats.latest.max(Some(record.timestamp));
        }
        stats
    }
}
