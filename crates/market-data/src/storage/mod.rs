//! Persistence collaborators.
//!
//! The scheduler is the only writer to a [`Sink`]. A [`Source`] reads back
//! what earlier cycles persisted; the acquisition path never reads its own
//! writes mid-cycle.

mod file_store;

pub use file_store::FileStore;

use crate::errors::MarketDataError;
use crate::models::{CollectionLogRecord, ConsolidatedEntry, Interval, SeriesKey, TimeSeries};

/// Append-only destination for collected data.
pub trait Sink: Send + Sync {
    /// Persist one series as a new object and return its location.
    ///
    /// Never overwrites an earlier write.
    fn write(
        &self,
        provider: &str,
        symbol: &str,
        interval: &Interval,
        series: &TimeSeries,
    ) -> Result<String, MarketDataError>;

    /// Replace the persisted collection log with `records`.
    fn write_collection_log(&self, records: &[CollectionLogRecord]) -> Result<String, MarketDataError>;

    /// Persist a consolidation summary and return its location.
    fn write_consolidated(&self, entries: &[ConsolidatedEntry]) -> Result<String, MarketDataError>;
}

/// Read path over previously persisted data.
pub trait Source: Send + Sync {
    /// Load the series stored under `key`.
    ///
    /// With `latest_only`, only the most recent write is returned; otherwise
    /// all writes are merged, the newest observation of a row winning.
    fn load_series(&self, key: &SeriesKey, latest_only: bool) -> Result<TimeSeries, MarketDataError>;

    /// Load an OHLCV series.
    fn load(
        &self,
        provider: &str,
        symbol: &str,
        interval: &Interval,
        latest_only: bool,
    ) -> Result<TimeSeries, MarketDataError> {
        self.load_series(
            &SeriesKey::ohlcv(provider, symbol, interval.clone()),
            latest_only,
        )
    }

    /// The persisted collection log, empty if none was written yet.
    fn load_collection_log(&self) -> Result<Vec<CollectionLogRecord>, MarketDataError>;
}
