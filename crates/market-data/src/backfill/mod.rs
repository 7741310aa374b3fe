//! Chunked historical backfill.
//!
//! A single provider call is capped at `max_rows_per_call` rows, so a long
//! `[start, end)` range is split into consecutive windows (see
//! [`plan_chunks`]), fetched one at a time in order, then merged with
//! first-seen dedup and an ascending sort (see [`merge_chunks`]).
//!
//! A failed window becomes an entry in the failure manifest rather than
//! failing the whole range, unless the engine is configured to abort.

mod merge;
mod plan;
mod validator;

pub use merge::merge_chunks;
pub use plan::plan_chunks;
pub use validator::{CandleValidator, ValidationReport, ValidatorConfig};

use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::errors::{MarketDataError, RetryClass};
use crate::models::{Candle, Interval, SeriesKind, TimeRange, TimeSeries};
use crate::provider::MarketDataProvider;
use crate::stop::StopSignal;

/// Default delay between two chunk requests.
pub const DEFAULT_PACE: Duration = Duration::from_millis(100);

/// What to do when one chunk fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failed window and keep going.
    #[default]
    SkipAndContinue,
    /// Return the chunk's error and discard everything collected.
    Abort,
}

/// A window that could not be fetched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkFailure {
    pub range: TimeRange,
    pub error: String,
    pub retry_class: RetryClass,
}

/// Result of a backfill.
#[derive(Clone, Debug)]
pub struct BackfillOutcome {
    pub series: TimeSeries,
    pub chunks_requested: usize,
    /// Failure manifest, in request order.
    pub failed: Vec<ChunkFailure>,
    /// Rows violating candle invariants (kept in `series`).
    pub flagged_rows: usize,
}

impl BackfillOutcome {
    /// True when every chunk was fetched.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Sequential, rate-friendly backfill over one provider.
#[derive(Clone, Debug)]
pub struct BackfillEngine {
    pace: Duration,
    policy: FailurePolicy,
    validator: CandleValidator,
}

impl Default for BackfillEngine {
    fn default() -> Self {
        Self::new(DEFAULT_PACE, FailurePolicy::default())
    }
}

impl BackfillEngine {
    pub fn new(pace: Duration, policy: FailurePolicy) -> Self {
        Self {
            pace,
            policy,
            validator: CandleValidator::new(),
        }
    }

    pub fn with_validator(mut self, validator: CandleValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn pace(&self) -> Duration {
        self.pace
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Backfill OHLCV candles for `symbol` over `range`.
    pub async fn backfill(
        &self,
        provider: &dyn MarketDataProvider,
        symbol: &str,
        interval: &Interval,
        range: TimeRange,
        stop: &StopSignal,
    ) -> Result<BackfillOutcome, MarketDataError> {
        self.backfill_kind(provider, SeriesKind::Ohlcv, symbol, interval, range, stop)
            .await
    }

    /// Backfill a series of `kind` for `symbol` over `range`.
    ///
    /// Returns `Cancelled` (and nothing collected) if `stop` fires while a
    /// chunk is in flight or during pacing.
    pub async fn backfill_kind(
        &self,
        provider: &dyn MarketDataProvider,
        kind: SeriesKind,
        symbol: &str,
        interval: &Interval,
        range: TimeRange,
        stop: &StopSignal,
    ) -> Result<BackfillOutcome, MarketDataError> {
        let max_rows = provider.max_rows_per_call(kind, interval);
        let chunks = plan_chunks(&range, interval, max_rows);
        debug!(
            "Backfill {} {} {} {}: {} chunk(s) of up to {} rows",
            provider.name(),
            symbol,
            kind,
            range,
            chunks.len(),
            max_rows
        );

        let mut series_symbol = symbol.to_string();
        let mut series_kind = kind;
        let mut collected: Vec<Vec<Candle>> = Vec::with_capacity(chunks.len());
        let mut failed = Vec::new();

        for (index, chunk) in chunks.iter().enumerate() {
            if index > 0 && !self.pace.is_zero() {
                tokio::select! {
                    biased;
                    _ = stop.stopped() => return Err(MarketDataError::Cancelled),
                    _ = tokio::time::sleep(self.pace) => {}
                }
            }
            if stop.is_stopped() {
                return Err(MarketDataError::Cancelled);
            }

            let result = tokio::select! {
                biased;
                _ = stop.stopped() => return Err(MarketDataError::Cancelled),
                result = fetch_chunk(provider, kind, symbol, interval, *chunk) => result,
            };

            match result {
                Ok(series) => {
                    info!(
                        "Collected {} rows of {} {} for {}",
                        series.len(),
                        provider.name(),
                        series.symbol,
                        chunk
                    );
                    series_symbol = series.symbol.clone();
                    series_kind = series.kind;
                    collected.push(series.into_candles());
                }
                Err(MarketDataError::Cancelled) => return Err(MarketDataError::Cancelled),
                Err(e) => match self.policy {
                    FailurePolicy::Abort => {
                        warn!(
                            "Chunk {} of {} {} failed, aborting range: {}",
                            chunk,
                            provider.name(),
                            symbol,
                            e
                        );
                        return Err(e);
                    }
                    FailurePolicy::SkipAndContinue => {
                        warn!(
                            "Chunk {} of {} {} failed, skipping: {}",
                            chunk,
                            provider.name(),
                            symbol,
                            e
                        );
                        failed.push(ChunkFailure {
                            range: *chunk,
                            error: e.to_string(),
                            retry_class: e.retry_class(),
                        });
                    }
                },
            }
        }

        let candles = merge_chunks(collected, &range);
        let series = TimeSeries::from_rows(
            provider.name(),
            series_symbol,
            interval.clone(),
            series_kind,
            candles,
        );
        let flagged_rows = self.validator.inspect(&series).flagged_rows;

        if !chunks.is_empty() {
            info!(
                "Backfill {} {} {} complete: {} rows, {}/{} chunks failed",
                provider.name(),
                series.symbol,
                range,
                series.len(),
                failed.len(),
                chunks.len()
            );
        }

        Ok(BackfillOutcome {
            series,
            chunks_requested: chunks.len(),
            failed,
            flagged_rows,
        })
    }
}

async fn fetch_chunk(
    provider: &dyn MarketDataProvider,
    kind: SeriesKind,
    symbol: &str,
    interval: &Interval,
    chunk: TimeRange,
) -> Result<TimeSeries, MarketDataError> {
    match kind {
        SeriesKind::Funding => provider.fetch_funding_rates(symbol, chunk).await,
        SeriesKind::Ohlcv | SeriesKind::Query => {
            provider.fetch_market_data(symbol, interval, chunk).await
        }
    }
}
