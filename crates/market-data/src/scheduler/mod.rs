//! Collection scheduler.
//!
//! A [`Scheduler`] walks its [`CollectionTarget`]s once per cycle, backfills
//! each (provider, symbol) through the [`BackfillEngine`], writes every
//! non-empty series to the sink and records it in the collection log.
//!
//! State moves `Idle -> Collecting -> Idle` for a cycle and
//! `Idle -> Sleeping -> Idle` between cycles. A stop request wakes a
//! sleeping scheduler at once; during a cycle it cancels the in-flight
//! backfill, which is then discarded without a write.

mod log;
mod target;

pub use self::log::{CollectionLog, CollectionStats};
pub use target::{CollectionMode, CollectionTarget, FUNDING_INTERVAL};

use std::sync::Arc;
use std::time::Duration;

use ::log::{debug, error, info, warn};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::backfill::{BackfillEngine, BackfillOutcome, ChunkFailure};
use crate::errors::MarketDataError;
use crate::models::{
    CollectionLogRecord, ConsolidatedEntry, Interval, SeriesKind, TimeRange,
};
use crate::provider::MarketDataProvider;
use crate::registry::{guarded, ProviderRegistry};
use crate::stop::StopSignal;
use crate::storage::{Sink, Source};

/// Default UTC wall-clock time of the daily consolidation.
pub const DEFAULT_CONSOLIDATION_TIME: (u32, u32) = (2, 0);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Collecting,
    Sleeping,
}

/// A chunk that failed during a cycle, with the dataset it belonged to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRange {
    pub provider: String,
    pub symbol: String,
    pub kind: SeriesKind,
    #[serde(flatten)]
    pub failure: ChunkFailure,
}

/// A dataset that could not be collected or written at all.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub provider: String,
    pub symbol: Option<String>,
    pub error: String,
}

/// What one cycle did. Gaps are listed, never hidden.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub datasets_collected: usize,
    pub total_rows: usize,
    /// Rows kept despite violating candle invariants.
    pub flagged_rows: usize,
    pub datasets: Vec<CollectionLogRecord>,
    pub failed_ranges: Vec<FailedRange>,
    pub provider_errors: Vec<ProviderFailure>,
    pub cancelled: bool,
}

impl CycleSummary {
    fn started(now: DateTime<Utc>) -> Self {
        Self {
            started_at: now,
            finished_at: now,
            datasets_collected: 0,
            total_rows: 0,
            flagged_rows: 0,
            datasets: Vec::new(),
            failed_ranges: Vec::new(),
            provider_errors: Vec::new(),
            cancelled: false,
        }
    }

    /// True when nothing failed and the cycle ran to the end.
    pub fn is_clean(&self) -> bool {
        !self.cancelled && self.failed_ranges.is_empty() && self.provider_errors.is_empty()
    }
}

/// One dataset to collect within a cycle.
struct Job<'a> {
    provider_name: &'a str,
    provider: &'a Arc<dyn MarketDataProvider>,
    kind: SeriesKind,
    symbol: &'a str,
    interval: Interval,
    range: TimeRange,
}

/// Periodic collector over a provider registry.
pub struct Scheduler {
    registry: Arc<ProviderRegistry>,
    sink: Arc<dyn Sink>,
    source: Option<Arc<dyn Source>>,
    targets: Vec<CollectionTarget>,
    engine: BackfillEngine,
    consolidation_time: NaiveTime,
    last_consolidation: Option<NaiveDate>,
    log: CollectionLog,
    state: watch::Sender<SchedulerState>,
}

impl Scheduler {
    /// Create a scheduler. The collection log is reloaded from `source` when
    /// one is given.
    pub fn new(
        registry: Arc<ProviderRegistry>,
        sink: Arc<dyn Sink>,
        source: Option<Arc<dyn Source>>,
        targets: Vec<CollectionTarget>,
        engine: BackfillEngine,
    ) -> Self {
        let log = match &source {
            Some(source) => match source.load_collection_log() {
                Ok(records) => {
                    debug!("Reloaded {} collection log record(s)", records.len());
                    CollectionLog::from_records(records)
                }
                Err(e) => {
                    warn!("Could not reload collection log, starting empty: {}", e);
                    CollectionLog::new()
                }
            },
            None => CollectionLog::new(),
        };
        let (state, _) = watch::channel(SchedulerState::Idle);
        let (hour, minute) = DEFAULT_CONSOLIDATION_TIME;

        Self {
            registry,
            sink,
            source,
            targets,
            engine,
            consolidation_time: NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default(),
            last_consolidation: None,
            log,
            state,
        }
    }

    /// Run the daily consolidation at `time` (UTC) instead of 02:00.
    pub fn with_consolidation_time(mut self, time: NaiveTime) -> Self {
        self.consolidation_time = time;
        self
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    pub fn targets(&self) -> &[CollectionTarget] {
        &self.targets
    }

    pub fn collection_log(&self) -> &CollectionLog {
        &self.log
    }

    pub fn collection_stats(&self) -> CollectionStats {
        self.log.stats()
    }

    fn set_state(&self, state: SchedulerState) {
        self.state.send_replace(state);
    }

    /// Run one collection cycle over every target.
    ///
    /// Failures of one provider or symbol are recorded in the summary and
    /// never stop the others. A stop request cancels the in-flight dataset
    /// and skips the rest; whatever was already written stays written.
    pub async fn run_once(&mut self, stop: &StopSignal) -> CycleSummary {
        self.set_state(SchedulerState::Collecting);
        let mut summary = CycleSummary::started(Utc::now());
        info!("Collection cycle started ({} target(s))", self.targets.len());

        let targets = self.targets.clone();
        'targets: for target in &targets {
            let Some(provider) = self.registry.get(&target.provider) else {
                warn!("No provider registered as '{}', skipping target", target.provider);
                summary.provider_errors.push(ProviderFailure {
                    provider: target.provider.clone(),
                    symbol: None,
                    error: MarketDataError::UnknownProvider(target.provider.clone()).to_string(),
                });
                continue;
            };

            let range = target.mode.range(Utc::now());
            for symbol in &target.symbols {
                let candles = Job {
                    provider_name: &target.provider,
                    provider: &provider,
                    kind: SeriesKind::Ohlcv,
                    symbol,
                    interval: target.interval.clone(),
                    range,
                };
                let funding = if target.include_funding {
                    Some(Job {
                        kind: SeriesKind::Funding,
                        interval: Interval::from(FUNDING_INTERVAL),
                        ..candles
                    })
                } else {
                    None
                };

                for job in std::iter::once(candles).chain(funding) {
                    if stop.is_stopped() {
                        summary.cancelled = true;
                        break 'targets;
                    }
                    if let Err(MarketDataError::Cancelled) =
                        self.collect(&job, stop, &mut summary).await
                    {
                        info!("Collection cycle cancelled during {} {}", job.provider_name, job.symbol);
                        summary.cancelled = true;
                        break 'targets;
                    }
                }
            }
        }

        if !summary.datasets.is_empty() {
            if let Err(e) = self.sink.write_collection_log(self.log.records()) {
                error!("Failed to persist collection log: {}", e);
            }
        }

        summary.finished_at = Utc::now();
        info!(
            "Collection cycle finished: {} dataset(s), {} rows, {} failed range(s), {} provider error(s)",
            summary.datasets_collected,
            summary.total_rows,
            summary.failed_ranges.len(),
            summary.provider_errors.len()
        );
        self.set_state(SchedulerState::Idle);
        summary
    }

    /// Collect and persist one dataset, folding the result into `summary`.
    ///
    /// Only `Cancelled` is returned as an error; everything else is recorded.
    async fn collect(
        &mut self,
        job: &Job<'_>,
        stop: &StopSignal,
        summary: &mut CycleSummary,
    ) -> Result<(), MarketDataError> {
        let backfill = self.engine.backfill_kind(
            job.provider.as_ref(),
            job.kind,
            job.symbol,
            &job.interval,
            job.range,
            stop,
        );
        let outcome: BackfillOutcome = match guarded(job.provider_name, backfill).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(MarketDataError::Cancelled)) | Err(MarketDataError::Cancelled) => {
                return Err(MarketDataError::Cancelled)
            }
            Ok(Err(e)) | Err(e) => {
                warn!(
                    "Collecting {} {} from '{}' failed: {}",
                    job.kind, job.symbol, job.provider_name, e
                );
                summary.provider_errors.push(ProviderFailure {
                    provider: job.provider_name.to_string(),
                    symbol: Some(job.symbol.to_string()),
                    error: e.to_string(),
                });
                return Ok(());
            }
        };

        summary
            .failed_ranges
            .extend(outcome.failed.iter().cloned().map(|failure| FailedRange {
                provider: job.provider_name.to_string(),
                symbol: job.symbol.to_string(),
                kind: job.kind,
                failure,
            }));
        summary.flagged_rows += outcome.flagged_rows;

        let series = outcome.series;
        if series.is_empty() {
            debug!(
                "No {} rows for {} from '{}', nothing written",
                job.kind, job.symbol, job.provider_name
            );
            return Ok(());
        }

        match self
            .sink
            .write(job.provider_name, &series.symbol, &job.interval, &series)
        {
            Ok(location) => {
                let key = series.key();
                let record = CollectionLogRecord {
                    timestamp: Utc::now(),
                    provider: job.provider_name.to_string(),
                    symbol: series.symbol.clone(),
                    kind: series.kind,
                    interval: job.interval.clone(),
                    dataset: key.dataset_id(),
                    rows: series.len(),
                    location,
                };
                summary.datasets_collected += 1;
                summary.total_rows += record.rows;
                summary.datasets.push(record.clone());
                self.log.append(record);
            }
            Err(e) => {
                error!(
                    "Failed to write {} {} from '{}': {}",
                    job.kind, job.symbol, job.provider_name, e
                );
                summary.provider_errors.push(ProviderFailure {
                    provider: job.provider_name.to_string(),
                    symbol: Some(job.symbol.to_string()),
                    error: e.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Run cycles every `interval_minutes` until `stop` fires.
    ///
    /// Returns the number of cycles run.
    pub async fn run_scheduled(
        &mut self,
        interval_minutes: u64,
        stop: &StopSignal,
    ) -> Result<usize, MarketDataError> {
        if interval_minutes == 0 {
            return Err(MarketDataError::InvalidConfig {
                provider: "scheduler".to_string(),
                message: "interval_minutes must be positive".to_string(),
            });
        }
        Ok(self
            .run_every(Duration::from_secs(interval_minutes.saturating_mul(60)), stop)
            .await)
    }

    /// Run cycles separated by `every` until `stop` fires.
    ///
    /// After each cycle the daily consolidation runs if its wall-clock time
    /// has passed and it has not run yet today.
    pub async fn run_every(&mut self, every: Duration, stop: &StopSignal) -> usize {
        let mut cycles = 0;
        info!("Scheduler started, collecting every {:?}", every);

        loop {
            if stop.is_stopped() {
                break;
            }
            let summary = self.run_once(stop).await;
            cycles += 1;
            if summary.cancelled {
                break;
            }

            self.consolidate_if_due(Utc::now());

            self.set_state(SchedulerState::Sleeping);
            let stopped = tokio::select! {
                biased;
                _ = stop.stopped() => true,
                _ = tokio::time::sleep(every) => false,
            };
            self.set_state(SchedulerState::Idle);
            if stopped {
                break;
            }
        }

        info!("Scheduler stopped after {} cycle(s)", cycles);
        cycles
    }

    fn consolidate_if_due(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if now.time() < self.consolidation_time || self.last_consolidation == Some(today) {
            return;
        }
        self.last_consolidation = Some(today);
        if let Err(e) = self.consolidate() {
            error!("Daily consolidation failed: {}", e);
        }
    }

    /// Summarize the latest stored data of every dataset in the log and
    /// write the summary through the sink.
    ///
    /// Datasets that cannot be loaded are logged and left out.
    pub fn consolidate(&self) -> Result<String, MarketDataError> {
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| MarketDataError::Storage("no source configured for consolidation".to_string()))?;

        let consolidated_at = Utc::now();
        let mut entries = Vec::new();
        for (key, record) in self.log.latest_per_series() {
            match source.load_series(&key, true) {
                Ok(series) => entries.push(ConsolidatedEntry {
                    provider: key.provider.clone(),
                    dataset: record.dataset.clone(),
                    rows: series.len(),
                    first_open_time: series.first_open_time(),
                    last_open_time: series.last_open_time(),
                    consolidated_at,
                }),
                Err(e) => warn!("Skipping {} in consolidation: {}", record.dataset, e),
            }
        }

        let location = self.sink.write_consolidated(&entries)?;
        info!("Consolidated {} dataset(s) into {}", entries.len(), location);
        Ok(location)
    }
}
