//! Collection cycles over mock providers and a temporary file store.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use marketfeed_market_data::errors::MarketDataError;
use marketfeed_market_data::storage::Source;
use marketfeed_market_data::{
    stop_channel, BackfillEngine, Candle, CollectionMode, CollectionTarget, FailurePolicy,
    FileStore, Interval, MarketDataProvider, ProviderConfig, ProviderRegistry, Scheduler,
    SchedulerState, SeriesKind, Sink, StopSignal, TimeRange, TimeSeries,
};
use rust_decimal_macros::dec;

#[derive(Clone, Copy)]
enum Behavior {
    Candles,
    Empty,
    Fails,
    Panics,
}

struct MockProvider {
    config: ProviderConfig,
    behavior: Behavior,
    funding: bool,
    call_count: AtomicUsize,
}

impl MockProvider {
    fn new(name: &str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            config: ProviderConfig::new(name, "http://mock.invalid", 600),
            behavior,
            funding: false,
            call_count: AtomicUsize::new(0),
        })
    }

    fn with_funding(name: &str) -> Arc<Self> {
        Arc::new(Self {
            config: ProviderConfig::new(name, "http://mock.invalid", 600),
            behavior: Behavior::Candles,
            funding: true,
            call_count: AtomicUsize::new(0),
        })
    }

    fn rows(symbol: &str, interval: &Interval, range: TimeRange) -> Vec<Candle> {
        let mut rows = Vec::new();
        let mut t = range.end - Duration::hours(3);
        while t < range.end {
            rows.push(Candle::ohlcv(
                symbol,
                interval.clone(),
                t,
                dec!(10),
                dec!(12),
                dec!(9),
                dec!(11),
                dec!(100),
            ));
            t += Duration::hours(1);
        }
        rows
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn request_count(&self) -> u64 {
        self.call_count.load(Ordering::SeqCst) as u64
    }

    fn fallback_symbols(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    async fn fetch_market_data(
        &self,
        symbol: &str,
        interval: &Interval,
        range: TimeRange,
    ) -> Result<TimeSeries, MarketDataError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let rows = match self.behavior {
            Behavior::Candles => Self::rows(symbol, interval, range),
            Behavior::Empty => Vec::new(),
            Behavior::Fails => {
                return Err(MarketDataError::Timeout {
                    provider: self.name().to_string(),
                })
            }
            Behavior::Panics => panic!("fetch exploded"),
        };
        Ok(TimeSeries::from_rows(self.name(), symbol, interval.clone(), SeriesKind::Ohlcv, rows))
    }

    async fn fetch_funding_rates(
        &self,
        symbol: &str,
        range: TimeRange,
    ) -> Result<TimeSeries, MarketDataError> {
        if !self.funding {
            return Err(MarketDataError::NotSupported {
                operation: "funding_rates".to_string(),
                provider: self.name().to_string(),
            });
        }
        let interval = Interval::from("1h");
        let mut rows = Self::rows(symbol, &interval, range);
        for row in &mut rows {
            row.extra.insert("funding_rate".to_string(), serde_json::json!("0.0001"));
        }
        Ok(TimeSeries::from_rows(self.name(), symbol, interval, SeriesKind::Funding, rows))
    }

    async fn list_available_symbols(&self) -> BTreeSet<String> {
        self.fallback_symbols()
    }

    async fn validate_connection(&self) -> bool {
        true
    }
}

fn registry(providers: Vec<Arc<MockProvider>>) -> Arc<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();
    for provider in providers {
        let name = provider.name().to_string();
        registry.register(name, provider).unwrap();
    }
    Arc::new(registry)
}

fn target(provider: &str, symbols: &[&str]) -> CollectionTarget {
    CollectionTarget::latest(provider, symbols.iter().copied(), Interval::from("1h"), 24 * 60)
}

fn scheduler(
    dir: &Path,
    providers: Vec<Arc<MockProvider>>,
    targets: Vec<CollectionTarget>,
) -> (Scheduler, Arc<FileStore>) {
    let store = Arc::new(FileStore::open(dir).unwrap());
    let sink: Arc<dyn Sink> = store.clone();
    let source: Arc<dyn Source> = store.clone();
    let engine = BackfillEngine::new(StdDuration::ZERO, FailurePolicy::SkipAndContinue);
    (
        Scheduler::new(registry(providers), sink, Some(source), targets, engine),
        store,
    )
}

#[tokio::test]
async fn test_run_once_isolates_failing_provider() {
    let dir = tempfile::tempdir().unwrap();
    let (mut scheduler, store) = scheduler(
        dir.path(),
        vec![
            MockProvider::new("binance", Behavior::Candles),
            MockProvider::new("flaky", Behavior::Fails),
        ],
        vec![target("flaky", &["ETH"]), target("binance", &["BTCUSDT", "ETHUSDT"])],
    );

    let summary = scheduler.run_once(&StopSignal::never()).await;

    assert_eq!(summary.datasets_collected, 2);
    assert_eq!(summary.total_rows, 6);
    assert!(!summary.cancelled);
    // The failing provider's only chunk is an explicit gap.
    assert_eq!(summary.failed_ranges.len(), 1);
    assert_eq!(summary.failed_ranges[0].provider, "flaky");
    assert!(!summary.is_clean());
    assert_eq!(scheduler.state(), SchedulerState::Idle);

    let loaded = store
        .load("binance", "BTCUSDT", &Interval::from("1h"), true)
        .unwrap();
    assert_eq!(loaded.len(), 3);
    assert!(dir.path().join("collection_log.json").exists());
    assert_eq!(store.load_collection_log().unwrap().len(), 2);
}

#[tokio::test]
async fn test_panicking_provider_is_reported_not_propagated() {
    let dir = tempfile::tempdir().unwrap();
    let (mut scheduler, _) = scheduler(
        dir.path(),
        vec![
            MockProvider::new("boom", Behavior::Panics),
            MockProvider::new("binance", Behavior::Candles),
        ],
        vec![target("boom", &["ETH"]), target("binance", &["BTCUSDT"])],
    );

    let summary = scheduler.run_once(&StopSignal::never()).await;

    assert_eq!(summary.datasets_collected, 1);
    assert_eq!(summary.provider_errors.len(), 1);
    assert_eq!(summary.provider_errors[0].provider, "boom");
    assert!(summary.provider_errors[0].error.contains("panicked"));
}

#[tokio::test]
async fn test_unknown_provider_and_empty_series() {
    let dir = tempfile::tempdir().unwrap();
    let (mut scheduler, _) = scheduler(
        dir.path(),
        vec![MockProvider::new("quiet", Behavior::Empty)],
        vec![target("kraken", &["XBT"]), target("quiet", &["ETH"])],
    );

    let summary = scheduler.run_once(&StopSignal::never()).await;

    assert_eq!(summary.datasets_collected, 0);
    assert_eq!(summary.provider_errors.len(), 1);
    assert!(summary.provider_errors[0].error.contains("kraken"));
    // Nothing written means no log file either.
    assert!(!dir.path().join("collection_log.json").exists());
    assert!(!dir.path().join("raw/quiet").exists());
}

#[tokio::test]
async fn test_funding_collected_as_separate_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let (mut scheduler, store) = scheduler(
        dir.path(),
        vec![MockProvider::with_funding("hyperliquid")],
        vec![target("hyperliquid", &["ETH"]).with_funding()],
    );

    let summary = scheduler.run_once(&StopSignal::never()).await;

    assert_eq!(summary.datasets_collected, 2);
    let datasets: Vec<_> = summary.datasets.iter().map(|d| d.dataset.as_str()).collect();
    assert_eq!(datasets, vec!["ETH_ohlcv_1h", "ETH_funding_1h"]);

    let key = summary.datasets[1].key();
    let funding = store.load_series(&key, true).unwrap();
    assert_eq!(funding.kind, SeriesKind::Funding);
    assert!(funding.candles()[0].extra.contains_key("funding_rate"));
}

#[tokio::test]
async fn test_funding_unsupported_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let (mut scheduler, _) = scheduler(
        dir.path(),
        vec![MockProvider::new("binance", Behavior::Candles)],
        vec![target("binance", &["BTCUSDT"]).with_funding()],
    );

    let summary = scheduler.run_once(&StopSignal::never()).await;

    assert_eq!(summary.datasets_collected, 1);
    assert_eq!(summary.failed_ranges.len(), 1);
    assert_eq!(summary.failed_ranges[0].kind, SeriesKind::Funding);
}

#[tokio::test]
async fn test_log_reloaded_and_stats() {
    let dir = tempfile::tempdir().unwrap();
    {
        let (mut first, _) = scheduler(
            dir.path(),
            vec![MockProvider::new("binance", Behavior::Candles)],
            vec![target("binance", &["BTCUSDT"])],
        );
        first.run_once(&StopSignal::never()).await;
        first.run_once(&StopSignal::never()).await;
    }

    let (second, _) = scheduler(
        dir.path(),
        vec![MockProvider::new("binance", Behavior::Candles)],
        vec![],
    );
    let stats = second.collection_stats();
    assert_eq!(stats.total_records, 2);
    assert_eq!(stats.per_provider["binance"], 2);
    assert_eq!(stats.per_dataset["BTCUSDT_ohlcv_1h"], 2);
    assert_eq!(stats.total_rows, 6);
    assert!(stats.latest.is_some());
}

#[tokio::test]
async fn test_consolidate_summarizes_latest_datasets() {
    let dir = tempfile::tempdir().unwrap();
    let (mut scheduler, _) = scheduler(
        dir.path(),
        vec![MockProvider::new("binance", Behavior::Candles)],
        vec![target("binance", &["BTCUSDT", "ETHUSDT"])],
    );
    scheduler.run_once(&StopSignal::never()).await;

    let location = scheduler.consolidate().unwrap();
    let written: Vec<marketfeed_market_data::ConsolidatedEntry> =
        serde_json::from_slice(&std::fs::read(&location).unwrap()).unwrap();

    assert!(Path::new(&location).starts_with(dir.path().join("processed")));
    assert_eq!(written.len(), 2);
    assert!(written.iter().all(|e| e.rows == 3 && e.first_open_time.is_some()));
}

#[tokio::test]
async fn test_stop_before_cycle_collects_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let provider = MockProvider::new("binance", Behavior::Candles);
    let (mut scheduler, _) = scheduler(
        dir.path(),
        vec![Arc::clone(&provider)],
        vec![target("binance", &["BTCUSDT"])],
    );
    let (handle, signal) = stop_channel();
    handle.stop();

    let summary = scheduler.run_once(&signal).await;

    assert!(summary.cancelled);
    assert_eq!(summary.datasets_collected, 0);
    assert_eq!(provider.request_count(), 0);
}

#[tokio::test]
async fn test_stop_interrupts_sleep_promptly() {
    let dir = tempfile::tempdir().unwrap();
    let (mut scheduler, _) = scheduler(
        dir.path(),
        vec![MockProvider::new("binance", Behavior::Candles)],
        vec![target("binance", &["BTCUSDT"])],
    );
    let mut states = scheduler.subscribe_state();
    let (handle, signal) = stop_channel();

    let stopper = tokio::spawn(async move {
        states
            .wait_for(|state| *state == SchedulerState::Sleeping)
            .await
            .unwrap();
        handle.stop();
    });

    let cycles = tokio::time::timeout(
        StdDuration::from_secs(5),
        scheduler.run_every(StdDuration::from_secs(3600), &signal),
    )
    .await
    .expect("sleep should be interrupted");

    stopper.await.unwrap();
    assert_eq!(cycles, 1);
    assert_eq!(scheduler.state(), SchedulerState::Idle);
    assert_eq!(scheduler.collection_log().len(), 1);
}

#[tokio::test]
async fn test_zero_interval_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (mut scheduler, _) = scheduler(dir.path(), vec![], vec![]);
    let err = scheduler
        .run_scheduled(0, &StopSignal::never())
        .await
        .unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn test_backfill_mode_range_is_fixed() {
    let start = Utc::now() - Duration::days(3);
    let end = Utc::now() - Duration::days(1);
    let mode = CollectionMode::Backfill {
        start,
        end: Some(end),
    };
    assert_eq!(mode.range(Utc::now()), TimeRange::new(start, end));
}
