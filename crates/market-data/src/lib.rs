//! Marketfeed Market Data Crate
//!
//! Acquires OHLCV candles, funding rates and analytics query results from
//! rate-limited HTTP providers and persists them for later analysis.
//!
//! # Overview
//!
//! - Providers: Dune (saved queries), Hyperliquid (perp candles and funding),
//!   Binance (spot and USD-M futures klines)
//! - Per-provider rate limiting, response caching and row normalization
//! - Chunked historical backfill with an explicit failure manifest
//! - A registry with isolated connectivity checks and health reporting
//! - A collection scheduler writing through a pluggable sink
//!
//! # Architecture
//!
//! ```text
//! +------------------+     +------------------+
//! |    Scheduler     | --> |  BackfillEngine  |  (chunk, pace, merge)
//! +------------------+     +------------------+
//!          |                        |
//!          v                        v
//! +------------------+     +------------------+
//! | ProviderRegistry | --> |     Provider     |  (Dune, Hyperliquid, Binance)
//! +------------------+     +------------------+
//!          |                        |
//!          v                        v
//! +------------------+     +------------------+
//! |   Sink / Source  |     |  RequestClient   |  (RateLimiter + HTTP)
//! +------------------+     +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`Candle`] - One normalized row
//! - [`TimeSeries`] - Ordered, de-duplicated rows for one dataset
//! - [`TimeRange`] - Half-open `[start, end)` window
//! - [`MarketDataProvider`] - The provider capability set
//! - [`CycleSummary`] - What one collection cycle did

pub mod backfill;
pub mod config;
pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;
pub mod scheduler;
pub mod stop;
pub mod storage;

// Re-export all public types from models
pub use models::{
    Candle, CandleIssue, CollectionLogRecord, ConsolidatedEntry, DatasetId, HealthStatus,
    Interval, Numeric, SeriesKey, SeriesKind, TimeRange, TimeSeries,
};

// Re-export provider types
pub use provider::binance::{BinanceProvider, MarketType};
pub use provider::dune::DuneProvider;
pub use provider::hyperliquid::HyperliquidProvider;
pub use provider::{build_provider, MarketDataProvider, ProviderConfig, ProviderKind};

pub use backfill::{BackfillEngine, BackfillOutcome, ChunkFailure, FailurePolicy};
pub use config::{CollectorConfig, ProviderSettings};
pub use errors::{MarketDataError, RetryClass};
pub use registry::{setup_registry, ProviderRegistry};
pub use scheduler::{CollectionMode, CollectionTarget, CycleSummary, Scheduler, SchedulerState};
pub use stop::{stop_channel, StopHandle, StopSignal};
pub use storage::{FileStore, Sink, Source};
