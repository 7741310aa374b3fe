//! Market data provider trait definitions.
//!
//! This module defines the core `MarketDataProvider` trait that every data
//! source (Dune, Hyperliquid, Binance, ...) implements.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{Interval, SeriesKind, TimeRange, TimeSeries};

use super::config::ProviderConfig;

/// Trait for market data providers.
///
/// A provider owns its request client (and so its rate limiter) and its
/// response cache. New sources are added by implementing this trait and
/// registering the instance with the registry.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use marketfeed_market_data::provider::{MarketDataProvider, ProviderConfig};
///
/// struct MyProvider {
///     config: ProviderConfig,
/// }
///
/// #[async_trait]
/// impl MarketDataProvider for MyProvider {
///     fn config(&self) -> &ProviderConfig {
///         &self.config
///     }
///
///     // ... implement fetch_market_data, list_available_symbols,
///     // validate_connection
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// The immutable configuration this provider was built from.
    fn config(&self) -> &ProviderConfig;

    /// Registry name, e.g. "binance-futures".
    fn name(&self) -> &str {
        &self.config().name
    }

    /// Row cap of a single upstream call for `kind` at `interval`.
    ///
    /// Unknown intervals fall back to the daily cap.
    fn max_rows_per_call(&self, kind: SeriesKind, interval: &Interval) -> usize {
        let _ = kind;
        self.config().max_rows_for(interval)
    }

    /// Number of upstream requests attempted so far.
    fn request_count(&self) -> u64 {
        0
    }

    /// Symbols returned by `list_available_symbols` when discovery fails.
    fn fallback_symbols(&self) -> BTreeSet<String>;

    /// Fetch candles for `symbol` at `interval` within `range`.
    ///
    /// This is one upstream call. Ranges wider than the provider's row cap are
    /// the backfill engine's job.
    async fn fetch_market_data(
        &self,
        symbol: &str,
        interval: &Interval,
        range: TimeRange,
    ) -> Result<TimeSeries, MarketDataError>;

    /// Symbols this provider can serve.
    ///
    /// Never fails: any upstream error yields [`fallback_symbols`](Self::fallback_symbols).
    async fn list_available_symbols(&self) -> BTreeSet<String>;

    /// Issue one lightweight request. Failures collapse to `false`.
    async fn validate_connection(&self) -> bool;

    /// Fetch funding rate history for a perpetual contract.
    ///
    /// Default implementation returns `NotSupported`.
    async fn fetch_funding_rates(
        &self,
        symbol: &str,
        range: TimeRange,
    ) -> Result<TimeSeries, MarketDataError> {
        let _ = (symbol, range);
        Err(MarketDataError::NotSupported {
            operation: "funding_rates".to_string(),
            provider: self.name().to_string(),
        })
    }
}
