//! Binance spot and USD-M futures market data provider.
//!
//! - Klines via `/klines` (positional 12-element arrays, at most 1000 per call)
//! - Symbol discovery via `/exchangeInfo`, filtered to status `TRADING`
//! - 24h statistics via `/ticker/24hr`
//! - Connectivity via `/ping`
//!
//! Public market data needs no API key. Spot and futures are separate
//! provider instances with their own base URL and rate limiter.
//!
//! API documentation: https://developers.binance.com/docs/binance-spot-api-docs

mod models;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::errors::MarketDataError;
use crate::models::{Interval, SeriesKind, TimeRange, TimeSeries};
use crate::provider::cache::{CacheKey, ResponseCache};
use crate::provider::client::{RequestClient, RequestParams};
use crate::provider::normalize::{normalize_positional, Column};
use crate::provider::{MarketDataProvider, ProviderConfig};

pub use models::Ticker24h;
use models::{ExchangeInfoResponse, RawTicker};

pub const SPOT_BASE_URL: &str = "https://api.binance.com/api/v3";
pub const FUTURES_BASE_URL: &str = "https://fapi.binance.com/fapi/v1";
/// 10 requests per second.
pub const REQUESTS_PER_MINUTE: u32 = 600;
pub const MAX_KLINES_PER_CALL: usize = 1000;

const FALLBACK_SYMBOLS: &[&str] = &["BTCUSDT", "ETHUSDT"];

/// Element order of a kline array.
const KLINE_COLUMNS: [Column; 12] = [
    Column::OpenTime,
    Column::Open,
    Column::High,
    Column::Low,
    Column::Close,
    Column::Volume,
    Column::Extra("close_time"),
    Column::Extra("quote_volume"),
    Column::TradeCount,
    Column::Extra("taker_buy_base_volume"),
    Column::Extra("taker_buy_quote_volume"),
    Column::Skip,
];

/// Which Binance market an instance talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarketType {
    Spot,
    Futures,
}

impl MarketType {
    /// Registry name of the default instance for this market.
    pub fn provider_name(&self) -> &'static str {
        match self {
            Self::Spot => "binance",
            Self::Futures => "binance-futures",
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            Self::Spot => SPOT_BASE_URL,
            Self::Futures => FUTURES_BASE_URL,
        }
    }
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spot => write!(f, "spot"),
            Self::Futures => write!(f, "futures"),
        }
    }
}

/// Default configuration for one Binance market.
pub fn default_config(market: MarketType) -> ProviderConfig {
    ProviderConfig::new(market.provider_name(), market.base_url(), REQUESTS_PER_MINUTE)
        .with_max_rows_per_call(MAX_KLINES_PER_CALL)
}

/// Binance provider for one market type.
pub struct BinanceProvider {
    config: ProviderConfig,
    market: MarketType,
    client: RequestClient,
    symbols: ResponseCache<Arc<BTreeSet<String>>>,
}

impl BinanceProvider {
    pub fn new(config: ProviderConfig, market: MarketType) -> Result<Self, MarketDataError> {
        config.validate()?;
        let client = RequestClient::new(&config)?;
        let symbols = ResponseCache::new(config.cache_ttl);
        Ok(Self {
            config,
            market,
            client,
            symbols,
        })
    }

    pub fn spot() -> Result<Self, MarketDataError> {
        Self::new(default_config(MarketType::Spot), MarketType::Spot)
    }

    pub fn futures() -> Result<Self, MarketDataError> {
        Self::new(default_config(MarketType::Futures), MarketType::Futures)
    }

    pub fn market_type(&self) -> MarketType {
        self.market
    }

    fn decode_error(&self, message: &str) -> MarketDataError {
        MarketDataError::Decode {
            provider: self.name().to_string(),
            message: message.to_string(),
        }
    }

    /// Symbols currently trading, cached for the configured TTL.
    pub async fn trading_symbols(&self, refresh: bool) -> Result<Arc<BTreeSet<String>>, MarketDataError> {
        let key = CacheKey::new(self.name(), "exchange_info");
        if !refresh {
            if let Some(symbols) = self.symbols.get(&key) {
                debug!("Using cached {} exchange info", self.market);
                return Ok(symbols);
            }
        }

        let body = self
            .client
            .request(Method::GET, "/exchangeInfo", RequestParams::None)
            .await?;
        let info: ExchangeInfoResponse =
            serde_json::from_value(body).map_err(|e| self.decode_error(&e.to_string()))?;

        let symbols: BTreeSet<String> = info
            .symbols
            .into_iter()
            .filter(|s| s.status == "TRADING")
            .map(|s| s.symbol)
            .collect();
        info!("Retrieved {} {} symbols", symbols.len(), self.market);

        let symbols = Arc::new(symbols);
        self.symbols.insert(key, Arc::clone(&symbols));
        Ok(symbols)
    }

    /// Trading symbols containing `term` (case-insensitive).
    pub async fn search_symbols(&self, term: &str) -> Vec<String> {
        let needle = term.to_uppercase();
        self.list_available_symbols()
            .await
            .into_iter()
            .filter(|s| s.contains(&needle))
            .collect()
    }

    /// 24h rolling statistics for every symbol.
    pub async fn fetch_24h_tickers(&self) -> Result<Vec<Ticker24h>, MarketDataError> {
        let body = self
            .client
            .request(Method::GET, "/ticker/24hr", RequestParams::None)
            .await?;
        let raw: Vec<RawTicker> =
            serde_json::from_value(body).map_err(|e| self.decode_error(&e.to_string()))?;
        Ok(raw.into_iter().map(Ticker24h::from).collect())
    }
}

#[async_trait]
impl MarketDataProvider for BinanceProvider {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Never more than the exchange's per-request kline limit, so a chunk
    /// cannot be sized past what one response can carry.
    fn max_rows_per_call(&self, _kind: SeriesKind, interval: &Interval) -> usize {
        self.config.max_rows_for(interval).min(MAX_KLINES_PER_CALL)
    }

    fn request_count(&self) -> u64 {
        self.client.request_count()
    }

    fn fallback_symbols(&self) -> BTreeSet<String> {
        FALLBACK_SYMBOLS.iter().map(|s| s.to_string()).collect()
    }

    async fn fetch_market_data(
        &self,
        symbol: &str,
        interval: &Interval,
        range: TimeRange,
    ) -> Result<TimeSeries, MarketDataError> {
        let symbol = symbol.to_uppercase();
        if range.is_empty() {
            return Ok(TimeSeries::empty(self.name(), symbol, interval.clone(), SeriesKind::Ohlcv));
        }

        let limit = self.max_rows_per_call(SeriesKind::Ohlcv, interval);
        let params = RequestParams::query([
            ("symbol", symbol.clone()),
            ("interval", interval.to_string()),
            ("startTime", range.start_millis().to_string()),
            ("endTime", range.inclusive_end_millis().to_string()),
            ("limit", limit.to_string()),
        ]);

        debug!("Fetching {} klines for {} ({}) {}", self.market, symbol, interval, range);
        let body = self.client.request(Method::GET, "/klines", params).await?;
        let rows = match body {
            Value::Array(rows) => rows,
            _ => return Err(self.decode_error("expected an array of klines")),
        };
        if rows.is_empty() {
            warn!("No klines returned for {} {} in {}", symbol, interval, range);
        }

        let (candles, report) = normalize_positional(&symbol, interval, &KLINE_COLUMNS, &rows);
        report.log(self.name(), &symbol);

        let mut series = TimeSeries::from_rows(
            self.name(),
            symbol,
            interval.clone(),
            SeriesKind::Ohlcv,
            candles,
        );
        series.retain_within(&range);
        Ok(series)
    }

    async fn list_available_symbols(&self) -> BTreeSet<String> {
        match self.trading_symbols(false).await {
            Ok(symbols) if !symbols.is_empty() => symbols.as_ref().clone(),
            Ok(_) => {
                warn!("{} exchange info listed no trading symbols, using fallback", self.market);
                self.fallback_symbols()
            }
            Err(e) => {
                warn!("Failed to get {} symbols, using fallback: {}", self.market, e);
                self.fallback_symbols()
            }
        }
    }

    async fn validate_connection(&self) -> bool {
        match self
            .client
            .request(Method::GET, "/ping", RequestParams::None)
            .await
        {
            Ok(_) => true,
            Err(e) => {
                warn!("{} connection test failed: {}", self.name(), e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_market_defaults() {
        let spot = BinanceProvider::spot().unwrap();
        assert_eq!(spot.name(), "binance");
        assert_eq!(spot.config().base_url, SPOT_BASE_URL);
        assert_eq!(spot.market_type(), MarketType::Spot);

        let futures = BinanceProvider::futures().unwrap();
        assert_eq!(futures.name(), "binance-futures");
        assert_eq!(futures.config().base_url, FUTURES_BASE_URL);
        assert_eq!(
            futures.max_rows_per_call(SeriesKind::Ohlcv, &Interval::from("1h")),
            1000
        );
    }

    #[test]
    fn test_row_cap_never_exceeds_kline_limit() {
        let config = default_config(MarketType::Spot)
            .with_max_rows_per_call(1500)
            .with_interval_row_limit(Interval::from("1m"), 500);
        let provider = BinanceProvider::new(config, MarketType::Spot).unwrap();

        assert_eq!(provider.max_rows_per_call(SeriesKind::Ohlcv, &Interval::from("1h")), 1000);
        assert_eq!(provider.max_rows_per_call(SeriesKind::Ohlcv, &Interval::from("1m")), 500);
    }

    #[test]
    fn test_kline_array_normalized() {
        let rows = vec![json!([
            1704067200000i64, "42283.58", "42554.57", "42261.02", "42475.23", "1271.68108",
            1704070799999i64, "53957248.97", 47134, "682.57581", "28957416.82", "0"
        ])];
        let (candles, report) =
            normalize_positional("BTCUSDT", &Interval::from("1h"), &KLINE_COLUMNS, &rows);

        assert!(report.is_clean());
        let c = &candles[0];
        assert_eq!(c.open.value(), Some(dec!(42283.58)));
        assert_eq!(c.high.value(), Some(dec!(42554.57)));
        assert_eq!(c.low.value(), Some(dec!(42261.02)));
        assert_eq!(c.close.value(), Some(dec!(42475.23)));
        assert_eq!(c.volume.value(), Some(dec!(1271.68108)));
        assert_eq!(c.trade_count, Some(47134));
        assert_eq!(c.extra.get("quote_volume"), Some(&json!("53957248.97")));
        assert!(!c.extra.contains_key("unknown_11"));
    }

    #[test]
    fn test_ticker_conversion() {
        let raw: RawTicker = serde_json::from_value(json!({
            "symbol": "ETHUSDT", "lastPrice": "2301.10", "volume": "1000.5",
            "priceChangePercent": "-1.25", "highPrice": "2400"
        }))
        .unwrap();
        let ticker = Ticker24h::from(raw);
        assert_eq!(ticker.price.value(), Some(dec!(2301.10)));
        assert_eq!(ticker.change_24h.value(), Some(dec!(-1.25)));
    }
}
