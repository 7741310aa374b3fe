//! Hyperliquid market data provider.
//!
//! All public data comes from one endpoint, `POST /info`, selected by the
//! `type` field of the JSON body:
//! - `candleSnapshot` for OHLCV candles (up to 5000 per call)
//! - `fundingHistory` for perpetual funding rates
//! - `recentTrades`, `allMids` and `meta` for trades, mid prices and the
//!   listed universe
//!
//! No authentication is needed.

mod models;

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::errors::MarketDataError;
use crate::models::{Interval, Numeric, SeriesKind, TimeRange, TimeSeries};
use crate::provider::cache::{CacheKey, ResponseCache};
use crate::provider::client::{RequestClient, RequestParams};
use crate::provider::normalize::{normalize_objects, Column, ColumnTable};
use crate::provider::{MarketDataProvider, ProviderConfig};

pub use models::{MidPrice, Trade, TradeSide};
use models::{MetaResponse, RawTrade};

pub const PROVIDER_NAME: &str = "hyperliquid";
pub const BASE_URL: &str = "https://api.hyperliquid.xyz";
pub const REQUESTS_PER_MINUTE: u32 = 100;
/// Candles returned by one `candleSnapshot` call at most.
pub const MAX_CANDLES_PER_CALL: usize = 5000;
/// Funding records returned by one `fundingHistory` call at most.
pub const MAX_FUNDING_PER_CALL: usize = 500;

const FALLBACK_SYMBOLS: &[&str] = &["ETH", "BTC"];
const INFO_ENDPOINT: &str = "/info";

const CANDLE_COLUMNS: ColumnTable = ColumnTable::new(&[
    ("t", Column::OpenTime),
    ("T", Column::Extra("close_time")),
    ("s", Column::Skip),
    ("i", Column::Skip),
    ("o", Column::Open),
    ("h", Column::High),
    ("l", Column::Low),
    ("c", Column::Close),
    ("v", Column::Volume),
    ("n", Column::TradeCount),
]);

const FUNDING_COLUMNS: ColumnTable = ColumnTable::new(&[
    ("time", Column::OpenTime),
    ("coin", Column::Skip),
    ("fundingRate", Column::Extra("funding_rate")),
    ("premium", Column::Extra("premium")),
]);

/// Default configuration for Hyperliquid.
pub fn default_config() -> ProviderConfig {
    ProviderConfig::new(PROVIDER_NAME, BASE_URL, REQUESTS_PER_MINUTE)
        .with_max_rows_per_call(MAX_CANDLES_PER_CALL)
}

/// Hyperliquid perpetuals DEX provider.
pub struct HyperliquidProvider {
    config: ProviderConfig,
    client: RequestClient,
    symbols: ResponseCache<Arc<BTreeSet<String>>>,
}

impl HyperliquidProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, MarketDataError> {
        config.validate()?;
        let client = RequestClient::new(&config)?;
        let symbols = ResponseCache::new(config.cache_ttl);
        Ok(Self {
            config,
            client,
            symbols,
        })
    }

    async fn info(&self, body: Value) -> Result<Value, MarketDataError> {
        self.client
            .request(Method::POST, INFO_ENDPOINT, RequestParams::Json(body))
            .await
    }

    /// Rows of an `/info` answer: a bare array, or wrapped in `data`.
    fn rows(&self, body: Value) -> Result<Vec<Value>, MarketDataError> {
        match body {
            Value::Array(rows) => Ok(rows),
            Value::Object(mut obj) => match obj.remove("data") {
                Some(Value::Array(rows)) => Ok(rows),
                _ => Err(self.decode_error("expected an array of rows")),
            },
            Value::Null => Ok(Vec::new()),
            _ => Err(self.decode_error("expected an array of rows")),
        }
    }

    fn decode_error(&self, message: &str) -> MarketDataError {
        MarketDataError::Decode {
            provider: self.name().to_string(),
            message: message.to_string(),
        }
    }

    /// Most recent public trades, newest first as returned upstream.
    pub async fn fetch_recent_trades(
        &self,
        symbol: &str,
        limit: usize,
    ) -> Result<Vec<Trade>, MarketDataError> {
        let body = self
            .info(json!({"type": "recentTrades", "coin": symbol}))
            .await?;
        let raw: Vec<RawTrade> = serde_json::from_value(body)
            .map_err(|e| self.decode_error(&e.to_string()))?;

        Ok(raw
            .into_iter()
            .take(limit)
            .filter_map(Trade::from_raw)
            .collect())
    }

    /// Current mid price of every listed coin.
    pub async fn fetch_all_mids(&self) -> Result<Vec<MidPrice>, MarketDataError> {
        let body = self.info(json!({"type": "allMids"})).await?;
        let mids = body
            .as_object()
            .ok_or_else(|| self.decode_error("expected an object of mid prices"))?;

        let observed_at = Utc::now();
        Ok(mids
            .iter()
            .map(|(symbol, price)| MidPrice {
                symbol: symbol.clone(),
                price: Numeric::from_json(price),
                observed_at,
            })
            .collect())
    }

    async fn fetch_universe(&self) -> Result<Arc<BTreeSet<String>>, MarketDataError> {
        let key = CacheKey::new(self.name(), "meta");
        if let Some(symbols) = self.symbols.get(&key) {
            debug!("Using cached Hyperliquid universe");
            return Ok(symbols);
        }

        let body = self.info(json!({"type": "meta"})).await?;
        let meta: MetaResponse =
            serde_json::from_value(body).map_err(|e| self.decode_error(&e.to_string()))?;
        let symbols: BTreeSet<String> = meta
            .universe
            .into_iter()
            .filter(|asset| !asset.is_delisted)
            .map(|asset| asset.name)
            .collect();
        if symbols.is_empty() {
            return Err(self.decode_error("meta universe is empty"));
        }

        let symbols = Arc::new(symbols);
        self.symbols.insert(key, Arc::clone(&symbols));
        Ok(symbols)
    }
}

#[async_trait]
impl MarketDataProvider for HyperliquidProvider {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn max_rows_per_call(&self, kind: SeriesKind, interval: &Interval) -> usize {
        match kind {
            SeriesKind::Funding => MAX_FUNDING_PER_CALL,
            _ => self.config.max_rows_for(interval).min(MAX_CANDLES_PER_CALL),
        }
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
        if range.is_empty() {
            return Ok(TimeSeries::empty(self.name(), symbol, interval.clone(), SeriesKind::Ohlcv));
        }

        let body = self
            .info(json!({
                "type": "candleSnapshot",
                "req": {
                    "coin": symbol,
                    "interval": interval.as_str(),
                    "startTime": range.start_millis(),
                    "endTime": range.inclusive_end_millis(),
                }
            }))
            .await?;
        let rows = self.rows(body)?;

        let (candles, report) = normalize_objects(symbol, interval, &CANDLE_COLUMNS, &rows);
        report.log(self.name(), symbol);

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
        match self.fetch_universe().await {
            Ok(symbols) => symbols.as_ref().clone(),
            Err(e) => {
                warn!("Hyperliquid symbol discovery failed, using fallback: {}", e);
                self.fallback_symbols()
            }
        }
    }

    async fn validate_connection(&self) -> bool {
        match self.fetch_universe().await {
            Ok(_) => true,
            Err(e) => {
                warn!("Hyperliquid connection validation failed: {}", e);
                false
            }
        }
    }

    async fn fetch_funding_rates(
        &self,
        symbol: &str,
        range: TimeRange,
    ) -> Result<TimeSeries, MarketDataError> {
        // Funding settles hourly on Hyperliquid.
        let interval = Interval::from("1h");
        if range.is_empty() {
            return Ok(TimeSeries::empty(self.name(), symbol, interval, SeriesKind::Funding));
        }

        let body = self
            .info(json!({
                "type": "fundingHistory",
                "coin": symbol,
                "startTime": range.start_millis(),
                "endTime": range.inclusive_end_millis(),
            }))
            .await?;
        let rows = self.rows(body)?;

        let (candles, report) = normalize_objects(symbol, &interval, &FUNDING_COLUMNS, &rows);
        report.log(self.name(), symbol);

        let mut series =
            TimeSeries::from_rows(self.name(), symbol, interval, SeriesKind::Funding, candles);
        series.retain_within(&range);
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn provider() -> HyperliquidProvider {
        HyperliquidProvider::new(default_config()).unwrap()
    }

    #[test]
    fn test_default_limits() {
        let p = provider();
        assert_eq!(p.name(), "hyperliquid");
        assert_eq!(p.config().requests_per_minute, 100);
        assert_eq!(p.max_rows_per_call(SeriesKind::Ohlcv, &Interval::from("1h")), 5000);
        assert_eq!(p.max_rows_per_call(SeriesKind::Funding, &Interval::from("1h")), 500);
        assert_eq!(
            p.fallback_symbols(),
            BTreeSet::from(["BTC".to_string(), "ETH".to_string()])
        );
    }

    #[test]
    fn test_candle_cap_never_exceeds_snapshot_limit() {
        let config = default_config().with_max_rows_per_call(8000);
        let p = HyperliquidProvider::new(config).unwrap();
        assert_eq!(p.max_rows_per_call(SeriesKind::Ohlcv, &Interval::from("1h")), 5000);
    }

    #[test]
    fn test_rows_accepts_bare_or_wrapped_arrays() {
        let p = provider();
        assert_eq!(p.rows(json!([{"t": 1}])).unwrap().len(), 1);
        assert_eq!(p.rows(json!({"data": [{"t": 1}, {"t": 2}]})).unwrap().len(), 2);
        assert!(p.rows(Value::Null).unwrap().is_empty());
        assert!(matches!(
            p.rows(json!({"error": "bad"})),
            Err(MarketDataError::Decode { .. })
        ));
    }

    #[test]
    fn test_trade_from_raw() {
        let raw: RawTrade = serde_json::from_value(json!({
            "coin": "ETH", "side": "A", "px": "2301.5", "sz": "0.25",
            "time": 1704067200000i64, "hash": "0xabc", "tid": 42
        }))
        .unwrap();
        let trade = Trade::from_raw(raw).unwrap();
        assert_eq!(trade.side, TradeSide::Sell);
        assert_eq!(trade.price.value(), Some(dec!(2301.5)));
        assert_eq!(trade.size.value(), Some(dec!(0.25)));
        assert_eq!(trade.trade_id, Some(42));
    }

    #[test]
    fn test_funding_columns_kept_as_extra() {
        let rows = vec![json!({
            "coin": "ETH", "fundingRate": "0.0000125", "premium": "0.0001", "time": 1704067200000i64
        })];
        let (candles, report) =
            normalize_objects("ETH", &Interval::from("1h"), &FUNDING_COLUMNS, &rows);
        assert!(report.is_clean());
        assert_eq!(candles[0].extra.get("funding_rate"), Some(&json!("0.0000125")));
        assert_eq!(candles[0].extra.get("premium"), Some(&json!("0.0001")));
    }

    #[tokio::test]
    async fn test_empty_range_makes_no_request() {
        let p = provider();
        let now = Utc::now();
        let series = p
            .fetch_market_data("ETH", &Interval::from("1h"), TimeRange::new(now, now))
            .await
            .unwrap();
        assert!(series.is_empty());
        assert_eq!(p.request_count(), 0);
    }
}
