//! Dune Analytics provider.
//!
//! Dune serves the latest result of saved SQL queries. Each query is exposed
//! under a name (e.g. `bot_volume`), and that name is used as the "symbol"
//! everywhere else in the crate.
//!
//! - Results via `GET /query/{id}/results`
//! - Authentication via the `X-Dune-API-Key` header
//! - 30 requests per minute
//!
//! API documentation: https://docs.dune.com/api-reference

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::errors::MarketDataError;
use crate::models::{Interval, SeriesKind, TimeRange, TimeSeries};
use crate::provider::cache::{CacheKey, ResponseCache};
use crate::provider::client::{RequestClient, RequestParams};
use crate::provider::normalize::{normalize_objects, Column, ColumnTable};
use crate::provider::{MarketDataProvider, ProviderConfig};

pub const PROVIDER_NAME: &str = "dune";
pub const BASE_URL: &str = "https://api.dune.com/api/v1";
pub const REQUESTS_PER_MINUTE: u32 = 30;
pub const CREDENTIAL_ENV: &str = "DUNE_API_KEY";
const AUTH_HEADER: &str = "X-Dune-API-Key";

/// Query names mapped by default.
pub const DEFAULT_QUERIES: &[(&str, u64)] = &[("bot_volume", 5745512)];

/// Column names commonly produced by Dune queries.
const COLUMNS: ColumnTable = ColumnTable::new(&[
    ("time", Column::OpenTime),
    ("block_time", Column::OpenTime),
    ("timestamp", Column::OpenTime),
    ("hour", Column::OpenTime),
    ("day", Column::OpenTime),
    ("date", Column::OpenTime),
    ("block_date", Column::OpenTime),
    ("open", Column::Open),
    ("high", Column::High),
    ("low", Column::Low),
    ("close", Column::Close),
    ("price", Column::Close),
    ("volume", Column::Volume),
    ("volume_usd", Column::Volume),
    ("amount_usd", Column::Volume),
    ("trades", Column::TradeCount),
    ("tx_count", Column::TradeCount),
    ("num_trades", Column::TradeCount),
]);

/// Default configuration for Dune.
pub fn default_config() -> ProviderConfig {
    ProviderConfig::new(PROVIDER_NAME, BASE_URL, REQUESTS_PER_MINUTE)
}

/// Dune Analytics provider.
///
/// Query results are cached per query id for the configured TTL.
pub struct DuneProvider {
    config: ProviderConfig,
    client: RequestClient,
    queries: BTreeMap<String, u64>,
    cache: ResponseCache<Arc<Vec<Value>>>,
}

impl DuneProvider {
    /// Create a provider with the default query mapping.
    ///
    /// Fails with `MissingCredential` when the config carries no API key.
    pub fn new(config: ProviderConfig) -> Result<Self, MarketDataError> {
        let queries = DEFAULT_QUERIES
            .iter()
            .map(|(name, id)| (name.to_string(), *id))
            .collect();
        Self::with_queries(config, queries)
    }

    pub fn with_queries(
        config: ProviderConfig,
        queries: BTreeMap<String, u64>,
    ) -> Result<Self, MarketDataError> {
        config.validate()?;
        let api_key = config
            .credential
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| MarketDataError::MissingCredential {
                provider: config.name.clone(),
                env_var: CREDENTIAL_ENV.to_string(),
            })?;

        let client = RequestClient::new(&config)?.with_auth_header(AUTH_HEADER, api_key);
        let cache = ResponseCache::new(config.cache_ttl);

        Ok(Self {
            config,
            client,
            queries,
            cache,
        })
    }

    pub fn queries(&self) -> &BTreeMap<String, u64> {
        &self.queries
    }

    /// Resolve a query name to its id.
    pub fn query_id(&self, name: &str) -> Result<u64, MarketDataError> {
        self.queries
            .get(name)
            .copied()
            .ok_or_else(|| MarketDataError::SymbolNotFound(format!("No Dune query mapped for {name}")))
    }

    /// Latest result rows of a saved query.
    pub async fn query_result(
        &self,
        query_id: u64,
        use_cache: bool,
    ) -> Result<Arc<Vec<Value>>, MarketDataError> {
        let key = CacheKey::new(self.name(), format!("query_{query_id}"));
        if use_cache {
            if let Some(rows) = self.cache.get(&key) {
                debug!("Using cached data for Dune query {}", query_id);
                return Ok(rows);
            }
        }

        info!("Fetching fresh data for Dune query {}", query_id);
        let body = self
            .client
            .request(
                Method::GET,
                &format!("/query/{query_id}/results"),
                RequestParams::None,
            )
            .await?;
        let rows = Arc::new(extract_rows(&self.config.name, body)?);

        self.cache.insert(key, Arc::clone(&rows));
        Ok(rows)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        info!("Dune query cache cleared");
    }
}

/// Pull `result.rows` out of a results payload.
fn extract_rows(provider: &str, body: Value) -> Result<Vec<Value>, MarketDataError> {
    if let Some(message) = body.get("error").and_then(Value::as_str) {
        return Err(MarketDataError::ProviderError {
            provider: provider.to_string(),
            message: message.to_string(),
        });
    }

    match body.get("result").and_then(|r| r.get("rows")) {
        Some(Value::Array(rows)) => Ok(rows.clone()),
        _ => {
            let state = body
                .get("state")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            Err(MarketDataError::ProviderError {
                provider: provider.to_string(),
                message: format!("query result has no rows (state: {state})"),
            })
        }
    }
}

#[async_trait]
impl MarketDataProvider for DuneProvider {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn request_count(&self) -> u64 {
        self.client.request_count()
    }

    fn fallback_symbols(&self) -> BTreeSet<String> {
        self.queries.keys().cloned().collect()
    }

    async fn fetch_market_data(
        &self,
        symbol: &str,
        interval: &Interval,
        range: TimeRange,
    ) -> Result<TimeSeries, MarketDataError> {
        let query_id = self.query_id(symbol)?;
        let rows = self.query_result(query_id, true).await?;

        let (candles, report) = normalize_objects(symbol, interval, &COLUMNS, &rows);
        report.log(self.name(), symbol);

        let mut series = TimeSeries::from_rows(
            self.name(),
            symbol,
            interval.clone(),
            SeriesKind::Query,
            candles,
        );
        series.retain_within(&range);
        Ok(series)
    }

    async fn list_available_symbols(&self) -> BTreeSet<String> {
        self.fallback_symbols()
    }

    async fn validate_connection(&self) -> bool {
        let Some(query_id) = self.queries.values().next().copied() else {
            warn!("Dune connection validation skipped: no queries mapped");
            return false;
        };
        match self.query_result(query_id, true).await {
            Ok(rows) => !rows.is_empty(),
            Err(e) => {
                warn!("Dune connection validation failed: {}", e);
                false
            }
        }
    }
}
