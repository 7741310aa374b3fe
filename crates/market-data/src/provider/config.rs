//! Provider configuration.
//!
//! A [`ProviderConfig`] is resolved once (from settings, defaults and the
//! environment) and then handed to a provider, which keeps it unchanged for
//! its lifetime.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::errors::MarketDataError;
use crate::models::Interval;

/// Default HTTP request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default lifetime of a cached response.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Default row cap for a single upstream call.
pub const DEFAULT_MAX_ROWS_PER_CALL: usize = 1000;

/// Immutable configuration of one provider instance.
#[derive(Clone)]
pub struct ProviderConfig {
    /// Registry name (e.g. "binance", "binance-futures").
    pub name: String,

    /// Base endpoint; request paths are appended to it.
    pub base_url: String,

    /// Hard request budget. Must be positive.
    pub requests_per_minute: u32,

    /// API key, if the provider needs one.
    pub credential: Option<String>,

    /// Row cap for a single call when no per-interval cap is configured.
    pub max_rows_per_call: usize,

    /// Per-interval row caps (the known-interval table).
    pub interval_row_limits: BTreeMap<Interval, usize>,

    pub request_timeout: Duration,

    pub cache_ttl: Duration,
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, requests_per_minute: u32) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            requests_per_minute,
            credential: None,
            max_rows_per_call: DEFAULT_MAX_ROWS_PER_CALL,
            interval_row_limits: BTreeMap::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }

    pub fn with_credential(mut self, credential: Option<String>) -> Self {
        self.credential = credential;
        self
    }

    pub fn with_max_rows_per_call(mut self, rows: usize) -> Self {
        self.max_rows_per_call = rows;
        self
    }

    pub fn with_interval_row_limit(mut self, interval: Interval, rows: usize) -> Self {
        self.interval_row_limits.insert(interval, rows);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Row cap for one call at `interval`.
    ///
    /// Intervals missing from the table use the daily entry, then the
    /// provider-wide cap.
    pub fn max_rows_for(&self, interval: &Interval) -> usize {
        self.interval_row_limits
            .get(interval)
            .or_else(|| self.interval_row_limits.get(&Interval::from("1d")))
            .copied()
            .unwrap_or(self.max_rows_per_call)
    }

    /// Minimum spacing between two requests.
    ///
    /// Only meaningful once [`validate`](Self::validate) has passed.
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs_f64(60.0 / self.requests_per_minute.max(1) as f64)
    }

    /// Reject configurations that cannot be run.
    pub fn validate(&self) -> Result<(), MarketDataError> {
        let invalid = |message: &str| MarketDataError::InvalidConfig {
            provider: self.name.clone(),
            message: message.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if self.base_url.trim().is_empty() {
            return Err(invalid("base_url must not be empty"));
        }
        if self.requests_per_minute == 0 {
            return Err(invalid("requests_per_minute must be positive"));
        }
        if self.max_rows_per_call == 0 || self.interval_row_limits.values().any(|r| *r == 0) {
            return Err(invalid("max_rows_per_call must be positive"));
        }
        Ok(())
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("requests_per_minute", &self.requests_per_minute)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("max_rows_per_call", &self.max_rows_per_call)
            .field("interval_row_limits", &self.interval_row_limits)
            .field("request_timeout", &self.request_timeout)
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}
