//! Rate-limited HTTP client shared by all provider variants.

use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::{Client, Method};
use serde_json::Value;
use log::{debug, warn};

use crate::errors::MarketDataError;
use crate::provider::config::ProviderConfig;
use crate::provider::rate_limiter::RateLimiter;

/// Request parameters.
#[derive(Debug, Clone, Default)]
pub enum RequestParams {
    #[default]
    None,
    /// Sent as URL query parameters.
    Query(Vec<(String, String)>),
    /// Sent as a JSON body.
    Json(Value),
}

impl RequestParams {
    /// Build query parameters from borrowed pairs.
    pub fn query<K: ToString, V: ToString>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        Self::Query(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

/// HTTP client bound to one provider's base URL, credential and rate limit.
///
/// Every call waits on the provider's [`RateLimiter`] first and increments the
/// request counter whether or not the call succeeds.
pub struct RequestClient {
    provider: String,
    base_url: String,
    client: Client,
    limiter: RateLimiter,
    auth_header: Option<(&'static str, String)>,
    request_count: AtomicU64,
}

impl RequestClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, MarketDataError> {
        let limiter = RateLimiter::new(config.requests_per_minute).map_err(|_| {
            MarketDataError::InvalidConfig {
                provider: config.name.clone(),
                message: "requests_per_minute must be positive".to_string(),
            }
        })?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(
                    "{}: could not build HTTP client ({}), using defaults without the {:?} timeout",
                    config.name, e, config.request_timeout
                );
                Client::new()
            });

        Ok(Self {
            provider: config.name.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            limiter,
            auth_header: None,
            request_count: AtomicU64::new(0),
        })
    }

    /// Attach a header sent with every request (e.g. an API key).
    pub fn with_auth_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.auth_header = Some((name, value.into()));
        self
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Number of requests attempted so far.
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Issue `method` against `{base_url}/{endpoint}` and decode the JSON body.
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        params: RequestParams,
    ) -> Result<Value, MarketDataError> {
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        self.request_url(method, &url, params).await
    }

    /// Issue `method` against an absolute URL and decode the JSON body.
    pub async fn request_url(
        &self,
        method: Method,
        url: &str,
        params: RequestParams,
    ) -> Result<Value, MarketDataError> {
        self.limiter.acquire().await;
        self.request_count.fetch_add(1, Ordering::Relaxed);

        let mut request = self.client.request(method.clone(), url);
        if let Some((name, value)) = &self.auth_header {
            request = request.header(*name, value);
        }
        request = match params {
            RequestParams::None => request,
            RequestParams::Query(pairs) => request.query(&pairs),
            RequestParams::Json(body) => request.json(&body),
        };

        debug!("{} request: {} {}", self.provider, method, url);

        let response = request
            .send()
            .await
            .map_err(|e| MarketDataError::from_transport(&self.provider, e))?;

        let status = response.status();
        if !status.is_success() {
            debug!("{} returned HTTP {} for {}", self.provider, status, url);
            return Err(MarketDataError::HttpStatus {
                provider: self.provider.clone(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| MarketDataError::from_transport(&self.provider, e))?;

        serde_json::from_slice(&body).map_err(|e| MarketDataError::Decode {
            provider: self.provider.clone(),
            message: e.to_string(),
        })
    }
}

impl std::fmt::Debug for RequestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestClient")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("min_interval", &self.limiter.min_interval())
            .field("has_auth", &self.auth_header.is_some())
            .field("request_count", &self.request_count())
            .finish()
    }
}
