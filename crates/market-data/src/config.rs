//! Collector configuration.
//!
//! [`CollectorConfig`] is plain serde data, loaded from JSON or built from
//! [`Default`]. Each [`ProviderSettings`] entry resolves to an immutable
//! [`ProviderConfig`] once, at provider construction.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::backfill::FailurePolicy;
use crate::errors::MarketDataError;
use crate::models::Interval;
use crate::provider::{ProviderConfig, ProviderKind};
use crate::scheduler::{CollectionMode, CollectionTarget};

/// Per-provider settings. Unset fields fall back to the kind's defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Registry name.
    pub name: String,
    pub kind: ProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_per_minute: Option<u32>,
    /// Environment variable holding the API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rows_per_call: Option<usize>,
    /// Per-interval row caps. Intervals missing here use the "1d" entry,
    /// then `max_rows_per_call`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub interval_row_limits: BTreeMap<Interval, usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_ttl_secs: Option<u64>,
    /// Dune only: query name -> query id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub queries: BTreeMap<String, u64>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl ProviderSettings {
    pub fn new(name: impl Into<String>, kind: ProviderKind) -> Self {
        Self {
            name: name.into(),
            kind,
            base_url: None,
            requests_per_minute: None,
            credential_env: None,
            max_rows_per_call: None,
            interval_row_limits: BTreeMap::new(),
            request_timeout_secs: None,
            cache_ttl_secs: None,
            queries: BTreeMap::new(),
            enabled: true,
        }
    }

    /// Environment variable consulted for the credential.
    pub fn credential_env_name(&self) -> Option<&str> {
        self.credential_env
            .as_deref()
            .or_else(|| self.kind.default_credential_env())
    }

    /// Overlay these settings on the kind's defaults.
    ///
    /// The credential is read from the environment here and nowhere else.
    pub fn resolve(&self) -> Result<ProviderConfig, MarketDataError> {
        let mut config = self.kind.default_config();
        config.name = self.name.clone();

        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(rpm) = self.requests_per_minute {
            config.requests_per_minute = rpm;
        }
        if let Some(rows) = self.max_rows_per_call {
            config.max_rows_per_call = rows;
        }
        config.interval_row_limits.extend(
            self.interval_row_limits
                .iter()
                .map(|(interval, rows)| (interval.clone(), *rows)),
        );
        if let Some(secs) = self.request_timeout_secs {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.cache_ttl_secs {
            config.cache_ttl = Duration::from_secs(secs);
        }
        config.credential = self
            .credential_env_name()
            .and_then(|var| std::env::var(var).ok())
            .filter(|value| !value.trim().is_empty());

        config.validate()?;
        Ok(config)
    }
}

/// Top-level collector configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Root directory of the file store.
    pub data_dir: PathBuf,
    /// Minutes between collection cycles.
    pub interval_minutes: u64,
    /// UTC wall-clock time of the daily consolidation, "HH:MM".
    #[serde(with = "hh_mm")]
    pub consolidation_time: NaiveTime,
    /// Delay between backfill chunks.
    pub pace_ms: u64,
    pub failure_policy: FailurePolicy,
    pub providers: Vec<ProviderSettings>,
    pub targets: Vec<CollectionTarget>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        let mut dune = ProviderSettings::new("dune", ProviderKind::Dune);
        dune.credential_env = Some(crate::provider::dune::CREDENTIAL_ENV.to_string());

        Self {
            data_dir: PathBuf::from("data"),
            interval_minutes: 60,
            consolidation_time: NaiveTime::from_hms_opt(2, 0, 0).unwrap_or_default(),
            pace_ms: 100,
            failure_policy: FailurePolicy::default(),
            providers: vec![
                dune,
                ProviderSettings::new("hyperliquid", ProviderKind::Hyperliquid),
                ProviderSettings::new("binance", ProviderKind::Binance),
            ],
            targets: vec![
                CollectionTarget {
                    provider: "dune".to_string(),
                    symbols: vec!["bot_volume".to_string()],
                    interval: Interval::from("1d"),
                    mode: CollectionMode::Latest {
                        lookback_minutes: 30 * 24 * 60,
                    },
                    include_funding: false,
                },
                CollectionTarget {
                    provider: "hyperliquid".to_string(),
                    symbols: vec!["ETH".to_string(), "BTC".to_string()],
                    interval: Interval::from("1h"),
                    mode: CollectionMode::Latest {
                        lookback_minutes: 24 * 60,
                    },
                    include_funding: true,
                },
                CollectionTarget {
                    provider: "binance".to_string(),
                    symbols: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
                    interval: Interval::from("1h"),
                    mode: CollectionMode::Latest {
                        lookback_minutes: 24 * 60,
                    },
                    include_funding: false,
                },
            ],
        }
    }
}

impl CollectorConfig {
    /// Load a JSON configuration file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, MarketDataError> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| MarketDataError::InvalidConfig {
            provider: "collector".to_string(),
            message: format!("{}: {}", path.display(), e),
        })
    }

    pub fn pace(&self) -> Duration {
        Duration::from_millis(self.pace_ms)
    }

    /// Enabled provider settings.
    pub fn enabled_providers(&self) -> impl Iterator<Item = &ProviderSettings> {
        self.providers.iter().filter(|p| p.enabled)
    }
}

/// "HH:MM" (or "HH:MM:SS") time of day.
mod hh_mm {
    use super::*;

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(serde::de::Error::custom)
    }
}
