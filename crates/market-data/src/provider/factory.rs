//! Construction of providers from settings.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::ProviderSettings;
use crate::errors::MarketDataError;
use crate::provider::binance::{self, BinanceProvider, MarketType};
use crate::provider::dune::{self, DuneProvider};
use crate::provider::hyperliquid::{self, HyperliquidProvider};
use crate::provider::{MarketDataProvider, ProviderConfig};

/// Provider variants this crate can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "dune")]
    Dune,
    #[serde(rename = "hyperliquid")]
    Hyperliquid,
    #[serde(rename = "binance")]
    Binance,
    #[serde(rename = "binance-futures")]
    BinanceFutures,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        Self::Dune,
        Self::Hyperliquid,
        Self::Binance,
        Self::BinanceFutures,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dune => "dune",
            Self::Hyperliquid => "hyperliquid",
            Self::Binance => "binance",
            Self::BinanceFutures => "binance-futures",
        }
    }

    /// Built-in configuration for this kind.
    pub fn default_config(&self) -> ProviderConfig {
        match self {
            Self::Dune => dune::default_config(),
            Self::Hyperliquid => hyperliquid::default_config(),
            Self::Binance => binance::default_config(MarketType::Spot),
            Self::BinanceFutures => binance::default_config(MarketType::Futures),
        }
    }

    /// Environment variable holding the credential, for kinds that need one.
    pub fn default_credential_env(&self) -> Option<&'static str> {
        match self {
            Self::Dune => Some(dune::CREDENTIAL_ENV),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| MarketDataError::UnknownProvider(s.to_string()))
    }
}

/// Names of every buildable provider kind.
pub fn available_kinds() -> Vec<&'static str> {
    ProviderKind::ALL.iter().map(|k| k.as_str()).collect()
}

/// Build the provider described by `settings`.
///
/// Missing required credentials and invalid limits are configuration
/// errors.
pub fn build_provider(
    settings: &ProviderSettings,
) -> Result<Arc<dyn MarketDataProvider>, MarketDataError> {
    let config = settings.resolve()?;

    let provider: Arc<dyn MarketDataProvider> = match settings.kind {
        ProviderKind::Dune => {
            if config.credential.is_none() {
                return Err(MarketDataError::MissingCredential {
                    provider: config.name.clone(),
                    env_var: settings.credential_env_name().unwrap_or(dune::CREDENTIAL_ENV).to_string(),
                });
            }
            let provider = if settings.queries.is_empty() {
                DuneProvider::new(config)?
            } else {
                DuneProvider::with_queries(config, settings.queries.clone())?
            };
            Arc::new(provider)
        }
        ProviderKind::Hyperliquid => Arc::new(HyperliquidProvider::new(config)?),
        ProviderKind::Binance => Arc::new(BinanceProvider::new(config, MarketType::Spot)?),
        ProviderKind::BinanceFutures => {
            Arc::new(BinanceProvider::new(config, MarketType::Futures)?)
        }
    };
    Ok(provider)
}
