//! Binance REST response models.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::Numeric;

/// Response from /exchangeInfo
#[derive(Debug, Deserialize)]
pub struct ExchangeInfoResponse {
    #[serde(default)]
    pub symbols: Vec<SymbolInfo>,
}

/// One symbol in /exchangeInfo
#[derive(Debug, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    pub status: String,
    // Note: baseAsset, quoteAsset, filters exist but are not used
}

/// One element of the /ticker/24hr response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTicker {
    pub symbol: String,
    #[serde(default)]
    pub last_price: Value,
    #[serde(default)]
    pub volume: Value,
    #[serde(default)]
    pub price_change_percent: Value,
}

/// 24h rolling statistics for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker24h {
    pub symbol: String,
    /// Last traded price
    pub price: Numeric,
    /// Base asset volume over 24h
    pub volume: Numeric,
    /// Price change over 24h, in percent
    pub change_24h: Numeric,
}

impl From<RawTicker> for Ticker24h {
    fn from(raw: RawTicker) -> Self {
        Self {
            symbol: raw.symbol,
            price: Numeric::from_json(&raw.last_price),
            volume: Numeric::from_json(&raw.volume),
            change_24h: Numeric::from_json(&raw.price_change_percent),
        }
    }
}
