//! Hyperliquid `/info` response models.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::Numeric;

/// Response for `{"type": "meta"}`
#[derive(Debug, Deserialize)]
pub struct MetaResponse {
    #[serde(default)]
    pub universe: Vec<UniverseAsset>,
}

/// One perpetual listed in the meta universe
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniverseAsset {
    pub name: String,
    #[serde(default)]
    pub is_delisted: bool,
    // Note: szDecimals, maxLeverage exist but are not used
}

/// One element of the `recentTrades` response
#[derive(Debug, Deserialize)]
pub struct RawTrade {
    pub coin: String,
    /// "B" (buy) or "A" (sell)
    pub side: String,
    pub px: Value,
    pub sz: Value,
    pub time: i64,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub tid: Option<u64>,
}

/// Side of a public trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeSide {
    Buy,
    Sell,
    Unknown,
}

impl TradeSide {
    fn from_code(code: &str) -> Self {
        match code {
            "B" => Self::Buy,
            "A" => Self::Sell,
            _ => Self::Unknown,
        }
    }
}

/// A public trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: String,
    pub side: TradeSide,
    pub price: Numeric,
    pub size: Numeric,
    pub time: DateTime<Utc>,
    pub trade_id: Option<u64>,
    pub hash: Option<String>,
}

impl Trade {
    /// Convert a raw trade; `None` when its timestamp is out of range.
    pub fn from_raw(raw: RawTrade) -> Option<Self> {
        let time = Utc.timestamp_millis_opt(raw.time).single()?;
        Some(Self {
            symbol: raw.coin,
            side: TradeSide::from_code(&raw.side),
            price: Numeric::from_json(&raw.px),
            size: Numeric::from_json(&raw.sz),
            time,
            trade_id: raw.tid,
            hash: raw.hash,
        })
    }
}

/// Current mid price of one coin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidPrice {
    pub symbol: String,
    pub price: Numeric,
    pub observed_at: DateTime<Utc>,
}
