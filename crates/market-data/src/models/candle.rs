use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::interval::Interval;

/// A numeric cell after coercion.
///
/// Upstream values that cannot be read as a decimal are kept verbatim as
/// `Unparseable` so the row survives; absent/null cells are `Missing`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Value(Decimal),
    Unparseable {
        unparseable: String,
    },
    #[default]
    Missing,
}

impl Numeric {
    pub fn unparseable(raw: impl Into<String>) -> Self {
        Self::Unparseable {
            unparseable: raw.into(),
        }
    }

    /// Coerce a raw JSON cell. Numbers and numeric strings become values,
    /// null and empty strings are missing, anything else is unparseable.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Missing,
            Value::Number(n) => Self::parse(&n.to_string()),
            Value::String(s) => Self::parse(s),
            other => Self::unparseable(other.to_string()),
        }
    }

    /// Coerce a raw string.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Missing;
        }
        Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .map(Self::Value)
            .unwrap_or_else(|_| Self::unparseable(raw))
    }

    pub fn value(&self) -> Option<Decimal> {
        match self {
            Self::Value(d) => Some(*d),
            _ => None,
        }
    }

    pub fn is_unparseable(&self) -> bool {
        matches!(self, Self::Unparseable { .. })
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

impl From<Decimal> for Numeric {
    fn from(value: Decimal) -> Self {
        Self::Value(value)
    }
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(d) => write!(f, "{}", d),
            Self::Unparseable { unparseable } => write!(f, "unparseable({})", unparseable),
            Self::Missing => f.write_str("-"),
        }
    }
}

/// One normalized row of a time series.
///
/// OHLCV series fill the price columns; funding and query series may leave
/// them `Missing` and carry their payload in `extra`. Columns without a
/// mapping are kept in `extra` under `unknown_<name>`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub interval: Interval,
    pub open_time: DateTime<Utc>,
    #[serde(default)]
    pub open: Numeric,
    #[serde(default)]
    pub high: Numeric,
    #[serde(default)]
    pub low: Numeric,
    #[serde(default)]
    pub close: Numeric,
    #[serde(default)]
    pub volume: Numeric,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_count: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl Candle {
    /// A row with only its identity filled in.
    pub fn new(symbol: impl Into<String>, interval: Interval, open_time: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
            open_time,
            open: Numeric::Missing,
            high: Numeric::Missing,
            low: Numeric::Missing,
            close: Numeric::Missing,
            volume: Numeric::Missing,
            trade_count: None,
            extra: BTreeMap::new(),
        }
    }

    /// A fully populated OHLCV row.
    #[allow(clippy::too_many_arguments)]
    pub fn ohlcv(
        symbol: impl Into<String>,
        interval: Interval,
        open_time: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            open: open.into(),
            high: high.into(),
            low: low.into(),
            close: close.into(),
            volume: volume.into(),
            ..Self::new(symbol, interval, open_time)
        }
    }

    /// Number of numeric cells that could not be coerced.
    pub fn unparseable_fields(&self) -> usize {
        [&self.open, &self.high, &self.low, &self.close, &self.volume]
            .iter()
            .filter(|n| n.is_unparseable())
            .count()
    }

    /// OHLC invariants this row violates.
    ///
    /// Comparisons only involve cells that hold a value, so sparse rows
    /// (funding, query results) are not flagged for what they lack.
    pub fn issues(&self) -> Vec<CandleIssue> {
        let mut issues = Vec::new();
        let (open, high, low, close) = (
            self.open.value(),
            self.high.value(),
            self.low.value(),
            self.close.value(),
        );
        let body_max = match (open, close) {
            (Some(o), Some(c)) => Some(o.max(c)),
            (o, c) => o.or(c),
        };
        let body_min = match (open, close) {
            (Some(o), Some(c)) => Some(o.min(c)),
            (o, c) => o.or(c),
        };

        if let (Some(h), Some(m)) = (high, body_max) {
            if h < m {
                issues.push(CandleIssue::HighBelowBody);
            }
        }
        if let (Some(l), Some(m)) = (low, body_min) {
            if l > m {
                issues.push(CandleIssue::LowAboveBody);
            }
        }
        if let (Some(h), Some(l)) = (high, low) {
            if h < l {
                issues.push(CandleIssue::HighBelowLow);
            }
        }
        if [open, high, low, close]
            .iter()
            .flatten()
            .any(|p| p.is_sign_negative() && !p.is_zero())
        {
            issues.push(CandleIssue::NegativePrice);
        }
        if self
            .volume
            .value()
            .is_some_and(|v| v.is_sign_negative() && !v.is_zero())
        {
            issues.push(CandleIssue::NegativeVolume);
        }
        if self.unparseable_fields() > 0 {
            issues.push(CandleIssue::UnparseableField);
        }
        issues
    }
}

/// An advisory candle invariant violated by upstream data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandleIssue {
    /// high < max(open, close)
    HighBelowBody,
    /// low > min(open, close)
    LowAboveBody,
    HighBelowLow,
    NegativePrice,
    NegativeVolume,
    UnparseableField,
}

impl fmt::Display for CandleIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::HighBelowBody => "high below max(open, close)",
            Self::LowAboveBody => "low above min(open, close)",
            Self::HighBelowLow => "high below low",
            Self::NegativePrice => "negative price",
            Self::NegativeVolume => "negative volume",
            Self::UnparseableField => "unparseable field",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_numeric_from_string_and_number() {
        assert_eq!(Numeric::from_json(&json!("2345.67")), Numeric::Value(dec!(2345.67)));
        assert_eq!(Numeric::from_json(&json!(42)), Numeric::Value(dec!(42)));
        assert_eq!(Numeric::from_json(&json!(0.5)), Numeric::Value(dec!(0.5)));
    }

    #[test]
    fn test_numeric_scientific() {
        assert_eq!(Numeric::parse("1e-5"), Numeric::Value(dec!(0.00001)));
    }

    #[test]
    fn test_numeric_unparseable_keeps_raw() {
        let n = Numeric::from_json(&json!("n/a"));
        assert!(n.is_unparseable());
        assert_eq!(n, Numeric::unparseable("n/a"));
        assert!(Numeric::from_json(&json!(true)).is_unparseable());
    }

    #[test]
    fn test_numeric_missing() {
        assert!(Numeric::from_json(&Value::Null).is_missing());
        assert!(Numeric::parse("  ").is_missing());
    }

    #[test]
    fn test_numeric_serde_shapes() {
        assert_eq!(serde_json::to_value(Numeric::Value(dec!(1.5))).unwrap(), json!("1.5"));
        assert_eq!(
            serde_json::to_value(Numeric::unparseable("x")).unwrap(),
            json!({"unparseable": "x"})
        );
        assert_eq!(serde_json::to_value(Numeric::Missing).unwrap(), Value::Null);

        let back: Numeric = serde_json::from_value(json!({"unparseable": "x"})).unwrap();
        assert_eq!(back, Numeric::unparseable("x"));
        let back: Numeric = serde_json::from_value(Value::Null).unwrap();
        assert_eq!(back, Numeric::Missing);
        let back: Numeric = serde_json::from_value(json!("1.5")).unwrap();
        assert_eq!(back, Numeric::Value(dec!(1.5)));
    }

    #[test]
    fn test_candle_serde_keeps_extra() {
        let mut candle = Candle::ohlcv(
            "ETH",
            Interval::from("1h"),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            dec!(100),
            dec!(110),
            dec!(95),
            dec!(105),
            dec!(1000),
        );
        candle.trade_count = Some(12);
        candle.extra.insert("unknown_foo".to_string(), json!("bar"));

        let json = serde_json::to_string(&candle).unwrap();
        let back: Candle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, candle);
    }

    #[test]
    fn test_unparseable_fields() {
        let mut candle = Candle::new(
            "ETH",
            Interval::from("1h"),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        );
        candle.open = Numeric::unparseable("?");
        candle.close = Numeric::unparseable("?");
        assert_eq!(candle.unparseable_fields(), 2);
    }

    fn sample(open: i64, high: i64, low: i64, close: i64) -> Candle {
        Candle::ohlcv(
            "BTC",
            Interval::from("1h"),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            open.into(),
            high.into(),
            low.into(),
            close.into(),
            dec!(1),
        )
    }

    #[test]
    fn test_issues_clean_candle() {
        assert!(sample(100, 110, 95, 105).issues().is_empty());
    }

    #[test]
    fn test_issues_inconsistent_ohlc() {
        let issues = sample(100, 99, 101, 105).issues();
        assert!(issues.contains(&CandleIssue::HighBelowBody));
        assert!(issues.contains(&CandleIssue::LowAboveBody));
        assert!(issues.contains(&CandleIssue::HighBelowLow));
    }

    #[test]
    fn test_issues_negative_and_unparseable() {
        let mut candle = sample(-1, 110, -2, 105);
        candle.volume = Numeric::Value(dec!(-3));
        candle.open = Numeric::unparseable("x");
        let issues = candle.issues();
        assert!(issues.contains(&CandleIssue::NegativePrice));
        assert!(issues.contains(&CandleIssue::NegativeVolume));
        assert!(issues.contains(&CandleIssue::UnparseableField));
    }

    #[test]
    fn test_issues_ignore_missing_cells() {
        let mut candle = Candle::new(
            "ETH",
            Interval::from("1h"),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        );
        candle.extra.insert("funding_rate".to_string(), json!("0.0001"));
        assert!(candle.issues().is_empty());
    }
}
