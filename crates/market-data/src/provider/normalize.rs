//! Mapping of raw provider rows onto [`Candle`].
//!
//! Every provider declares a fixed column table. Known fields are renamed onto
//! the candle shape, numeric cells are coerced through [`Numeric`], and
//! fields the table does not know are kept under `extra["unknown_<name>"]`.
//!
//! Timestamps follow a single rule: numbers (and numeric strings) are epoch
//! milliseconds. Non-numeric strings are accepted in the handful of textual
//! formats upstream query engines emit.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use tracing::warn;

use crate::models::{Candle, Interval, Numeric};

/// Where a raw field lands on the candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    OpenTime,
    Open,
    High,
    Low,
    Close,
    Volume,
    TradeCount,
    /// Kept verbatim under `extra[name]`.
    Extra(&'static str),
    /// Known but redundant (e.g. the symbol echoed back).
    Skip,
}

/// Fixed field-name table for one provider schema.
///
/// When several fields map to [`Column::OpenTime`], the first one listed that
/// holds a parseable timestamp wins.
#[derive(Debug, Clone, Copy)]
pub struct ColumnTable {
    pub columns: &'static [(&'static str, Column)],
}

impl ColumnTable {
    pub const fn new(columns: &'static [(&'static str, Column)]) -> Self {
        Self { columns }
    }

    pub fn lookup(&self, field: &str) -> Option<Column> {
        self.columns
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, column)| *column)
    }

    fn time_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns
            .iter()
            .filter(|(_, column)| *column == Column::OpenTime)
            .map(|(name, _)| *name)
    }
}

/// What normalization had to tolerate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizationReport {
    pub rows_in: usize,
    /// Rows without a usable timestamp.
    pub dropped_rows: usize,
    pub unparseable_cells: usize,
    /// Distinct field names not in the column table.
    pub unknown_columns: Vec<String>,
}

impl NormalizationReport {
    pub fn is_clean(&self) -> bool {
        self.dropped_rows == 0 && self.unparseable_cells == 0 && self.unknown_columns.is_empty()
    }

    /// Emit a single warning summarizing anything unusual.
    pub fn log(&self, provider: &str, symbol: &str) {
        if self.is_clean() {
            return;
        }
        warn!(
            "{} {}: normalized {} rows, dropped {} without timestamp, {} unparseable cells, unknown columns {:?}",
            provider,
            symbol,
            self.rows_in,
            self.dropped_rows,
            self.unparseable_cells,
            self.unknown_columns
        );
    }

    fn note_unknown(&mut self, field: &str) {
        if !self.unknown_columns.iter().any(|f| f == field) {
            self.unknown_columns.push(field.to_string());
        }
    }
}

/// Parse a raw timestamp cell.
///
/// Numbers and numeric strings are epoch milliseconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            Utc.timestamp_millis_opt(millis).single()
        }
        Value::String(s) => parse_timestamp_str(s.trim()),
        _ => None,
    }
}

fn parse_timestamp_str(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(millis) = raw.parse::<i64>() {
        return Utc.timestamp_millis_opt(millis).single();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // Query engines render timestamps as "2024-01-01 00:00:00.000 UTC".
    let naive = raw.trim_end_matches(" UTC");
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(naive, format) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }
    NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| Utc.from_utc_datetime(&ndt))
}

fn parse_trade_count(value: &Value) -> Result<Option<u64>, ()> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64))
            .map(Some)
            .ok_or(()),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s.trim().parse::<u64>().map(Some).map_err(|_| ()),
        _ => Err(()),
    }
}

/// Apply one non-time column to `candle`.
fn apply(candle: &mut Candle, column: Column, value: &Value, report: &mut NormalizationReport) {
    let numeric = |report: &mut NormalizationReport| {
        let n = Numeric::from_json(value);
        if n.is_unparseable() {
            report.unparseable_cells += 1;
        }
        n
    };
    match column {
        Column::OpenTime | Column::Skip => {}
        Column::Open => candle.open = numeric(report),
        Column::High => candle.high = numeric(report),
        Column::Low => candle.low = numeric(report),
        Column::Close => candle.close = numeric(report),
        Column::Volume => candle.volume = numeric(report),
        Column::TradeCount => match parse_trade_count(value) {
            Ok(count) => candle.trade_count = count,
            Err(()) => {
                report.unparseable_cells += 1;
                candle
                    .extra
                    .insert("unparseable_trade_count".to_string(), value.clone());
            }
        },
        Column::Extra(name) => {
            candle.extra.insert(name.to_string(), value.clone());
        }
    }
}

fn normalize_object(
    symbol: &str,
    interval: &Interval,
    table: &ColumnTable,
    row: &Map<String, Value>,
    report: &mut NormalizationReport,
) -> Option<Candle> {
    let open_time = table
        .time_fields()
        .filter_map(|field| row.get(field))
        .find_map(parse_timestamp)?;

    let mut candle = Candle::new(symbol, interval.clone(), open_time);
    for (field, value) in row {
        match table.lookup(field) {
            Some(column) => apply(&mut candle, column, value, report),
            None => {
                report.note_unknown(field);
                candle.extra.insert(format!("unknown_{field}"), value.clone());
            }
        }
    }
    Some(candle)
}

/// Normalize rows shaped as JSON objects (Hyperliquid candles, Dune rows).
pub fn normalize_objects(
    symbol: &str,
    interval: &Interval,
    table: &ColumnTable,
    rows: &[Value],
) -> (Vec<Candle>, NormalizationReport) {
    let mut report = NormalizationReport {
        rows_in: rows.len(),
        ..Default::default()
    };
    let mut candles = Vec::with_capacity(rows.len());

    for row in rows {
        let candle = row
            .as_object()
            .and_then(|obj| normalize_object(symbol, interval, table, obj, &mut report));
        match candle {
            Some(c) => candles.push(c),
            None => report.dropped_rows += 1,
        }
    }
    (candles, report)
}

/// Normalize rows shaped as positional arrays (Binance klines).
///
/// `columns[i]` describes element `i`. The first [`Column::OpenTime`]
/// position is the timestamp; elements beyond the table are kept as
/// `extra["unknown_<index>"]`.
pub fn normalize_positional(
    symbol: &str,
    interval: &Interval,
    columns: &[Column],
    rows: &[Value],
) -> (Vec<Candle>, NormalizationReport) {
    let mut report = NormalizationReport {
        rows_in: rows.len(),
        ..Default::default()
    };
    let mut candles = Vec::with_capacity(rows.len());
    let time_index = columns.iter().position(|c| *c == Column::OpenTime);

    for row in rows {
        let cells = match row.as_array() {
            Some(cells) => cells,
            None => {
                report.dropped_rows += 1;
                continue;
            }
        };
        let open_time = time_index
            .and_then(|i| cells.get(i))
            .and_then(parse_timestamp);
        let Some(open_time) = open_time else {
            report.dropped_rows += 1;
            continue;
        };

        let mut candle = Candle::new(symbol, interval.clone(), open_time);
        for (index, value) in cells.iter().enumerate() {
            match columns.get(index) {
                Some(column) => apply(&mut candle, *column, value, &mut report),
                None => {
                    let field = index.to_string();
                    report.note_unknown(&field);
                    candle.extra.insert(format!("unknown_{field}"), value.clone());
                }
            }
        }
        candles.push(candle);
    }
    (candles, report)
}
