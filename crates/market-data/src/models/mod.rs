//! Market data models
//!
//! - `types` - Type aliases for common identifiers
//! - `interval` - Granularity codes and their fixed duration table
//! - `range` - Half-open time windows
//! - `candle` - Normalized rows (Candle), numeric coercion (Numeric) and
//!   advisory invariants (CandleIssue)
//! - `series` - Ordered, de-duplicated series and their persistence key
//! - `health` - Provider health snapshots
//! - `collection` - Collection log records and consolidation summaries

mod candle;
mod collection;
mod health;
mod interval;
mod range;
mod series;
mod types;

pub use candle::{Candle, CandleIssue, Numeric};
pub use collection::{CollectionLogRecord, ConsolidatedEntry};
pub use health::HealthStatus;
pub use interval::Interval;
pub use range::TimeRange;
pub(crate) use series::dedup_sorted;
pub use series::{SeriesKey, SeriesKind, TimeSeries};
pub use types::DatasetId;
