use chrono::Duration;

use crate::models::{Interval, TimeRange};

/// Split `range` into consecutive half-open windows of at most
/// `max_rows` buckets of `interval`.
///
/// Windows tile the range exactly: each one starts where the previous one
/// ended, and the last one is clipped to `range.end`. An empty range yields
/// no windows.
pub fn plan_chunks(range: &TimeRange, interval: &Interval, max_rows: usize) -> Vec<TimeRange> {
    if range.is_empty() {
        return Vec::new();
    }

    let rows = i32::try_from(max_rows.max(1)).unwrap_or(i32::MAX);
    let span = interval
        .duration()
        .checked_mul(rows)
        .filter(|span| *span > Duration::zero())
        .unwrap_or_else(|| range.duration());

    let mut chunks = Vec::new();
    let mut current = range.start;
    while current < range.end {
        let end = current
            .checked_add_signed(span)
            .map(|end| end.min(range.end))
            .unwrap_or(range.end);
        chunks.push(TimeRange::new(current, end));
        current = end;
    }
    chunks
}
