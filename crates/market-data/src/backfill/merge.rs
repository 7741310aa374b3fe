use crate::models::{dedup_sorted, Candle, TimeRange};

/// Merge chunk results in request order.
///
/// The first occurrence of a (symbol, open_time) pair wins, the result is
/// sorted ascending and clipped to `range`.
pub fn merge_chunks(chunks: Vec<Vec<Candle>>, range: &TimeRange) -> Vec<Candle> {
    let mut merged = dedup_sorted(chunks.into_iter().flatten().collect());
    merged.retain(|c| range.contains(c.open_time));
    merged
}
