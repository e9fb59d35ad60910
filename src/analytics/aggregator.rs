//! Range filtering, bucketing and referrer tallies over a link's clicks

use std::collections::BTreeMap;

use crate::analytics::models::{Aggregation, Granularity, SeriesPoint, TimeRange};
use crate::models::Click;

/// Caller-facing stand-in for an empty referrer
pub const UNKNOWN_REFERRER: &str = "Unknown";

/// Aggregate a link's clicks over `range`.
///
/// The series carries one zero-filled entry per bucket stepped from the
/// range start, so every bucket in range appears even with no clicks and the
/// chart axis stays continuous. Each in-range click lands in the bucket of
/// its truncated timestamp; a click whose truncation was not pre-seeded is
/// inserted as an extra entry, so the bucket counts always sum to
/// `total_clicks`. `earliest_click` looks at the full click set, not just
/// the range, so callers can offer an "all time" shortcut.
///
/// An empty ledger is a valid, zero-valued result, not an error.
pub fn aggregate(clicks: &[Click], range: TimeRange) -> Aggregation {
    let earliest_click = clicks.iter().map(|c| c.timestamp).min();

    let in_range: Vec<&Click> = clicks.iter().filter(|c| range.contains(c.timestamp)).collect();
    let total_clicks = in_range.len() as u64;

    let granularity = Granularity::for_range(&range);

    // Seed every bucket from start to end, inclusive of the start, stopping
    // once the step passes the end
    let mut series: BTreeMap<String, u64> = BTreeMap::new();
    let mut ts = range.start();
    while ts <= range.end() {
        series.insert(granularity.label(ts), 0);
        ts += granularity.step_secs();
    }

    for click in &in_range {
        *series.entry(granularity.label(click.timestamp)).or_insert(0) += 1;
    }

    let mut referrers: BTreeMap<String, u64> = BTreeMap::new();
    for click in &in_range {
        let name = if click.referrer.is_empty() {
            UNKNOWN_REFERRER
        } else {
            click.referrer.as_str()
        };
        *referrers.entry(name.to_string()).or_insert(0) += 1;
    }

    Aggregation {
        total_clicks,
        series: series
            .into_iter()
            .map(|(bucket, clicks)| SeriesPoint { bucket, clicks })
            .collect(),
        referrers,
        earliest_click,
        granularity,
    }
}
