//! Data models for click analytics

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Caller-supplied `[start, end]` interval, inclusive on both ends.
/// Instants are UTC unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    start: i64,
    end: i64,
}

impl TimeRange {
    /// Returns `None` when `start > end`; an empty instant range
    /// (`start == end`) is valid.
    pub fn new(start: i64, end: i64) -> Option<Self> {
        if start > end {
            return None;
        }
        Some(Self { start, end })
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    pub fn duration_secs(&self) -> i64 {
        self.end - self.start
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }
}

/// Bucket width for the click series, chosen from the range duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Minute,
    Hour,
    Day,
}

impl Granularity {
    /// Up to one hour buckets by minute, up to one day by hour, day above
    /// that. Boundaries are inclusive: a range of exactly 60 minutes still
    /// buckets by minute.
    pub fn for_range(range: &TimeRange) -> Self {
        let secs = range.duration_secs();
        if secs <= 3600 {
            Granularity::Minute
        } else if secs <= 86_400 {
            Granularity::Hour
        } else {
            Granularity::Day
        }
    }

    pub fn step_secs(self) -> i64 {
        match self {
            Granularity::Minute => 60,
            Granularity::Hour => 3600,
            Granularity::Day => 86_400,
        }
    }

    /// UTC truncation of `timestamp` at this precision. Labels are
    /// zero-padded and fixed-width, so their lexicographic order is
    /// chronological.
    pub fn label(self, timestamp: i64) -> String {
        let dt = DateTime::<Utc>::from_timestamp(timestamp, 0).unwrap_or(DateTime::UNIX_EPOCH);
        let format = match self {
            Granularity::Minute => "%Y-%m-%dT%H:%M",
            Granularity::Hour => "%Y-%m-%dT%H",
            Granularity::Day => "%Y-%m-%d",
        };
        dt.format(format).to_string()
    }
}

/// One bucket of the click series
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SeriesPoint {
    pub bucket: String,
    pub clicks: u64,
}

/// Result of aggregating a link's clicks over a range
#[derive(Debug, Clone, Serialize)]
pub struct Aggregation {
    /// Clicks with a timestamp inside the range
    pub total_clicks: u64,
    /// One entry per bucket from range start to range end, zero-filled
    pub series: Vec<SeriesPoint>,
    /// Referrer tallies over the in-range clicks, empty referrer reported
    /// as "Unknown"
    pub referrers: BTreeMap<String, u64>,
    /// Timestamp of the link's first click ever, ignoring the range;
    /// `None` for a link that has never been resolved
    pub earliest_click: Option<i64>,
    pub granularity: Granularity,
}
