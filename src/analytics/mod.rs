//! Click-history analytics
//!
//! Reconstructs a zero-filled, time-bucketed click series and a referrer
//! breakdown from a link's click rows. The bucketing runs server-side over
//! the full per-link ledger; per-link click volume is assumed bounded.

pub mod aggregator;
pub mod models;

pub use aggregator::{aggregate, UNKNOWN_REFERRER};
pub use models::{Aggregation, Granularity, SeriesPoint, TimeRange};
