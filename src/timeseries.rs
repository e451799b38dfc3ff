//! Time-Series Formatter
//!
//! Subgraph snapshots are keyed by an integer bucket id (unix time divided by
//! the bucket length) and come back newest-first. Charts want oldest-first
//! points with ISO timestamps.

use chrono::{DateTime, SecondsFormat, Utc};
use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================
// SAMPLING
// ============================================

/// Bucket length of a snapshot entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interval {
    FifteenMinutes,
    OneDay,
}

impl Interval {
    pub fn seconds(&self) -> i64 {
        match self {
            Interval::FifteenMinutes => 900,
            Interval::OneDay => 86_400,
        }
    }

    /// Subgraph entity holding SNX price snapshots at this interval
    pub fn price_entity(&self) -> &'static str {
        match self {
            Interval::FifteenMinutes => "fifteenMinuteSNXPrices",
            Interval::OneDay => "dailySNXPrices",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interval::FifteenMinutes => write!(f, "15m"),
            Interval::OneDay => write!(f, "1d"),
        }
    }
}

/// Display window chosen by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Period {
    #[default]
    Day,
    Week,
    Month,
    Year,
}

impl Period {
    /// Fixed lookup: (bucket size, number of buckets)
    pub fn sampling(&self) -> (Interval, usize) {
        match self {
            Period::Day => (Interval::FifteenMinutes, 96),
            Period::Week => (Interval::FifteenMinutes, 672),
            Period::Month => (Interval::OneDay, 30),
            Period::Year => (Interval::OneDay, 365),
        }
    }
}

impl FromStr for Period {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "D" | "DAY" => Ok(Period::Day),
            "W" | "WEEK" => Ok(Period::Week),
            "M" | "MONTH" => Ok(Period::Month),
            "Y" | "YEAR" => Ok(Period::Year),
            other => Err(eyre!("unknown period {:?} (expected D, W, M or Y)", other)),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Day => write!(f, "D"),
            Period::Week => write!(f, "W"),
            Period::Month => write!(f, "M"),
            Period::Year => write!(f, "Y"),
        }
    }
}

// ============================================
// FORMATTING
// ============================================

/// One raw snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub id: i64,
    pub value: f64,
}

/// One chart point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub created: String,
    pub value: f64,
}

/// Bucket start as epoch milliseconds
pub fn bucket_timestamp_ms(id: i64, interval: Interval) -> Result<i64> {
    id.checked_mul(interval.seconds())
        .and_then(|secs| secs.checked_mul(1000))
        .ok_or_else(|| eyre!("bucket {} at {} overflows a millisecond timestamp", id, interval))
}

/// Same format as JavaScript's `Date.prototype.toISOString`
pub fn iso_timestamp(ms: i64) -> Result<String> {
    let time = DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| eyre!("timestamp {}ms out of range", ms))?;
    Ok(time.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Newest-first samples → ascending points. Every sample is kept.
pub fn format_series(samples: &[RawSample], interval: Interval) -> Result<Vec<TimeSeriesPoint>> {
    let mut ordered = samples.to_vec();
    // Stable sort: reverses descending input, tolerates partially ordered pages
    ordered.sort_by_key(|s| s.id);

    ordered
        .into_iter()
        .map(|s| {
            Ok(TimeSeriesPoint {
                created: iso_timestamp(bucket_timestamp_ms(s.id, interval)?)?,
                value: s.value,
            })
        })
        .collect()
}
