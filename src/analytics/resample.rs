//! Tick → bar resampling

use super::AnalyticsError;
use crate::feed::{normalize_symbol, Tick};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Fixed bar interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Interval {
    OneSecond,
    OneMinute,
    FiveMinutes,
}

impl Interval {
    pub fn millis(self) -> i64 {
        match self {
            Interval::OneSecond => 1_000,
            Interval::OneMinute => 60_000,
            Interval::FiveMinutes => 300_000,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::milliseconds(self.millis())
    }

    /// Start of the bucket containing `ts`, aligned to the epoch
    pub fn floor(self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let ms = ts.timestamp_millis();
        let start = ms - ms.rem_euclid(self.millis());
        // Aligned value is never later than `ts`, so it is always representable
        Utc.timestamp_millis_opt(start).single().unwrap_or(ts)
    }

    /// Number of whole intervals between the epoch and the bucket holding `ts`
    pub fn ordinal(self, ts: DateTime<Utc>) -> i64 {
        ts.timestamp_millis().div_euclid(self.millis())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Interval::OneSecond => "1s",
            Interval::OneMinute => "1m",
            Interval::FiveMinutes => "5m",
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1s" | "1sec" => Ok(Interval::OneSecond),
            "1m" | "1min" => Ok(Interval::OneMinute),
            "5m" | "5min" => Ok(Interval::FiveMinutes),
            _ => Err(AnalyticsError::InvalidInterval(s.to_string())),
        }
    }
}

impl TryFrom<String> for Interval {
    type Error = AnalyticsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Interval> for String {
    fn from(value: Interval) -> Self {
        value.as_str().to_string()
    }
}

/// Aggregated price/size summary for one interval bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub interval: Interval,
    pub interval_start: DateTime<Utc>,
    /// Price of the last tick in the bucket
    pub close_price: f64,
    /// Sum of tick sizes in the bucket
    pub total_size: f64,
    pub trade_count: usize,
}

/// Resample the ticks of `symbol` into `interval` bars
///
/// `ticks` is taken in insertion order. Ticks sharing a timestamp keep that
/// order, so the close of a bucket is the last inserted tick among those
/// with the greatest timestamp. Empty buckets are omitted, not forward
/// filled.
pub fn resample(symbol: &str, ticks: &[Tick], interval: Interval) -> Vec<Bar> {
    let symbol = normalize_symbol(symbol);

    let mut selected: Vec<&Tick> = ticks.iter().filter(|t| t.symbol == symbol).collect();
    // Stable: equal timestamps stay in insertion order
    selected.sort_by_key(|t| t.timestamp);

    let mut buckets: BTreeMap<DateTime<Utc>, Bar> = BTreeMap::new();
    for tick in selected {
        let start = interval.floor(tick.timestamp);
        let bar = buckets.entry(start).or_insert_with(|| Bar {
            symbol: symbol.clone(),
            interval,
            interval_start: start,
            close_price: tick.price,
            total_size: 0.0,
            trade_count: 0,
        });
        bar.close_price = tick.price;
        bar.total_size += tick.size;
        bar.trade_count += 1;
    }

    buckets.into_values().collect()
}
