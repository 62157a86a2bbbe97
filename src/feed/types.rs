//! Feed types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single trade tick
///
/// Immutable once recorded. `symbol` is always upper case and `timestamp`
/// is the exchange trade time in UTC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Trading symbol (e.g., "BTCUSDT")
    pub symbol: String,
    /// Trade price
    pub price: f64,
    /// Trade quantity
    pub size: f64,
    /// Exchange trade time
    pub timestamp: DateTime<Utc>,
}

impl Tick {
    pub fn new(symbol: &str, price: f64, size: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: normalize_symbol(symbol),
            price,
            size,
            timestamp,
        }
    }
}

/// Canonical symbol spelling used by the store and all queries
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Subscription status of a single feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    Connecting,
    Subscribed,
    Disconnected,
}

impl std::fmt::Display for FeedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FeedStatus::Connecting => "connecting",
            FeedStatus::Subscribed => "subscribed",
            FeedStatus::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

/// Events produced by a [`super::TradeFeed`] subscription
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Tick(Tick),
    Status(FeedStatus),
    /// An inbound message was dropped
    Rejected(ParseError),
}

/// Inbound message could not be turned into a tick
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("invalid {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(i64),
}
