//! Feed health tracking and connectivity classification

use super::types::{normalize_symbol, FeedStatus};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Newest tick younger than this counts as live
pub const LIVE_THRESHOLD_SECS: i64 = 30;
/// Newest tick younger than this (but not live) counts as delayed
pub const DELAYED_THRESHOLD_SECS: i64 = 300;

/// Per-symbol listener health
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolHealth {
    pub status: FeedStatus,
    pub ticks_received: u64,
    pub parse_errors: u64,
    pub reconnects: u64,
    pub last_tick_at: Option<DateTime<Utc>>,
}

impl Default for SymbolHealth {
    fn default() -> Self {
        Self {
            status: FeedStatus::Connecting,
            ticks_received: 0,
            parse_errors: 0,
            reconnects: 0,
            last_tick_at: None,
        }
    }
}

/// Health of every subscription owned by a listener
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedHealth {
    symbols: BTreeMap<String, SymbolHealth>,
}

impl FeedHealth {
    pub fn register(&mut self, symbol: &str) {
        self.symbols.entry(normalize_symbol(symbol)).or_default();
    }

    pub fn get(&self, symbol: &str) -> Option<&SymbolHealth> {
        self.symbols.get(&normalize_symbol(symbol))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SymbolHealth)> {
        self.symbols.iter()
    }

    pub fn set_status(&mut self, symbol: &str, status: FeedStatus) {
        let entry = self.symbols.entry(normalize_symbol(symbol)).or_default();
        if entry.status == FeedStatus::Subscribed && status == FeedStatus::Disconnected {
            entry.reconnects += 1;
        }
        entry.status = status;
    }

    pub fn record_tick(&mut self, symbol: &str, at: DateTime<Utc>) {
        let entry = self.symbols.entry(normalize_symbol(symbol)).or_default();
        entry.ticks_received += 1;
        entry.last_tick_at = Some(entry.last_tick_at.map_or(at, |prev| prev.max(at)));
    }

    pub fn record_parse_error(&mut self, symbol: &str) {
        self.symbols
            .entry(normalize_symbol(symbol))
            .or_default()
            .parse_errors += 1;
    }

    /// Worst status across all subscriptions
    pub fn overall(&self) -> FeedStatus {
        let statuses = self.symbols.values().map(|h| h.status);
        if self.symbols.is_empty() {
            FeedStatus::Connecting
        } else if statuses.clone().any(|s| s == FeedStatus::Disconnected) {
            FeedStatus::Disconnected
        } else if statuses.clone().all(|s| s == FeedStatus::Subscribed) {
            FeedStatus::Subscribed
        } else {
            FeedStatus::Connecting
        }
    }
}

/// Connectivity as seen from the stored data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectivityStatus {
    /// No tick stored yet
    NoData,
    Live { age_secs: i64 },
    Delayed { age_secs: i64 },
    Disconnected { age_secs: i64 },
}

impl ConnectivityStatus {
    /// Classify by the age of the newest stored tick
    pub fn classify(last_tick: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        let Some(last) = last_tick else {
            return ConnectivityStatus::NoData;
        };
        let age_secs = (now - last).max(Duration::zero()).num_seconds();
        if age_secs < LIVE_THRESHOLD_SECS {
            ConnectivityStatus::Live { age_secs }
        } else if age_secs < DELAYED_THRESHOLD_SECS {
            ConnectivityStatus::Delayed { age_secs }
        } else {
            ConnectivityStatus::Disconnected { age_secs }
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, ConnectivityStatus::Live { .. })
    }
}

impl std::fmt::Display for ConnectivityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectivityStatus::NoData => write!(f, "no data"),
            ConnectivityStatus::Live { age_secs } => write!(f, "live (last tick {age_secs}s ago)"),
            ConnectivityStatus::Delayed { age_secs } => {
                write!(f, "delayed (last tick {age_secs}s ago)")
            }
            ConnectivityStatus::Disconnected { age_secs } => {
                write!(f, "disconnected (last tick {age_secs}s ago)")
            }
        }
    }
}
