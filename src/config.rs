//! Configuration types for pairwatch
//!
//! Every section and key is optional; missing values fall back to the
//! defaults below, so an empty file is a valid configuration.

use crate::analytics::{AnalyticsError, Interval, RefitPolicy};
use crate::feed::BINANCE_WS_URL;
use crate::pipeline::PairRequest;
use crate::telemetry::LogFormat;
use crate::ws::WsConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feed: FeedConfig,
    pub analytics: AnalyticsConfig,
    pub store: StoreConfig,
    pub refresh: RefreshConfig,
    pub telemetry: TelemetryConfig,
}

/// Trade feed configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub base_url: String,
    /// The pair: first symbol is leg A (regressed), second is leg B
    pub symbols: [String; 2],
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Consecutive failed connections before giving up (0 = never)
    pub max_reconnects: u32,
    pub ping_interval_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: BINANCE_WS_URL.to_string(),
            symbols: ["btcusdt".to_string(), "ethusdt".to_string()],
            initial_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
            max_reconnects: 0,
            ping_interval_secs: 30,
        }
    }
}

impl FeedConfig {
    /// Socket settings shared by both subscriptions
    pub fn ws_config(&self) -> WsConfig {
        WsConfig::default()
            .max_reconnects(self.max_reconnects)
            .initial_delay(Duration::from_millis(self.initial_backoff_ms))
            .max_delay(Duration::from_millis(self.max_backoff_ms))
            .ping_interval(Duration::from_secs(self.ping_interval_secs.max(1)))
    }
}

/// Hedge ratio refit schedule as written in the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefitMode {
    Rolling,
    Periodic,
}

/// Statistics configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Bar interval: "1s", "1m" or "5m"
    pub interval: Interval,
    /// Rolling window length in bars
    pub window: usize,
    /// Absolute z-score above which an alert fires
    pub z_threshold: f64,
    pub refit: RefitMode,
    /// Bars between refits when `refit = "periodic"`
    pub refit_every: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            interval: Interval::OneSecond,
            window: 60,
            z_threshold: 2.0,
            refit: RefitMode::Rolling,
            refit_every: 10,
        }
    }
}

impl AnalyticsConfig {
    pub fn refit_policy(&self) -> RefitPolicy {
        match self.refit {
            RefitMode::Rolling => RefitPolicy::Rolling,
            RefitMode::Periodic => RefitPolicy::Periodic {
                every: self.refit_every,
            },
        }
    }

    /// Validated pipeline request for the configured pair
    pub fn pair_request(&self, symbols: &[String; 2]) -> Result<PairRequest, AnalyticsError> {
        PairRequest::new(&symbols[0], &symbols[1], self.interval, self.window)
            .refit(self.refit_policy())
            .threshold(self.z_threshold)
            .validate()
    }
}

/// Tick store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file
    pub path: PathBuf,
    /// Ticks buffered before a flush
    pub buffer_size: usize,
    /// Maximum time between flushes
    pub flush_interval_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("ticks.db"),
            buffer_size: 256,
            flush_interval_ms: 1_000,
        }
    }
}

/// Refresh loop configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub interval_secs: u64,
    /// Bars of history read on each refresh (default: 4 × window)
    pub lookback_bars: Option<usize>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3,
            lookback_bars: None,
        }
    }
}

impl RefreshConfig {
    /// Wall-clock span of history needed for one refresh
    pub fn lookback(&self, analytics: &AnalyticsConfig) -> chrono::Duration {
        let bars = self.lookback_bars.unwrap_or(analytics.window.saturating_mul(4));
        analytics.interval.duration() * i32::try_from(bars).unwrap_or(i32::MAX)
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
    /// Serve Prometheus metrics on this port when set
    pub metrics_port: Option<u16>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Pipeline request for the configured pair
    pub fn pair_request(&self) -> Result<PairRequest, AnalyticsError> {
        self.analytics.pair_request(&self.feed.symbols)
    }
}
