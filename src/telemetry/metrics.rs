//! Prometheus metrics

use std::time::Duration;

/// Per-symbol counters
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Ticks parsed off the feed
    TicksReceived,
    /// Ticks committed to the store
    TicksWritten,
    /// Inbound messages dropped as malformed
    ParseErrors,
    /// Subscription lost
    Disconnects,
    /// Batches the store refused
    StoreWriteFailures,
    /// Alerts raised by the refresh loop
    AlertsRaised,
}

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// One recorder flush
    StoreFlush,
    /// One full recompute of bars, observations and alerts
    Refresh,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Latest defined z-score
    ZScore,
    /// Latest defined rolling correlation
    Correlation,
    /// Latest hedge ratio
    HedgeRatio,
    /// Seconds since the newest stored tick
    LastTickAge,
}

impl CounterMetric {
    fn name(self) -> &'static str {
        match self {
            CounterMetric::TicksReceived => "pairwatch_ticks_received_total",
            CounterMetric::TicksWritten => "pairwatch_ticks_written_total",
            CounterMetric::ParseErrors => "pairwatch_parse_errors_total",
            CounterMetric::Disconnects => "pairwatch_feed_disconnects_total",
            CounterMetric::StoreWriteFailures => "pairwatch_store_write_failures_total",
            CounterMetric::AlertsRaised => "pairwatch_alerts_total",
        }
    }
}

/// Increment a counter labelled with `symbol` by one
pub fn increment(metric: CounterMetric, symbol: &str) {
    increment_by(metric, symbol, 1);
}

/// Increment a counter labelled with `symbol`
pub fn increment_by(metric: CounterMetric, symbol: &str, value: u64) {
    metrics::counter!(metric.name(), "symbol" => symbol.to_string()).increment(value);
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    let metric_name = match metric {
        LatencyMetric::StoreFlush => "pairwatch_store_flush_seconds",
        LatencyMetric::Refresh => "pairwatch_refresh_seconds",
    };

    metrics::histogram!(metric_name).record(duration.as_secs_f64());
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    let metric_name = match metric {
        GaugeMetric::ZScore => "pairwatch_zscore",
        GaugeMetric::Correlation => "pairwatch_rolling_correlation",
        GaugeMetric::HedgeRatio => "pairwatch_hedge_ratio",
        GaugeMetric::LastTickAge => "pairwatch_last_tick_age_seconds",
    };

    metrics::gauge!(metric_name).set(value);
}
