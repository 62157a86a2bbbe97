//! Watch command implementation

use crate::analytics::{Alert, AlertLog};
use crate::config::Config;
use crate::feed::{ConnectivityStatus, FeedHealth};
use crate::pipeline::{PairRequest, QueryService, Snapshot, TimeRange};
use crate::store::TickStore;
use crate::telemetry::{increment, record_latency, set_gauge, CounterMetric, GaugeMetric, LatencyMetric};
use chrono::{DateTime, Utc};
use clap::Args;
use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Database file (overrides [store] path)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Refresh once and exit
    #[arg(long)]
    pub once: bool,
}

impl WatchArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let path = self.db.clone().unwrap_or_else(|| config.store.path.clone());
        let mut watcher = Watcher::from_config(config, TickStore::open_read_only(&path)?)?;

        if self.once {
            let refresh = watcher.refresh(Utc::now()).await?;
            refresh.report(None);
            return Ok(());
        }

        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            }
        };
        watcher
            .run_until(Duration::from_secs(config.refresh.interval_secs.max(1)), shutdown, None)
            .await;
        Ok(())
    }
}

/// Result of one refresh pass
#[derive(Debug, Clone)]
pub struct Refresh {
    pub at: DateTime<Utc>,
    pub snapshot: Snapshot,
    /// Alerts not reported by earlier passes
    pub new_alerts: Vec<Alert>,
    pub connectivity: ConnectivityStatus,
}

impl Refresh {
    /// Log the refresh outcome
    pub fn report(&self, health: Option<&FeedHealth>) {
        if let Some(health) = health {
            for (symbol, h) in health.iter() {
                tracing::info!(
                    symbol = %symbol,
                    status = %h.status,
                    ticks = h.ticks_received,
                    parse_errors = h.parse_errors,
                    reconnects = h.reconnects,
                    "Feed"
                );
            }
        }

        match self.snapshot.latest() {
            Some(obs) => tracing::info!(
                connectivity = %self.connectivity,
                bars = self.snapshot.observations.len(),
                price_a = obs.price_a,
                price_b = obs.price_b,
                hedge_ratio = ?obs.hedge_ratio,
                spread = ?obs.spread,
                z_score = ?obs.z_score,
                correlation = ?obs.correlation,
                "Pair update"
            ),
            None => tracing::info!(
                connectivity = %self.connectivity,
                bars_a = self.snapshot.bars_a.len(),
                bars_b = self.snapshot.bars_b.len(),
                "Waiting for aligned bars"
            ),
        }

        for alert in &self.new_alerts {
            tracing::warn!(
                symbol_a = %alert.symbol_a,
                symbol_b = %alert.symbol_b,
                timestamp = %alert.timestamp,
                z_score = alert.z_score,
                direction = %alert.direction,
                "Spread alert"
            );
        }
    }
}

/// Periodic recompute over a read-only store
pub struct Watcher {
    service: QueryService,
    request: PairRequest,
    lookback: chrono::Duration,
    alerts: AlertLog,
}

impl Watcher {
    pub fn new(service: QueryService, request: PairRequest, lookback: chrono::Duration) -> Self {
        Self {
            service,
            request,
            lookback,
            alerts: AlertLog::new(),
        }
    }

    pub fn from_config(config: &Config, store: TickStore) -> anyhow::Result<Self> {
        let request = config.pair_request()?;
        let lookback = config.refresh.lookback(&config.analytics);
        Ok(Self::new(QueryService::new(store), request, lookback))
    }

    pub fn request(&self) -> &PairRequest {
        &self.request
    }

    /// Recent alerts reported so far
    pub fn alerts(&self) -> &AlertLog {
        &self.alerts
    }

    /// Recompute over the lookback window ending at `now`
    pub async fn refresh(&mut self, now: DateTime<Utc>) -> anyhow::Result<Refresh> {
        let started = Instant::now();
        let service = self.service.clone();
        let request = self.request.clone();
        let range = TimeRange::trailing(now, self.lookback);

        let (snapshot, last_tick_at) = tokio::task::spawn_blocking(move || {
            let snapshot = service.snapshot(&request, &range)?;
            // The lookback can be empty while older ticks exist
            let last = match snapshot.last_tick_at {
                Some(ts) => Some(ts),
                None => service.last_tick_at(&request)?,
            };
            anyhow::Ok((snapshot, last))
        })
        .await??;

        let new_alerts = self.alerts.record(&snapshot.alerts);
        let connectivity = ConnectivityStatus::classify(last_tick_at, now);
        record_latency(LatencyMetric::Refresh, started.elapsed());
        self.publish(&snapshot, &new_alerts, last_tick_at, now);

        Ok(Refresh {
            at: now,
            snapshot,
            new_alerts,
            connectivity,
        })
    }

    fn publish(
        &self,
        snapshot: &Snapshot,
        new_alerts: &[Alert],
        last_tick_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) {
        if let Some(obs) = snapshot.latest_defined() {
            if let Some(z) = obs.z_score {
                set_gauge(GaugeMetric::ZScore, z);
            }
            if let Some(beta) = obs.hedge_ratio {
                set_gauge(GaugeMetric::HedgeRatio, beta);
            }
        }
        if let Some(corr) = snapshot.observations.iter().rev().find_map(|o| o.correlation) {
            set_gauge(GaugeMetric::Correlation, corr);
        }
        if let Some(last) = last_tick_at {
            set_gauge(GaugeMetric::LastTickAge, (now - last).num_milliseconds() as f64 / 1_000.0);
        }
        for _ in new_alerts {
            increment(CounterMetric::AlertsRaised, &self.request.symbol_a);
        }
    }

    /// Refresh every `period` until `shutdown` resolves
    ///
    /// A failed refresh is logged and retried on the next tick.
    pub async fn run_until<F>(&mut self, period: Duration, shutdown: F, ingest: Option<&super::Ingest>)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let health = match ingest {
                        Some(ingest) => Some(ingest.health().await),
                        None => None,
                    };
                    match self.refresh(Utc::now()).await {
                        Ok(refresh) => refresh.report(health.as_ref()),
                        Err(e) => tracing::error!(error = %e, "Refresh failed"),
                    }
                }
                _ = &mut shutdown => {
                    tracing::info!("Watcher stopping");
                    break;
                }
            }
        }
    }
}
