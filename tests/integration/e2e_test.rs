//! End-to-end integration tests

use chrono::{Duration, TimeZone, Utc};
use pairwatch::analytics::{Direction, Interval, RefitPolicy};
use pairwatch::cli::Watcher;
use pairwatch::config::Config;
use pairwatch::feed::{FeedEvent, FeedListener, FeedStatus, Tick, TradeFeed};
use pairwatch::pipeline::{PairRequest, QueryService, TimeRange};
use pairwatch::store::{RecorderConfig, TickRecorder, TickStore};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc;

#[test]
fn test_config_example_parses() {
    let config: Config = toml::from_str(include_str!("../../config.toml.example")).unwrap();
    let defaults = Config::default();

    assert_eq!(config.feed.symbols, defaults.feed.symbols);
    assert_eq!(config.feed.base_url, defaults.feed.base_url);
    assert_eq!(config.analytics.interval, Interval::OneSecond);
    assert_eq!(config.analytics.window, 60);
    assert_eq!(config.analytics.refit_policy(), RefitPolicy::Rolling);
    assert_eq!(config.store.path, defaults.store.path);
    assert_eq!(config.refresh.interval_secs, 3);

    let request = config.pair_request().unwrap();
    assert_eq!(request.symbol_a, "BTCUSDT");
    assert_eq!(request.threshold, 2.0);
}

/// Feed replaying a fixed tick list, standing in for a live socket
struct ReplayFeed {
    symbol: String,
    ticks: Vec<Tick>,
}

#[async_trait::async_trait]
impl TradeFeed for ReplayFeed {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<FeedEvent>> {
        let (tx, rx) = mpsc::channel(64);
        let ticks = self.ticks.clone();
        tokio::spawn(async move {
            let _ = tx.send(FeedEvent::Status(FeedStatus::Subscribed)).await;
            for tick in ticks {
                if tx.send(FeedEvent::Tick(tick)).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }
}

#[tokio::test]
async fn test_feed_to_store_to_alert() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ticks.db");
    let start = Utc.timestamp_opt(1_704_067_200, 0).unwrap();

    let mut a = Vec::new();
    let mut b = Vec::new();
    for i in 0..40 {
        let ts = start + Duration::seconds(i);
        let pb = 50.0 + (i as f64 * 0.7).sin();
        let noise = if i % 2 == 0 { 0.01 } else { -0.01 };
        let shock = if i == 39 { 5.0 } else { 0.0 };
        b.push(Tick::new("ETHUSDT", pb, 1.0, ts));
        a.push(Tick::new("BTCUSDT", 2.0 * pb + noise + shock, 1.0, ts));
    }

    let store = TickStore::open(&path).unwrap();
    let recorder = Arc::new(TickRecorder::new(store, RecorderConfig::default()));
    let listener = FeedListener::new(recorder.clone())
        .with_feed(ReplayFeed {
            symbol: "btcusdt".into(),
            ticks: a,
        })
        .with_feed(ReplayFeed {
            symbol: "ethusdt".into(),
            ticks: b,
        })
        .start()
        .await
        .unwrap();

    listener.join().await;
    let stats = recorder.shutdown().await;
    assert_eq!(stats.ticks_written, 80);

    let reader = TickStore::open_read_only(&path).unwrap();
    let request = PairRequest::new("btcusdt", "ethusdt", Interval::OneSecond, 10)
        .refit(RefitPolicy::Periodic { every: 20 });
    let mut watcher = Watcher::new(QueryService::new(reader), request, Duration::minutes(5));

    let now = start + Duration::seconds(40);
    let refresh = watcher.refresh(now).await.unwrap();
    assert_eq!(refresh.snapshot.observations.len(), 40);
    assert!(refresh.connectivity.is_live());

    let alert = refresh.new_alerts.last().unwrap();
    assert_eq!(alert.timestamp, start + Duration::seconds(39));
    assert_eq!(alert.direction, Direction::Up);
}

#[tokio::test]
async fn test_query_service_over_recorded_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ticks.db");
    let start = Utc.timestamp_opt(1_704_067_200, 0).unwrap();

    let store = TickStore::open(&path).unwrap();
    let recorder = TickRecorder::new(store, RecorderConfig::default());
    for i in 0..120 {
        let ts = start + Duration::seconds(i);
        recorder
            .record_tick(Tick::new("BTCUSDT", 40_000.0 + i as f64, 0.1, ts))
            .await
            .unwrap();
        recorder
            .record_tick(Tick::new("ETHUSDT", 2_000.0 + (i as f64).sqrt(), 1.0, ts))
            .await
            .unwrap();
    }
    recorder.shutdown().await;

    let service = QueryService::new(TickStore::open_read_only(&path).unwrap());
    let range = TimeRange::new(start, start + Duration::minutes(1));
    let bars = service.get_bars("BTCUSDT", &range, Interval::OneMinute).unwrap();
    assert_eq!(bars.len(), 1);
    assert_eq!(bars[0].trade_count, 60);
    assert_eq!(bars[0].close_price, 40_059.0);

    let observations = service
        .get_pair_observations("BTCUSDT", "ETHUSDT", &TimeRange::all(), Interval::OneSecond, 20)
        .unwrap();
    assert_eq!(observations.len(), 120);
    assert!(observations[18].correlation.is_none());
    assert!(observations[19].correlation.unwrap() > 0.9);
}
