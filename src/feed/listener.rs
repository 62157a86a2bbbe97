//! Feed listener: subscriptions → tick sink

use super::health::FeedHealth;
use super::types::{FeedEvent, FeedStatus};
use super::{TickSink, TradeFeed};
use crate::telemetry::{increment, CounterMetric};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

/// Runs one task per subscribed feed and forwards every tick to the sink
pub struct FeedListener {
    feeds: Vec<Box<dyn TradeFeed>>,
    sink: Arc<dyn TickSink>,
    health: Arc<RwLock<FeedHealth>>,
}

impl FeedListener {
    pub fn new(sink: Arc<dyn TickSink>) -> Self {
        Self {
            feeds: Vec::new(),
            sink,
            health: Arc::new(RwLock::new(FeedHealth::default())),
        }
    }

    /// Add a subscription
    pub fn with_feed(mut self, feed: impl TradeFeed + 'static) -> Self {
        self.feeds.push(Box::new(feed));
        self
    }

    /// Subscribe every feed and spawn the forwarding tasks
    pub async fn start(self) -> anyhow::Result<ListenerHandle> {
        let mut tasks = Vec::with_capacity(self.feeds.len());

        for feed in &self.feeds {
            let symbol = feed.symbol().to_string();
            self.health.write().await.register(&symbol);

            let rx = feed.subscribe().await?;
            let sink = self.sink.clone();
            let health = self.health.clone();
            tasks.push(tokio::spawn(async move {
                Self::run_feed(symbol, rx, sink, health).await;
            }));
        }

        tracing::info!(feeds = tasks.len(), "Feed listener started");

        Ok(ListenerHandle {
            tasks,
            health: self.health,
        })
    }

    async fn run_feed(
        symbol: String,
        mut rx: mpsc::Receiver<FeedEvent>,
        sink: Arc<dyn TickSink>,
        health: Arc<RwLock<FeedHealth>>,
    ) {
        while let Some(event) = rx.recv().await {
            match event {
                FeedEvent::Tick(tick) => {
                    health.write().await.record_tick(&symbol, tick.timestamp);
                    increment(CounterMetric::TicksReceived, &symbol);
                    if let Err(e) = sink.record(tick).await {
                        tracing::error!(symbol = %symbol, error = %e, "Tick sink rejected tick, stopping feed");
                        break;
                    }
                }
                FeedEvent::Status(status) => {
                    if status == FeedStatus::Disconnected {
                        increment(CounterMetric::Disconnects, &symbol);
                    }
                    health.write().await.set_status(&symbol, status);
                }
                FeedEvent::Rejected(_) => {
                    increment(CounterMetric::ParseErrors, &symbol);
                    health.write().await.record_parse_error(&symbol);
                }
            }
        }

        tracing::info!(symbol = %symbol, "Feed task finished");
    }
}

/// Handle over running listener tasks
pub struct ListenerHandle {
    tasks: Vec<JoinHandle<()>>,
    health: Arc<RwLock<FeedHealth>>,
}

impl ListenerHandle {
    /// Current health snapshot
    pub async fn health(&self) -> FeedHealth {
        self.health.read().await.clone()
    }

    /// Wait until every feed task ends on its own
    pub async fn join(self) {
        for task in self.tasks {
            let _ = task.await;
        }
    }

    /// Stop all feed tasks
    ///
    /// Dropping the event receivers also stops the underlying socket tasks.
    pub async fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
        for task in self.tasks {
            let _ = task.await;
        }
        tracing::info!("Feed listener stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{ParseError, Tick};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    struct ScriptedFeed {
        symbol: String,
        events: Vec<FeedEvent>,
    }

    #[async_trait]
    impl TradeFeed for ScriptedFeed {
        fn symbol(&self) -> &str {
            &self.symbol
        }

        async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<FeedEvent>> {
            let (tx, rx) = mpsc::channel(16);
            for event in self.events.clone() {
                tx.send(event).await?;
            }
            Ok(rx)
        }
    }

    #[derive(Default)]
    struct VecSink {
        ticks: Mutex<Vec<Tick>>,
    }

    #[async_trait]
    impl TickSink for VecSink {
        async fn record(&self, tick: Tick) -> anyhow::Result<()> {
            self.ticks.lock().unwrap().push(tick);
            Ok(())
        }
    }

    fn tick(symbol: &str, price: f64) -> Tick {
        Tick::new(symbol, price, 1.0, Utc::now())
    }

    #[tokio::test]
    async fn test_listener_forwards_ticks_and_tracks_health() {
        let sink = Arc::new(VecSink::default());
        let btc = ScriptedFeed {
            symbol: "btcusdt".to_string(),
            events: vec![
                FeedEvent::Status(FeedStatus::Subscribed),
                FeedEvent::Tick(tick("BTCUSDT", 100.0)),
                FeedEvent::Rejected(ParseError::MissingField("p")),
                FeedEvent::Status(FeedStatus::Disconnected),
                FeedEvent::Status(FeedStatus::Subscribed),
                FeedEvent::Tick(tick("BTCUSDT", 101.0)),
            ],
        };
        let eth = ScriptedFeed {
            symbol: "ethusdt".to_string(),
            events: vec![
                FeedEvent::Status(FeedStatus::Subscribed),
                FeedEvent::Tick(tick("ETHUSDT", 50.0)),
            ],
        };

        let handle = FeedListener::new(sink.clone())
            .with_feed(btc)
            .with_feed(eth)
            .start()
            .await
            .unwrap();

        let health_rx = handle.health.clone();
        handle.join().await;

        assert_eq!(sink.ticks.lock().unwrap().len(), 3);

        let health = health_rx.read().await;
        let btc = health.get("BTCUSDT").unwrap();
        assert_eq!(btc.ticks_received, 2);
        assert_eq!(btc.parse_errors, 1);
        assert_eq!(btc.reconnects, 1);
        assert_eq!(btc.status, FeedStatus::Subscribed);
        assert_eq!(health.overall(), FeedStatus::Subscribed);
    }

    struct FailingSink;

    #[async_trait]
    impl TickSink for FailingSink {
        async fn record(&self, _tick: Tick) -> anyhow::Result<()> {
            anyhow::bail!("store closed")
        }
    }

    #[tokio::test]
    async fn test_listener_stops_feed_when_sink_fails() {
        let feed = ScriptedFeed {
            symbol: "btcusdt".to_string(),
            events: vec![
                FeedEvent::Tick(tick("BTCUSDT", 100.0)),
                FeedEvent::Tick(tick("BTCUSDT", 101.0)),
            ],
        };

        let handle = FeedListener::new(Arc::new(FailingSink))
            .with_feed(feed)
            .start()
            .await
            .unwrap();
        let health_rx = handle.health.clone();
        handle.join().await;

        assert_eq!(health_rx.read().await.get("BTCUSDT").unwrap().ticks_received, 1);
    }
}
