//! Buffered tick writer in front of the store

use super::TickStore;
use crate::config::StoreConfig;
use crate::feed::{Tick, TickSink};
use crate::telemetry::{increment, increment_by, record_latency, CounterMetric, LatencyMetric};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;

/// Configuration for the recorder
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Ticks buffered before a flush
    pub buffer_size: usize,
    /// Maximum time between flushes
    pub flush_interval: Duration,
    /// Inbound channel capacity
    pub channel_capacity: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            buffer_size: 256,
            flush_interval: Duration::from_secs(1),
            channel_capacity: 10_000,
        }
    }
}

impl From<&StoreConfig> for RecorderConfig {
    fn from(config: &StoreConfig) -> Self {
        Self {
            buffer_size: config.buffer_size.max(1),
            flush_interval: Duration::from_millis(config.flush_interval_ms.max(1)),
            ..Default::default()
        }
    }
}

/// Recording statistics
#[derive(Debug, Default, Clone)]
pub struct RecorderStats {
    pub ticks_received: u64,
    pub ticks_written: u64,
    pub flushes: u64,
    pub failed_flushes: u64,
    /// Ticks lost to failed flushes
    pub ticks_dropped: u64,
    pub last_flush: Option<chrono::DateTime<Utc>>,
}

/// Sole writer of the tick store
///
/// Ticks are buffered and appended in one transaction per flush. A flush
/// happens when the buffer fills, when the flush interval elapses, and on
/// [`TickRecorder::shutdown`].
pub struct TickRecorder {
    tx: mpsc::Sender<Tick>,
    stats: Arc<RwLock<RecorderStats>>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TickRecorder {
    /// Spawn the writer task. Must be called inside a Tokio runtime.
    pub fn new(store: TickStore, config: RecorderConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let stats = Arc::new(RwLock::new(RecorderStats::default()));

        let writer_stats = stats.clone();
        let task = tokio::spawn(async move {
            Self::run_writer(rx, shutdown_rx, store, config, writer_stats).await;
        });

        Self {
            tx,
            stats,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            task: Mutex::new(Some(task)),
        }
    }

    async fn run_writer(
        mut rx: mpsc::Receiver<Tick>,
        mut shutdown_rx: oneshot::Receiver<()>,
        store: TickStore,
        config: RecorderConfig,
        stats: Arc<RwLock<RecorderStats>>,
    ) {
        let mut buffer: Vec<Tick> = Vec::with_capacity(config.buffer_size);
        let mut ticker = tokio::time::interval(config.flush_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Some(tick) => {
                            stats.write().await.ticks_received += 1;
                            buffer.push(tick);

                            if buffer.len() >= config.buffer_size {
                                Self::flush(&mut buffer, &store, &stats).await;
                                ticker.reset();
                            }
                        }
                        None => {
                            // Every sender dropped
                            Self::flush(&mut buffer, &store, &stats).await;
                            break;
                        }
                    }
                }

                _ = ticker.tick() => {
                    Self::flush(&mut buffer, &store, &stats).await;
                }

                _ = &mut shutdown_rx => {
                    rx.close();
                    while let Some(tick) = rx.recv().await {
                        stats.write().await.ticks_received += 1;
                        buffer.push(tick);
                    }
                    Self::flush(&mut buffer, &store, &stats).await;
                    break;
                }
            }
        }

        tracing::info!("Tick recorder shutting down");
    }

    /// Append the buffer to the store on the blocking pool
    async fn flush(buffer: &mut Vec<Tick>, store: &TickStore, stats: &Arc<RwLock<RecorderStats>>) {
        if buffer.is_empty() {
            return;
        }

        let batch = std::mem::take(buffer);
        let count = batch.len();
        let mut per_symbol: BTreeMap<String, u64> = BTreeMap::new();
        for tick in &batch {
            *per_symbol.entry(tick.symbol.clone()).or_default() += 1;
        }

        let started = Instant::now();
        let store = store.clone();
        let result = tokio::task::spawn_blocking(move || store.append(&batch)).await;
        record_latency(LatencyMetric::StoreFlush, started.elapsed());

        let mut s = stats.write().await;
        match result {
            Ok(Ok(written)) => {
                s.ticks_written += written as u64;
                s.flushes += 1;
                s.last_flush = Some(Utc::now());
                for (symbol, n) in &per_symbol {
                    increment_by(CounterMetric::TicksWritten, symbol, *n);
                }
                tracing::debug!(count, "Flushed ticks");
            }
            Ok(Err(e)) => {
                s.failed_flushes += 1;
                s.ticks_dropped += count as u64;
                for symbol in per_symbol.keys() {
                    increment(CounterMetric::StoreWriteFailures, symbol);
                }
                tracing::error!(error = %e, count, "Failed to append ticks");
            }
            Err(e) => {
                s.failed_flushes += 1;
                s.ticks_dropped += count as u64;
                tracing::error!(error = %e, count, "Tick flush task panicked");
            }
        }
    }

    /// Queue a tick for writing
    pub async fn record_tick(&self, tick: Tick) -> anyhow::Result<()> {
        self.tx
            .send(tick)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to queue tick: {}", e))?;
        Ok(())
    }

    /// Current statistics
    pub async fn stats(&self) -> RecorderStats {
        self.stats.read().await.clone()
    }

    /// Flush everything still buffered and stop the writer task
    ///
    /// Ticks recorded afterwards are rejected.
    pub async fn shutdown(&self) -> RecorderStats {
        if let Some(tx) = self.shutdown_tx.lock().await.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Tick recorder task failed");
            }
        }
        self.stats().await
    }
}

#[async_trait]
impl TickSink for TickRecorder {
    async fn record(&self, tick: Tick) -> anyhow::Result<()> {
        self.record_tick(tick).await
    }
}
