//! Ingest command implementation

use crate::config::Config;
use crate::feed::{BinanceFeed, FeedHealth, FeedListener, ListenerHandle};
use crate::store::{RecorderConfig, RecorderStats, TickRecorder, TickStore};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Database file (overrides [store] path)
    #[arg(long)]
    pub db: Option<PathBuf>,
}

impl IngestArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let path = self.db.clone().unwrap_or_else(|| config.store.path.clone());
        let ingest = Ingest::start(config, path).await?;

        tokio::signal::ctrl_c().await?;
        tracing::info!("Ctrl-C received, stopping ingest");

        ingest.stop().await;
        Ok(())
    }
}

/// Running feed listener plus recorder
pub struct Ingest {
    listener: ListenerHandle,
    recorder: Arc<TickRecorder>,
}

impl Ingest {
    /// Open the store and subscribe to both legs
    pub async fn start(config: &Config, path: PathBuf) -> anyhow::Result<Self> {
        let store = TickStore::open(&path)?;
        let recorder = Arc::new(TickRecorder::new(
            store,
            RecorderConfig::from(&config.store),
        ));

        let mut listener = FeedListener::new(recorder.clone());
        for symbol in &config.feed.symbols {
            listener = listener.with_feed(BinanceFeed::with_config(
                symbol.as_str(),
                &config.feed.base_url,
                config.feed.ws_config(),
            ));
        }
        let listener = listener.start().await?;

        tracing::info!(
            path = %path.display(),
            symbols = ?config.feed.symbols,
            "Ingest started"
        );

        Ok(Self { listener, recorder })
    }

    pub async fn health(&self) -> FeedHealth {
        self.listener.health().await
    }

    pub async fn recorder_stats(&self) -> RecorderStats {
        self.recorder.stats().await
    }

    /// Stop the feeds, then flush whatever the recorder still holds
    pub async fn stop(self) -> RecorderStats {
        self.listener.shutdown().await;
        let stats = self.recorder.shutdown().await;
        tracing::info!(
            received = stats.ticks_received,
            written = stats.ticks_written,
            dropped = stats.ticks_dropped,
            "Ingest stopped"
        );
        stats
    }
}
