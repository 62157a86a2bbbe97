//! Run command implementation

use super::{Ingest, Watcher};
use crate::config::Config;
use crate::store::TickStore;
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Database file (overrides [store] path)
    #[arg(long)]
    pub db: Option<PathBuf>,
}

impl RunArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let request = config.pair_request()?;
        let path = self.db.clone().unwrap_or_else(|| config.store.path.clone());

        // Opening the writer first creates the database for the reader
        let ingest = Ingest::start(config, path.clone()).await?;
        let reader = TickStore::open_read_only(&path)?;
        let mut watcher = Watcher::from_config(config, reader)?;

        tracing::info!(
            symbol_a = %request.symbol_a,
            symbol_b = %request.symbol_b,
            interval = %request.interval,
            window = request.window,
            threshold = request.threshold,
            "Watching pair"
        );

        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            }
        };
        watcher
            .run_until(
                Duration::from_secs(config.refresh.interval_secs.max(1)),
                shutdown,
                Some(&ingest),
            )
            .await;

        ingest.stop().await;
        Ok(())
    }
}
