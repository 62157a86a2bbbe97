//! CLI interface for pairwatch
//!
//! Provides subcommands for:
//! - `run`: Ingest and watch in one process
//! - `ingest`: Record trade ticks to the store
//! - `watch`: Periodically recompute pair statistics from the store
//! - `analyze`: One-off summary and CSV/Parquet export
//! - `status`: Show store contents and connectivity
//! - `config`: Show the effective configuration

mod analyze;
mod ingest;
mod run;
mod status;
mod watch;

pub use analyze::AnalyzeArgs;
pub use ingest::{Ingest, IngestArgs};
pub use run::RunArgs;
pub use status::print_status;
pub use watch::{Refresh, WatchArgs, Watcher};

use crate::analytics::Interval;
use crate::config::Config;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "pairwatch")]
#[command(about = "Live pair-trading statistics from Binance trade streams")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,

    /// Pair to track, leg A first (e.g. btcusdt,ethusdt)
    #[arg(long, global = true, value_delimiter = ',')]
    pub symbols: Option<Vec<String>>,

    /// Bar interval: 1s, 1m or 5m
    #[arg(long, global = true)]
    pub interval: Option<Interval>,

    /// Rolling window in bars
    #[arg(long, global = true)]
    pub window: Option<usize>,

    /// Absolute z-score alert threshold
    #[arg(long, global = true)]
    pub threshold: Option<f64>,
}

impl Cli {
    /// Apply command-line overrides on top of the file configuration
    pub fn apply_overrides(&self, config: &mut Config) -> anyhow::Result<()> {
        if let Some(symbols) = &self.symbols {
            match symbols.as_slice() {
                [a, b] => config.feed.symbols = [a.clone(), b.clone()],
                _ => anyhow::bail!(
                    "--symbols takes exactly two symbols, got {}",
                    symbols.len()
                ),
            }
        }
        if let Some(interval) = self.interval {
            config.analytics.interval = interval;
        }
        if let Some(window) = self.window {
            config.analytics.window = window;
        }
        if let Some(threshold) = self.threshold {
            config.analytics.z_threshold = threshold;
        }
        Ok(())
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest and watch in one process
    Run(RunArgs),
    /// Record trade ticks only
    Ingest(IngestArgs),
    /// Recompute statistics from the store on a timer
    Watch(WatchArgs),
    /// Summarize stored data and optionally export observations
    Analyze(AnalyzeArgs),
    /// Show store contents and connectivity
    Status,
    /// Show the effective configuration
    Config,
}
