//! Analyze command implementation

use crate::analytics::{Direction, PairObservation};
use crate::config::Config;
use crate::export::{write_csv_file, write_parquet};
use crate::pipeline::{PairRequest, QueryService, Snapshot, TimeRange};
use crate::store::TickStore;
use chrono::{DateTime, Utc};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Database file (overrides [store] path)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Start time filter (RFC 3339, inclusive)
    #[arg(long)]
    pub start: Option<String>,

    /// End time filter (RFC 3339, exclusive)
    #[arg(long)]
    pub end: Option<String>,

    /// Write observations to this CSV file
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Write observations to this Parquet file
    #[arg(long)]
    pub parquet: Option<PathBuf>,

    /// Trailing observations shown in the table
    #[arg(long, default_value = "10")]
    pub rows: usize,
}

impl AnalyzeArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let request = config.pair_request()?;
        let range = self.range()?;
        let path = self.db.clone().unwrap_or_else(|| config.store.path.clone());

        let service = QueryService::new(TickStore::open_read_only(&path)?);
        let query = request.clone();
        let snapshot =
            tokio::task::spawn_blocking(move || service.snapshot(&query, &range)).await??;

        print!("{}", render_summary(&request, &snapshot, self.rows));

        if let Some(csv) = &self.csv {
            write_csv_file(csv, &snapshot.observations)?;
            println!("Wrote {} observations to {}", snapshot.observations.len(), csv.display());
        }
        if let Some(parquet) = &self.parquet {
            write_parquet(parquet, &snapshot.observations)?;
            println!(
                "Wrote {} observations to {}",
                snapshot.observations.len(),
                parquet.display()
            );
        }

        Ok(())
    }

    fn range(&self) -> anyhow::Result<TimeRange> {
        let mut range = TimeRange::all();
        if let Some(start) = &self.start {
            range.start = parse_time(start)?;
        }
        if let Some(end) = &self.end {
            range.end = parse_time(end)?;
        }
        if range.start >= range.end {
            anyhow::bail!("--start must be before --end");
        }
        Ok(range)
    }
}

fn parse_time(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let ts = DateTime::parse_from_rfc3339(s)
        .map_err(|e| anyhow::anyhow!("Invalid timestamp '{}': {}", s, e))?;
    Ok(ts.with_timezone(&Utc))
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", precision, v),
        None => "-".to_string(),
    }
}

fn row(o: &PairObservation) -> String {
    format!(
        "  {:<25} {:>14.4} {:>14.4} {:>10} {:>12} {:>8} {:>8}\n",
        o.interval_start.to_rfc3339(),
        o.price_a,
        o.price_b,
        fmt_opt(o.hedge_ratio, 4),
        fmt_opt(o.spread, 4),
        fmt_opt(o.z_score, 2),
        fmt_opt(o.correlation, 3),
    )
}

/// Text summary of one snapshot
pub fn render_summary(request: &PairRequest, snapshot: &Snapshot, rows: usize) -> String {
    let mut out = String::new();
    let defined = snapshot
        .observations
        .iter()
        .filter(|o| o.z_score.is_some())
        .count();
    let up = snapshot
        .alerts
        .iter()
        .filter(|a| a.direction == Direction::Up)
        .count();

    out.push_str(&format!(
        "Pair {} / {}  interval={} window={} threshold={}\n",
        request.symbol_a, request.symbol_b, request.interval, request.window, request.threshold
    ));
    out.push_str(&format!(
        "  Bars: {} / {}  aligned={}  with z-score={}\n",
        snapshot.bars_a.len(),
        snapshot.bars_b.len(),
        snapshot.observations.len(),
        defined
    ));
    out.push_str(&format!(
        "  Alerts: {} (up {}, down {})\n",
        snapshot.alerts.len(),
        up,
        snapshot.alerts.len() - up
    ));

    if snapshot.observations.is_empty() {
        out.push_str("  No aligned bars in range\n");
        return out;
    }

    out.push_str(&format!(
        "  {:<25} {:>14} {:>14} {:>10} {:>12} {:>8} {:>8}\n",
        "interval_start", "price_a", "price_b", "beta", "spread", "z", "corr"
    ));
    let skip = snapshot.observations.len().saturating_sub(rows);
    for o in &snapshot.observations[skip..] {
        out.push_str(&row(o));
    }

    if let Some(alert) = snapshot.alerts.last() {
        out.push_str(&format!(
            "  Last alert: {} z={:.2} {}\n",
            alert.timestamp.to_rfc3339(),
            alert.z_score,
            alert.direction
        ));
    }

    out
}
