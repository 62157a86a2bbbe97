//! Status command implementation

use crate::config::Config;
use crate::feed::ConnectivityStatus;
use crate::store::TickStore;
use chrono::Utc;

/// Print per-symbol tick counts and connectivity derived from the store
pub fn print_status(config: &Config) -> anyhow::Result<()> {
    let path = &config.store.path;
    println!("pairwatch status");
    println!("  Store: {}", path.display());

    if !path.exists() {
        println!("  Connectivity: {}", ConnectivityStatus::NoData);
        return Ok(());
    }

    let store = TickStore::open_read_only(path)?;
    let now = Utc::now();

    for symbol in &config.feed.symbols {
        let count = store.count(symbol)?;
        let last = store.latest_timestamp(&[symbol.as_str()])?;
        let last = last
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        println!("  {:<10} ticks={:<10} last={}", symbol.to_uppercase(), count, last);
    }

    let others: Vec<String> = store
        .symbols()?
        .into_iter()
        .filter(|s| !config.feed.symbols.iter().any(|c| c.eq_ignore_ascii_case(s)))
        .collect();
    if !others.is_empty() {
        println!("  Other symbols: {}", others.join(", "));
    }

    let symbols: Vec<&str> = config.feed.symbols.iter().map(String::as_str).collect();
    let status = ConnectivityStatus::classify(store.latest_timestamp(&symbols)?, now);
    println!("  Connectivity: {}", status);

    Ok(())
}
