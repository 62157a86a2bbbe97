use clap::Parser;
use pairwatch::cli::{print_status, Cli, Commands};
use pairwatch::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
        eprintln!("Using default configuration");
        Config::default()
    });
    cli.apply_overrides(&mut config)?;

    // Initialize telemetry
    pairwatch::telemetry::init_telemetry(&config.telemetry)?;

    match &cli.command {
        Commands::Run(args) => {
            tracing::info!("Starting ingest and watch");
            args.execute(&config).await?;
        }
        Commands::Ingest(args) => {
            tracing::info!("Starting ingest");
            args.execute(&config).await?;
        }
        Commands::Watch(args) => {
            tracing::info!("Starting watch");
            args.execute(&config).await?;
        }
        Commands::Analyze(args) => {
            args.execute(&config).await?;
        }
        Commands::Status => {
            print_status(&config)?;
        }
        Commands::Config => {
            let request = config.pair_request()?;
            println!("Current configuration:");
            println!(
                "  Feed: {} {} / {}",
                config.feed.base_url, request.symbol_a, request.symbol_b
            );
            println!(
                "  Analytics: interval={} window={} threshold={} refit={:?}",
                request.interval, request.window, request.threshold, request.refit
            );
            println!(
                "  Store: {} (buffer {}, flush every {}ms)",
                config.store.path.display(),
                config.store.buffer_size,
                config.store.flush_interval_ms
            );
            println!(
                "  Refresh: every {}s over {}",
                config.refresh.interval_secs,
                config.refresh.lookback(&config.analytics)
            );
        }
    }

    Ok(())
}
