use anyhow::{Context, Result};
use clap::Parser;
use electric_usage::config::{load_app_config, LogLevel};
use electric_usage::report::UsageReport;
use electric_usage::schedule::Poller;
use electric_usage::util::logging;
use log::{error, info};
use std::path::PathBuf;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "electric-usage", version, about = "Poll a utility portal for electric usage")]
struct Args {
    /// Path to a configuration file (toml, json or yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single refresh, print the report and exit
    #[arg(long)]
    once: bool,

    /// Override the configured log level
    #[arg(short, long, value_enum)]
    log_level: Option<LogLevel>,
}

fn print_report(report: &UsageReport) -> Result<()> {
    println!("{}", serde_json::to_string(report)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_app_config(args.config.as_deref()).context("failed to load configuration")?;
    logging::init(&args.log_level.unwrap_or(config.log_level));

    info!(
        "Starting {} v{} for {}",
        config.name,
        electric_usage::VERSION,
        config.usage_url
    );

    let collector = electric_usage::build_collector(&config).context("failed to build collector")?;

    // Initial refresh before the first report goes out.
    let initial = collector.refresh().await;
    print_report(&UsageReport::from_state(collector.name(), &collector.current()))?;

    if args.once {
        return initial.map(|_| ()).context("initial refresh failed");
    }
    if let Err(e) = &initial {
        error!("Initial refresh failed, continuing on schedule: {}", e);
    }

    let poller = Poller::spawn(collector.clone(), config.interval());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutting down");

    poller.stop().await;
    print_report(&UsageReport::from_state(collector.name(), &collector.current()))?;

    Ok(())
}
