//! Device catalog CLI
//!
//! Command-line interface for the device catalog synchronization service.

use std::path::PathBuf;

use clap::Parser;
use device_catalog::{load_config, Config};
use tracing::Level;

#[derive(Parser)]
#[command(name = "device-catalog")]
#[command(about = "Device catalog synchronization service for the telemetry dashboard")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Registry base URL (overrides config file)
    #[arg(long)]
    registry_url: Option<String>,

    /// Dashboard port (overrides config file)
    #[arg(long)]
    dashboard_port: Option<u16>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    tracing::debug!(
        "Parsed command line arguments: config={:?}, registry_url={:?}, dashboard_port={:?}, log_level={:?}",
        args.config,
        args.registry_url,
        args.dashboard_port,
        args.log_level
    );

    let mut config = if let Some(config_path) = &args.config {
        tracing::debug!("Loading configuration from {:?}", config_path);
        load_config(config_path)?
    } else {
        tracing::debug!("Using default configuration");
        Config::default()
    };

    if let Some(registry_url) = args.registry_url {
        config.registry.base_url = registry_url;
    }
    if let Some(dashboard_port) = args.dashboard_port {
        config.dashboard.port = dashboard_port;
    }

    tracing::info!(
        "Starting device catalog service against {}",
        config.registry.devices_url()
    );

    device_catalog::run(config).await?;

    Ok(())
}
