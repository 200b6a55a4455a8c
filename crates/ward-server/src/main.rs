//! # Ward Relay
//!
//! Fan-out relay between bed simulators and dashboards.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! ward-relay
//!
//! # Run with custom config
//! ward-relay --config /path/to/ward.toml
//!
//! # Run with environment variables
//! WARD_PORT=8080 WARD_HOST=0.0.0.0 ward-relay
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ward_server::{config::Config, handlers, metrics};

#[derive(Debug, Parser)]
#[command(name = "ward-relay", version, about = "Wardwatch seriousness relay")]
struct Args {
    /// Path to a TOML config file.
    #[arg(short, long, env = "WARD_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ward_server=debug,ward_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    tracing::info!("Starting Ward relay on {}:{}", config.host, config.port);

    metrics::init_metrics();

    handlers::run_server(config).await?;

    Ok(())
}
