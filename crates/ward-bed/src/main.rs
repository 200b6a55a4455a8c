//! # Ward Bed
//!
//! Bed simulator driven from stdin.
//!
//! ```bash
//! ward-bed --bed 3 --relay ws://127.0.0.1:8080/ --classifier http://127.0.0.1:5000/predict
//! > HR 170
//! > temp 103.5
//! > show
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ward_bed::{BedSimulator, Dial, HttpClassifier};
use ward_core::BedId;
use ward_transport::{LinkConfig, RelayClient, WireFormat};

#[derive(Debug, Parser)]
#[command(name = "ward-bed", version, about = "Simulated patient bed")]
struct Args {
    /// Bed identifier reported with every update.
    #[arg(short, long)]
    bed: String,

    /// Relay WebSocket URL.
    #[arg(long, env = "WARD_RELAY_URL", default_value = "ws://127.0.0.1:8080/")]
    relay: String,

    /// Classification endpoint.
    #[arg(long, env = "WARD_CLASSIFIER_URL", default_value = "http://127.0.0.1:5000/predict")]
    classifier: String,

    /// Classifier request timeout in milliseconds.
    #[arg(long, default_value_t = 10_000)]
    classifier_timeout_ms: u64,

    /// Quiet period before dial changes are submitted, in milliseconds.
    #[arg(long, default_value_t = 500)]
    debounce_ms: u64,

    /// Wire format: json or msgpack.
    #[arg(long, default_value = "json")]
    format: WireFormat,
}

#[derive(Debug, PartialEq)]
enum Command {
    Set(Dial, f64),
    Show,
    Quit,
}

fn parse_command(line: &str) -> Result<Command, String> {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some("show"), None, _) => Ok(Command::Show),
        (Some("quit" | "exit"), None, _) => Ok(Command::Quit),
        (Some(dial), Some(value), None) => {
            let dial: Dial = dial.parse()?;
            let value: f64 = value
                .parse()
                .map_err(|_| format!("not a number: {value}"))?;
            Ok(Command::Set(dial, value))
        }
        _ => Err("expected `<DIAL> <value>`, `show` or `quit`".to_string()),
    }
}

/// Resolves on ctrl-c.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ward_bed=info,ward_transport=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let classifier = HttpClassifier::new(
        &args.classifier,
        Duration::from_millis(args.classifier_timeout_ms),
    )
    .context("Failed to build classifier client")?;

    let client = RelayClient::new(LinkConfig::new(&args.relay).with_format(args.format));
    let mut bed = BedSimulator::new(BedId::new(args.bed), Arc::new(classifier), client)
        .with_window(Duration::from_millis(args.debounce_ms));
    bed.uplink()
        .connect()
        .await
        .with_context(|| format!("Failed to connect to relay at {}", args.relay))?;

    info!(bed = %bed.bed_id(), "Bed simulator ready: {}", bed.vitals());
    // Report the starting vitals once
    bed.schedule();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    info!("stdin closed, running until interrupted");
                    stdin_open = false;
                    continue;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match parse_command(line) {
                    Ok(Command::Set(dial, value)) => match bed.adjust(dial, value) {
                        Some(applied) => println!("{} = {}", dial.label(), applied),
                        None => println!("ignored non-finite value for {dial}"),
                    },
                    Ok(Command::Show) => {
                        let relay = if bed.uplink().is_open().await { "up" } else { "down" };
                        println!("{} (relay {relay})", bed.vitals());
                    }
                    Ok(Command::Quit) => break,
                    Err(e) => println!("{e}"),
                }
            }

            () = &mut shutdown => break,
        }
    }

    bed.settle().await;
    Ok(())
}
