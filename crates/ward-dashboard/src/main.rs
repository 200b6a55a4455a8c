//! # Ward Dashboard
//!
//! Listens for `dashboard_update` frames and rings the terminal bell when a
//! bed enters an emergency. Type `enable` to arm alerts and `status` to
//! print the board.

use anyhow::{Context, Result};
use clap::Parser;
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ward_dashboard::{AlarmSink, Dashboard, Roster, TerminalBell, DEFAULT_BEDS};
use ward_transport::{LinkConfig, LinkHandle, RelayClient, WireFormat};

#[derive(Debug, Parser)]
#[command(name = "ward-dashboard", version, about = "Wardwatch monitoring dashboard")]
struct Args {
    /// Relay WebSocket URL.
    #[arg(long, env = "WARD_RELAY_URL", default_value = "ws://127.0.0.1:8080/")]
    relay: String,

    /// Number of beds on the roster.
    #[arg(long, default_value_t = DEFAULT_BEDS)]
    beds: u32,

    /// Wire format: json or msgpack.
    #[arg(long, default_value = "json")]
    format: WireFormat,

    /// Arm alerts at startup instead of waiting for `enable`.
    #[arg(long)]
    enable_alerts: bool,

    /// Delay before reconnecting to the relay, in milliseconds.
    #[arg(long, default_value_t = 2_000)]
    reconnect_ms: u64,
}

async fn connect(client: &RelayClient, retry: Duration) -> LinkHandle {
    loop {
        match client.acquire().await {
            Ok(link) => return link,
            Err(e) => {
                warn!(error = %e, "Relay unavailable, retrying");
                tokio::time::sleep(retry).await;
            }
        }
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

/// Service the relay link and operator commands until `quit` or `shutdown`.
///
/// The link is reconnected whenever it drops. End of `input` only stops
/// command handling; alarms keep sounding.
async fn run<S, R>(
    board: &mut Dashboard<S>,
    client: &RelayClient,
    retry: Duration,
    input: R,
    shutdown: impl Future<Output = ()>,
) -> Result<()>
where
    S: AlarmSink,
    R: AsyncBufRead + Unpin,
{
    let mut link = connect(client, retry).await;
    info!(relay = %client.config().url, "Dashboard connected");
    print!("{}", board.render());

    tokio::pin!(shutdown);
    let mut lines = input.lines();
    let mut input_open = true;

    loop {
        tokio::select! {
            frame = link.recv() => match frame {
                Ok(frame) => {
                    if let Some(transition) = board.apply(&frame) {
                        println!(
                            "bed {:<5} {:<10} {:?}{}",
                            transition.bed_id.as_str(),
                            transition.status.as_str(),
                            transition.indicator,
                            if transition.alarm { "  ALARM" } else { "" }
                        );
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Relay link lost, reconnecting");
                    drop(link);
                    link = connect(client, retry).await;
                    info!("Relay link restored");
                }
            },

            line = lines.next_line(), if input_open => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    info!("stdin closed, still monitoring");
                    input_open = false;
                    continue;
                };
                match line.trim() {
                    "" => {}
                    "enable" => {
                        if board.enable_alerts() {
                            println!("alerts enabled");
                        } else {
                            println!("alerts already enabled");
                        }
                    }
                    "status" => print!("{}", board.render()),
                    "quit" | "exit" => break,
                    other => println!("unknown command `{other}`; use enable, status or quit"),
                }
            }

            () = &mut shutdown => break,
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ward_dashboard=info,ward_core=info,ward_transport=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut board = Dashboard::new(Roster::generate(args.beds), TerminalBell);
    if args.enable_alerts {
        board.enable_alerts();
    }

    let client = RelayClient::new(LinkConfig::new(&args.relay).with_format(args.format));
    let stdin = BufReader::new(tokio::io::stdin());
    run(
        &mut board,
        &client,
        Duration::from_millis(args.reconnect_ms),
        stdin,
        shutdown_signal(),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::net::TcpListener;
    use tokio::sync::{mpsc, oneshot};
    use tokio::time::{sleep, timeout};
    use ward_core::{BedId, Seriousness, SeriousnessUpdate};
    use ward_server::{AppState, Config};

    /// Forwards alarms to the test body.
    struct ChannelSink(mpsc::UnboundedSender<BedId>);

    impl AlarmSink for ChannelSink {
        fn sound(&mut self, bed_id: &BedId) {
            let _ = self.0.send(bed_id.clone());
        }
    }

    async fn relay() -> (String, Arc<AppState>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/", listener.local_addr().unwrap());
        let state = Arc::new(AppState::new(Config::default()));
        tokio::spawn(ward_server::serve(listener, Arc::clone(&state)));
        (url, state)
    }

    async fn wait_for_subscribers(state: &AppState, count: usize) {
        timeout(Duration::from_secs(5), async {
            while state.hub.registry().len() != count {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("subscriber count never reached");
    }

    fn spawn_dashboard(
        url: &str,
        input: &'static [u8],
    ) -> (
        mpsc::UnboundedReceiver<BedId>,
        oneshot::Sender<()>,
        tokio::task::JoinHandle<Result<()>>,
    ) {
        let (alarms_tx, alarms) = mpsc::unbounded_channel();
        let (stop, stopped) = oneshot::channel::<()>();
        let client = RelayClient::new(LinkConfig::new(url));

        let task = tokio::spawn(async move {
            let mut board = Dashboard::new(Roster::generate(DEFAULT_BEDS), ChannelSink(alarms_tx));
            board.enable_alerts();
            let shutdown = async {
                let _ = stopped.await;
            };
            run(&mut board, &client, Duration::from_millis(50), input, shutdown).await
        });
        (alarms, stop, task)
    }

    #[tokio::test]
    async fn test_keeps_alarming_after_stdin_closes() {
        let (url, state) = relay().await;
        let (mut alarms, stop, task) = spawn_dashboard(&url, b"");
        wait_for_subscribers(&state, 1).await;

        let producer = RelayClient::new(LinkConfig::new(&url)).acquire().await.unwrap();
        wait_for_subscribers(&state, 2).await;
        let update = SeriousnessUpdate::new(BedId::from("3"), Seriousness::EMERGENCY);
        producer.send(update.to_frame()).await.unwrap();

        let bed = timeout(Duration::from_secs(5), alarms.recv())
            .await
            .expect("no alarm after stdin closed")
            .unwrap();
        assert_eq!(bed, BedId::from("3"));
        assert!(!task.is_finished());

        stop.send(()).unwrap();
        timeout(Duration::from_secs(5), task).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_quit_command_stops() {
        let (url, _state) = relay().await;
        let (_alarms, _stop, task) = spawn_dashboard(&url, b"status\nquit\n");
        timeout(Duration::from_secs(5), task).await.unwrap().unwrap().unwrap();
    }
}
