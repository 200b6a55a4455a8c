//! Connection handlers for the relay.
//!
//! Every WebSocket is a subscriber. Producers are simply subscribers that
//! also send `update_seriousness`.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use bytes::BytesMut;
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::{sleep, Instant};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};
use ward_core::{RegistryConfig, RelayHub, SubscriberId};
use ward_protocol::{codec, frames::codes, Frame, ProtocolError, WireFormat};

type WsSender = SplitSink<WebSocket, Message>;

/// Shared server state.
pub struct AppState {
    /// The fan-out hub.
    pub hub: RelayHub,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let registry = RegistryConfig {
            max_subscribers: config.limits.max_subscribers,
            queue_capacity: config.limits.subscriber_queue,
        };

        Self {
            hub: RelayHub::with_config(registry),
            config,
        }
    }
}

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// `json` (default) or `msgpack`.
    pub format: Option<String>,
}

/// Build the HTTP router: the WebSocket endpoint plus `/health`.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(&state.config.transport.path, get(ws_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the relay on an already bound listener.
///
/// # Errors
///
/// Returns an error if the server stops with an I/O error.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    axum::serve(listener, build_router(state))
        .await
        .context("Relay server failed")
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the address is invalid or cannot be bound.
pub async fn run_server(config: Config) -> Result<()> {
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Ward relay listening on {}", addr);
    info!("WebSocket endpoint: ws://{}{}", addr, config.transport.path);

    serve(listener, Arc::new(AppState::new(config))).await
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "subscribers": state.hub.registry().len(),
    }))
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let format = match params.format.as_deref().map(str::parse::<WireFormat>) {
        Some(Ok(format)) => format,
        Some(Err(e)) => {
            warn!(error = %e, "Falling back to json");
            WireFormat::Json
        }
        None => WireFormat::Json,
    };

    ws.max_message_size(state.config.limits.max_message_size)
        .on_upgrade(move |socket| handle_websocket(socket, state, format))
}

/// Handle a WebSocket connection.
async fn handle_websocket(mut socket: WebSocket, state: Arc<AppState>, format: WireFormat) {
    let _metrics_guard = ConnectionMetricsGuard::new();

    let mut subscription = match state.hub.connect() {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!(error = %e, "Rejecting connection");
            metrics::record_error("subscriber_limit");
            let frame = Frame::error(codes::SUBSCRIBER_LIMIT, e.to_string());
            if let Ok(message) = encode(&frame, format) {
                let _ = socket.send(message).await;
            }
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };
    let id = subscription.id();
    metrics::set_active_subscribers(state.hub.registry().len());
    debug!(subscriber = %id, %format, "WebSocket connected");

    let (mut sender, mut receiver) = socket.split();

    let heartbeat = u32::try_from(state.config.heartbeat.interval_ms).unwrap_or(u32::MAX);
    if send_frame(&mut sender, &Frame::connected(id.to_string(), heartbeat), format)
        .await
        .is_err()
    {
        error!(subscriber = %id, "Failed to send connected frame");
        state.hub.disconnect(&id);
        metrics::set_active_subscribers(state.hub.registry().len());
        return;
    }

    let mut read_buffer = BytesMut::with_capacity(4096);
    let idle_timeout = state.config.idle_timeout();
    let idle = sleep(idle_timeout);
    tokio::pin!(idle);

    'connection: loop {
        tokio::select! {
            // Fan-out from the hub
            envelope = subscription.recv() => {
                let Some(envelope) = envelope else { break };
                if send_frame(&mut sender, &envelope.frame, format).await.is_err() {
                    break;
                }
            }

            msg = receiver.next() => {
                let message = match msg {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        warn!(subscriber = %id, error = %e, "WebSocket error");
                        metrics::record_error("websocket");
                        break;
                    }
                    None => {
                        debug!(subscriber = %id, "WebSocket stream ended");
                        break;
                    }
                };
                idle.as_mut().reset(Instant::now() + idle_timeout);

                let (frames, failure) = match message {
                    Message::Text(text) => {
                        metrics::record_bytes(text.len(), "inbound");
                        match codec::decode_text(&text) {
                            Ok(frame) => (vec![frame], None),
                            Err(e) => (Vec::new(), Some(e)),
                        }
                    }
                    Message::Binary(data) => {
                        metrics::record_bytes(data.len(), "inbound");
                        read_buffer.extend_from_slice(&data);
                        drain_frames(&mut read_buffer)
                    }
                    Message::Ping(data) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                        continue;
                    }
                    Message::Pong(_) => continue,
                    Message::Close(_) => {
                        debug!(subscriber = %id, "Received close frame");
                        break;
                    }
                };

                for frame in frames {
                    if handle_frame(frame, id, &state, &mut sender, format).await.is_err() {
                        break 'connection;
                    }
                }

                if let Some(e) = failure {
                    read_buffer.clear();
                    warn!(subscriber = %id, error = %e, "Malformed frame");
                    metrics::record_error("malformed_frame");
                    let code = match e {
                        ProtocolError::FrameTooLarge(_) => codes::FRAME_TOO_LARGE,
                        _ => codes::MALFORMED_FRAME,
                    };
                    if send_frame(&mut sender, &Frame::error(code, e.to_string()), format).await.is_err() {
                        break;
                    }
                }
            }

            () = &mut idle => {
                info!(subscriber = %id, "No traffic within heartbeat timeout, closing");
                metrics::record_error("heartbeat_timeout");
                break;
            }
        }
    }

    state.hub.disconnect(&id);
    metrics::set_active_subscribers(state.hub.registry().len());
    let _ = sender.close().await;

    debug!(subscriber = %id, "WebSocket disconnected");
}

/// Handle a decoded frame.
async fn handle_frame(
    frame: Frame,
    id: SubscriberId,
    state: &AppState,
    sender: &mut WsSender,
    format: WireFormat,
) -> Result<(), axum::Error> {
    match frame {
        Frame::UpdateSeriousness(payload) => {
            let report = state.hub.ingest(Some(id), payload);
            metrics::record_update(&report);
            debug!(
                subscriber = %id,
                delivered = report.delivered,
                dropped = report.dropped,
                "Relayed update"
            );
            Ok(())
        }

        Frame::Ping { timestamp } => send_frame(sender, &Frame::pong(timestamp), format).await,

        Frame::Pong { .. } => Ok(()),

        other => {
            warn!(subscriber = %id, event = other.event_name(), "Unexpected event");
            metrics::record_error("unexpected_event");
            let reply = Frame::error(
                codes::UNEXPECTED_EVENT,
                format!("unexpected event: {}", other.event_name()),
            );
            send_frame(sender, &reply, format).await
        }
    }
}

/// Decode every complete binary frame, stopping at the first bad one.
fn drain_frames(buf: &mut BytesMut) -> (Vec<Frame>, Option<ProtocolError>) {
    let mut frames = Vec::new();
    loop {
        match codec::decode_from(buf) {
            Ok(Some(frame)) => frames.push(frame),
            Ok(None) => return (frames, None),
            Err(e) => return (frames, Some(e)),
        }
    }
}

fn encode(frame: &Frame, format: WireFormat) -> Result<Message, ProtocolError> {
    Ok(match format {
        WireFormat::Json => {
            let text = codec::encode_text(frame)?;
            metrics::record_bytes(text.len(), "outbound");
            Message::Text(text)
        }
        WireFormat::MessagePack => {
            let data = codec::encode(frame)?;
            metrics::record_bytes(data.len(), "outbound");
            Message::Binary(data.to_vec())
        }
    })
}

/// Send a frame to the WebSocket. Unencodable frames are logged and skipped.
async fn send_frame(sender: &mut WsSender, frame: &Frame, format: WireFormat) -> Result<(), axum::Error> {
    match encode(frame, format) {
        Ok(message) => sender.send(message).await,
        Err(e) => {
            error!(event = frame.event_name(), error = %e, "Failed to encode frame");
            metrics::record_error("encode");
            Ok(())
        }
    }
}
