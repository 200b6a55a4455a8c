//! Shared, reference-counted relay link.

use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use bytes::BytesMut;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};
use ward_protocol::{Frame, WireFormat};

use crate::traits::TransportError;
use crate::websocket::{self, WsStream};

/// Link settings.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Relay URL, e.g. `ws://127.0.0.1:8080/`.
    pub url: String,
    /// Outbound encoding.
    pub format: WireFormat,
    /// Interval between application pings. A shorter interval advertised by
    /// the relay takes precedence.
    pub heartbeat: Duration,
    /// Frames buffered per handle before it lags.
    pub inbound_capacity: usize,
    /// Frames queued for sending.
    pub outbound_capacity: usize,
}

impl LinkConfig {
    /// Defaults for the given relay URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            format: WireFormat::Json,
            heartbeat: Duration::from_secs(30),
            inbound_capacity: 256,
            outbound_capacity: 64,
        }
    }

    /// Use the given wire format.
    #[must_use]
    pub fn with_format(mut self, format: WireFormat) -> Self {
        self.format = format;
        self
    }

    /// Use the given heartbeat interval.
    #[must_use]
    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }
}

/// State shared by every handle on one socket.
///
/// The link task owns the only outbound receiver; once the last `LinkShared`
/// is dropped the outbound channel closes and the task shuts the socket.
struct LinkShared {
    outbound: mpsc::Sender<Frame>,
    inbound: broadcast::Receiver<Frame>,
    connection_id: Arc<OnceLock<String>>,
}

/// Lazily connected, process-wide relay client.
pub struct RelayClient {
    config: LinkConfig,
    current: Mutex<Weak<LinkShared>>,
}

impl RelayClient {
    /// Create a client. No connection is made until [`acquire`](Self::acquire).
    #[must_use]
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            current: Mutex::new(Weak::new()),
        }
    }

    /// Client configuration.
    #[must_use]
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Get a handle on the relay link, connecting if no live link exists.
    ///
    /// Concurrent callers share one socket.
    ///
    /// # Errors
    ///
    /// Returns an error if a new connection is needed and cannot be opened.
    pub async fn acquire(&self) -> Result<LinkHandle, TransportError> {
        let mut current = self.current.lock().await;
        if let Some(shared) = current.upgrade() {
            if !shared.outbound.is_closed() {
                return Ok(LinkHandle::new(shared));
            }
            debug!("Previous link is gone, reconnecting");
        }

        let shared = Arc::new(self.open().await?);
        *current = Arc::downgrade(&shared);
        Ok(LinkHandle::new(shared))
    }

    async fn open(&self) -> Result<LinkShared, TransportError> {
        let stream = websocket::connect(&self.config.url, self.config.format).await?;
        info!(url = %self.config.url, format = %self.config.format, "Relay link opened");

        let (outbound_tx, outbound_rx) = mpsc::channel(self.config.outbound_capacity);
        let (inbound_tx, inbound_rx) = broadcast::channel(self.config.inbound_capacity);
        let connection_id = Arc::new(OnceLock::new());

        tokio::spawn(run_link(
            stream,
            self.config.clone(),
            outbound_rx,
            inbound_tx,
            Arc::clone(&connection_id),
        ));

        Ok(LinkShared {
            outbound: outbound_tx,
            inbound: inbound_rx,
            connection_id,
        })
    }
}

/// A reference on the relay link.
pub struct LinkHandle {
    shared: Arc<LinkShared>,
    inbound: broadcast::Receiver<Frame>,
}

impl LinkHandle {
    fn new(shared: Arc<LinkShared>) -> Self {
        let inbound = shared.inbound.resubscribe();
        Self { shared, inbound }
    }

    /// Queue a frame for the relay.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionClosed`] if the link has shut down.
    pub async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        self.shared
            .outbound
            .send(frame)
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Next frame received from the relay.
    ///
    /// Only frames received after this handle was created are seen. A handle
    /// that falls behind skips what it missed.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionClosed`] once the link has shut
    /// down and every buffered frame has been read.
    pub async fn recv(&mut self) -> Result<Frame, TransportError> {
        loop {
            match self.inbound.recv().await {
                Ok(frame) => return Ok(frame),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Link handle lagged, frames skipped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(TransportError::ConnectionClosed)
                }
            }
        }
    }

    /// Connection id assigned by the relay, once the greeting has arrived.
    #[must_use]
    pub fn connection_id(&self) -> Option<&str> {
        self.shared.connection_id.get().map(String::as_str)
    }

    /// Whether the link task is still running.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.shared.outbound.is_closed()
    }
}

impl Clone for LinkHandle {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.shared))
    }
}

impl std::fmt::Debug for LinkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkHandle")
            .field("connection_id", &self.connection_id())
            .field("open", &self.is_open())
            .finish()
    }
}

async fn run_link(
    stream: WsStream,
    config: LinkConfig,
    mut outbound: mpsc::Receiver<Frame>,
    inbound: broadcast::Sender<Frame>,
    connection_id: Arc<OnceLock<String>>,
) {
    let (mut sink, mut stream) = stream.split();
    let mut read_buffer = BytesMut::new();
    let mut period = config.heartbeat;
    let mut ticker = heartbeat_timer(period);

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    debug!("Last link handle dropped, closing");
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                };
                match websocket::encode_frame(&frame, config.format) {
                    Ok(message) => {
                        if let Err(e) = sink.send(message).await {
                            warn!(error = %e, "Send failed");
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, event = frame.event_name(), "Dropping unencodable frame"),
                }
            }

            message = stream.next() => {
                let message = match message {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        let err = websocket::receive_error(e);
                        if !matches!(err, TransportError::ConnectionClosed) {
                            warn!(error = %err, "Receive failed");
                        }
                        break;
                    }
                    None => break,
                };
                match websocket::decode_message(message, &mut read_buffer) {
                    Ok(frames) => {
                        for frame in frames {
                            if let Frame::Connected { connection_id: id, heartbeat, .. } = &frame {
                                let _ = connection_id.set(id.clone());
                                let advertised = Duration::from_millis(u64::from(*heartbeat));
                                if !advertised.is_zero() && advertised < period {
                                    debug!(heartbeat_ms = *heartbeat, "Using relay heartbeat interval");
                                    period = advertised;
                                    ticker = heartbeat_timer(period);
                                }
                            }
                            trace!(event = frame.event_name(), "Frame received");
                            // No handle listening is fine
                            let _ = inbound.send(frame);
                        }
                    }
                    Err(TransportError::ConnectionClosed) => break,
                    Err(e) => warn!(error = %e, "Ignoring malformed frame"),
                }
            }

            _ = ticker.tick() => {
                let message = match websocket::encode_frame(&Frame::ping(Some(now_millis())), config.format) {
                    Ok(message) => message,
                    Err(e) => {
                        warn!(error = %e, "Heartbeat encode failed");
                        continue;
                    }
                };
                if let Err(e) = sink.send(message).await {
                    warn!(error = %e, "Heartbeat failed");
                    break;
                }
            }
        }
    }

    info!(url = %config.url, "Relay link closed");
}

/// Ping timer whose first tick is one full period away.
fn heartbeat_timer(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio::time::timeout;
    use tokio_tungstenite::accept_async;
    use ward_protocol::codec;

    #[derive(Debug)]
    enum ServerEvent {
        Accepted(usize),
        Received(usize, Frame),
        Closed(usize),
    }

    async fn spawn_server() -> (
        String,
        mpsc::UnboundedReceiver<ServerEvent>,
        mpsc::UnboundedSender<Frame>,
    ) {
        spawn_server_advertising(30_000).await
    }

    /// Minimal relay stand-in: greets each connection advertising
    /// `heartbeat_ms`, reports what it receives, and pushes frames from
    /// `push_rx` to the latest connection.
    async fn spawn_server_advertising(
        heartbeat_ms: u32,
    ) -> (
        String,
        mpsc::UnboundedReceiver<ServerEvent>,
        mpsc::UnboundedSender<Frame>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/", listener.local_addr().unwrap());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (push_tx, push_rx) = mpsc::unbounded_channel::<Frame>();
        let push_rx = Arc::new(Mutex::new(push_rx));

        tokio::spawn(async move {
            let mut n = 0;
            while let Ok((tcp, _)) = listener.accept().await {
                n += 1;
                let conn = n;
                let events = events_tx.clone();
                let push_rx = Arc::clone(&push_rx);
                tokio::spawn(async move {
                    let ws = accept_async(tcp).await.unwrap();
                    let (mut sink, mut stream) = ws.split();
                    let _ = events.send(ServerEvent::Accepted(conn));
                    let hello = Frame::connected(format!("conn-{conn}"), heartbeat_ms);
                    sink.send(Message::Text(codec::encode_text(&hello).unwrap()))
                        .await
                        .unwrap();

                    let mut push_rx = push_rx.lock().await;
                    loop {
                        tokio::select! {
                            message = stream.next() => match message {
                                Some(Ok(Message::Text(text))) => {
                                    let frame = codec::decode_text(&text).unwrap();
                                    let _ = events.send(ServerEvent::Received(conn, frame));
                                }
                                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                                Some(Ok(_)) => {}
                            },
                            Some(frame) = push_rx.recv() => {
                                let text = codec::encode_text(&frame).unwrap();
                                let _ = sink.send(Message::Text(text)).await;
                            }
                        }
                    }
                    let _ = events.send(ServerEvent::Closed(conn));
                });
            }
        });

        (url, events_rx, push_tx)
    }

    async fn next_event(events: &mut mpsc::UnboundedReceiver<ServerEvent>) -> ServerEvent {
        timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for server event")
            .expect("server gone")
    }

    #[tokio::test]
    async fn test_acquire_is_lazy_and_shared() {
        let (url, mut events, _push) = spawn_server().await;
        let client = RelayClient::new(LinkConfig::new(url));

        // Nothing dialed yet
        assert!(timeout(Duration::from_millis(50), events.recv()).await.is_err());

        let first = client.acquire().await.unwrap();
        let second = client.acquire().await.unwrap();
        assert!(matches!(next_event(&mut events).await, ServerEvent::Accepted(1)));

        second
            .send(Frame::update_seriousness(json!({"bedId": "1", "seriousness": 2})))
            .await
            .unwrap();
        match next_event(&mut events).await {
            ServerEvent::Received(1, Frame::UpdateSeriousness(payload)) => {
                assert_eq!(payload["seriousness"], 2);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        drop(first);
    }

    #[tokio::test]
    async fn test_last_drop_closes_and_reacquire_reconnects() {
        let (url, mut events, _push) = spawn_server().await;
        let client = RelayClient::new(LinkConfig::new(url));

        let first = client.acquire().await.unwrap();
        let second = first.clone();
        assert!(matches!(next_event(&mut events).await, ServerEvent::Accepted(1)));

        drop(first);
        assert!(second.is_open());
        drop(second);
        assert!(matches!(next_event(&mut events).await, ServerEvent::Closed(1)));

        let _third = client.acquire().await.unwrap();
        assert!(matches!(next_event(&mut events).await, ServerEvent::Accepted(2)));
    }

    #[tokio::test]
    async fn test_every_handle_receives_relayed_frames() {
        let (url, mut events, push) = spawn_server().await;
        let client = RelayClient::new(LinkConfig::new(url));

        let mut a = client.acquire().await.unwrap();
        let mut b = client.acquire().await.unwrap();
        assert!(matches!(next_event(&mut events).await, ServerEvent::Accepted(1)));

        let frame = Frame::dashboard_update(json!({"bedId": "7", "seriousness": 4}));
        push.send(frame.clone()).unwrap();

        for handle in [&mut a, &mut b] {
            loop {
                let got = timeout(Duration::from_secs(5), handle.recv())
                    .await
                    .unwrap()
                    .unwrap();
                if matches!(got, Frame::Connected { .. }) {
                    continue;
                }
                assert_eq!(got, frame);
                break;
            }
        }
        assert_eq!(a.connection_id(), Some("conn-1"));
    }

    #[tokio::test]
    async fn test_pings_at_shorter_advertised_interval() {
        let (url, mut events, _push) = spawn_server_advertising(50).await;
        let client = RelayClient::new(LinkConfig::new(url));
        assert_eq!(client.config().heartbeat, Duration::from_secs(30));

        let _link = client.acquire().await.unwrap();
        assert!(matches!(next_event(&mut events).await, ServerEvent::Accepted(1)));

        for _ in 0..3 {
            match next_event(&mut events).await {
                ServerEvent::Received(1, Frame::Ping { timestamp }) => assert!(timestamp.is_some()),
                other => panic!("expected a ping, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_longer_advertised_interval_keeps_configured_one() {
        let (url, mut events, _push) = spawn_server_advertising(60_000).await;
        let client = RelayClient::new(LinkConfig::new(url).with_heartbeat(Duration::from_millis(50)));

        let _link = client.acquire().await.unwrap();
        assert!(matches!(next_event(&mut events).await, ServerEvent::Accepted(1)));
        assert!(matches!(
            next_event(&mut events).await,
            ServerEvent::Received(1, Frame::Ping { .. })
        ));
    }

    #[tokio::test]
    async fn test_acquire_fails_without_relay() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/", listener.local_addr().unwrap());
        drop(listener);

        let client = RelayClient::new(LinkConfig::new(url));
        assert!(matches!(
            client.acquire().await,
            Err(TransportError::Connect { .. })
        ));
    }
}
