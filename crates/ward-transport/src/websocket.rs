//! WebSocket glue built on tokio-tungstenite.
//!
//! Maps frames to WebSocket messages in the negotiated [`WireFormat`].

use bytes::BytesMut;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::debug;
use ward_protocol::{codec, Frame, WireFormat};

use crate::traits::TransportError;

/// Client-side WebSocket stream.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Build the URL to dial for a given wire format.
#[must_use]
pub fn relay_url(base: &str, format: WireFormat) -> String {
    match format {
        WireFormat::Json => base.to_string(),
        WireFormat::MessagePack => {
            let sep = if base.contains('?') { '&' } else { '?' };
            format!("{base}{sep}format={format}")
        }
    }
}

/// Dial the relay.
///
/// # Errors
///
/// Returns an error if the TCP connection or the WebSocket handshake fails.
pub async fn connect(base_url: &str, format: WireFormat) -> Result<WsStream, TransportError> {
    let url = relay_url(base_url, format);
    let (stream, response) = connect_async(url.as_str())
        .await
        .map_err(|e| TransportError::Connect {
            url: url.clone(),
            reason: e.to_string(),
        })?;
    debug!(url = %url, status = %response.status(), "WebSocket handshake completed");
    Ok(stream)
}

/// Encode a frame as a WebSocket message.
///
/// # Errors
///
/// Returns an error if the frame cannot be encoded.
pub fn encode_frame(frame: &Frame, format: WireFormat) -> Result<Message, TransportError> {
    Ok(match format {
        WireFormat::Json => Message::Text(codec::encode_text(frame)?),
        WireFormat::MessagePack => Message::Binary(codec::encode(frame)?.to_vec()),
    })
}

/// Decode every complete frame carried by a WebSocket message.
///
/// Binary data accumulates in `read_buffer` until a whole frame is present.
/// Control messages yield no frames.
///
/// # Errors
///
/// Returns [`TransportError::ConnectionClosed`] on a close message, or a
/// protocol error if the payload is malformed.
pub fn decode_message(
    message: Message,
    read_buffer: &mut BytesMut,
) -> Result<Vec<Frame>, TransportError> {
    match message {
        Message::Text(text) => Ok(vec![codec::decode_text(&text)?]),
        Message::Binary(data) => {
            read_buffer.extend_from_slice(&data);
            let mut frames = Vec::new();
            while let Some(frame) = codec::decode_from(read_buffer)? {
                frames.push(frame);
            }
            Ok(frames)
        }
        Message::Close(_) => Err(TransportError::ConnectionClosed),
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Ok(Vec::new()),
    }
}

/// Map a receive-side WebSocket error.
pub(crate) fn receive_error(err: WsError) -> TransportError {
    match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::ConnectionClosed,
        other => TransportError::ReceiveFailed(other.to_string()),
    }
}
