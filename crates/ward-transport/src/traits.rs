//! Transport errors shared by the WebSocket glue and the relay link.

use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The link has shut down.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Could not establish the WebSocket.
    #[error("Connect to {url} failed: {reason}")]
    Connect {
        /// Relay URL that was dialed.
        url: String,
        /// Underlying failure.
        reason: String,
    },

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive data.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Protocol error.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ward_protocol::ProtocolError),
}
