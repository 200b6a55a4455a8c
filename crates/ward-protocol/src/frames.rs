//! Frame types for the Wardwatch protocol.
//!
//! Every WebSocket message carries exactly one frame, shaped as an event
//! envelope: `{"event": <name>, "data": <payload>}`. Seriousness payloads are
//! kept as opaque JSON values so the relay can forward them untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current protocol version, advertised in the `connected` frame.
pub const PROTOCOL_VERSION: u8 = 1;

/// Event emitted by producers carrying one bed's seriousness.
pub const EVENT_UPDATE_SERIOUSNESS: &str = "update_seriousness";

/// Event fanned out by the relay to every connected subscriber.
pub const EVENT_DASHBOARD_UPDATE: &str = "dashboard_update";

/// Error codes carried by [`Frame::Error`].
pub mod codes {
    /// The frame could not be decoded.
    pub const MALFORMED_FRAME: u16 = 1001;
    /// The frame decoded but the server does not accept that event.
    pub const UNEXPECTED_EVENT: u16 = 1002;
    /// The message exceeded the configured size limit.
    pub const FRAME_TOO_LARGE: u16 = 1003;
    /// The relay is at its subscriber limit.
    pub const SUBSCRIBER_LIMIT: u16 = 1004;
}

/// A protocol frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum Frame {
    /// Producer → relay: a seriousness reading for one bed.
    #[serde(rename = "update_seriousness")]
    UpdateSeriousness(Value),

    /// Relay → subscribers: the same payload, passed through verbatim.
    #[serde(rename = "dashboard_update")]
    DashboardUpdate(Value),

    /// Sent by the relay right after the upgrade completes.
    #[serde(rename = "connected")]
    Connected {
        /// Connection-scoped subscriber identifier.
        connection_id: String,
        /// Negotiated protocol version.
        version: u8,
        /// Recommended heartbeat interval in milliseconds.
        heartbeat: u32,
    },

    /// Keepalive ping.
    #[serde(rename = "ping")]
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
    },

    /// Keepalive pong.
    #[serde(rename = "pong")]
    Pong {
        /// Echoed timestamp from ping.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
    },

    /// Error report. The connection stays open.
    #[serde(rename = "error")]
    Error {
        /// Error code, see [`codes`].
        code: u16,
        /// Human-readable error message.
        message: String,
    },
}

impl Frame {
    /// The event name this frame travels under.
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            Frame::UpdateSeriousness(_) => EVENT_UPDATE_SERIOUSNESS,
            Frame::DashboardUpdate(_) => EVENT_DASHBOARD_UPDATE,
            Frame::Connected { .. } => "connected",
            Frame::Ping { .. } => "ping",
            Frame::Pong { .. } => "pong",
            Frame::Error { .. } => "error",
        }
    }

    /// Create an `update_seriousness` frame.
    #[must_use]
    pub fn update_seriousness(payload: Value) -> Self {
        Frame::UpdateSeriousness(payload)
    }

    /// Create a `dashboard_update` frame.
    #[must_use]
    pub fn dashboard_update(payload: Value) -> Self {
        Frame::DashboardUpdate(payload)
    }

    /// Create a `connected` frame.
    #[must_use]
    pub fn connected(connection_id: impl Into<String>, heartbeat: u32) -> Self {
        Frame::Connected {
            connection_id: connection_id.into(),
            version: PROTOCOL_VERSION,
            heartbeat,
        }
    }

    /// Create a ping frame.
    #[must_use]
    pub fn ping(timestamp: Option<u64>) -> Self {
        Frame::Ping { timestamp }
    }

    /// Create a pong frame.
    #[must_use]
    pub fn pong(timestamp: Option<u64>) -> Self {
        Frame::Pong { timestamp }
    }

    /// Create an error frame.
    #[must_use]
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Frame::Error {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_envelope_shape() {
        let frame = Frame::update_seriousness(json!({"bedId": "3", "seriousness": 2}));
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            value,
            json!({"event": "update_seriousness", "data": {"bedId": "3", "seriousness": 2}})
        );
    }

    #[test]
    fn test_parse_socket_style_event() {
        let text = r#"{"event":"dashboard_update","data":{"bedId":7,"seriousness":4}}"#;
        let frame: Frame = serde_json::from_str(text).unwrap();
        assert_eq!(
            frame,
            Frame::DashboardUpdate(json!({"bedId": 7, "seriousness": 4}))
        );
        assert_eq!(frame.event_name(), EVENT_DASHBOARD_UPDATE);
    }

    #[test]
    fn test_connected_carries_version() {
        match Frame::connected("sub-1", 30_000) {
            Frame::Connected { version, .. } => assert_eq!(version, PROTOCOL_VERSION),
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_ping_without_timestamp() {
        let frame: Frame = serde_json::from_str(r#"{"event":"ping","data":{}}"#).unwrap();
        assert_eq!(frame, Frame::ping(None));
    }

    #[test]
    fn test_unknown_event_rejected() {
        assert!(serde_json::from_str::<Frame>(r#"{"event":"subscribe","data":{}}"#).is_err());
    }
}
