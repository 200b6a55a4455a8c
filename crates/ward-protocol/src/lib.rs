//! # ward-protocol
//!
//! Wire protocol definitions for the Wardwatch seriousness relay.
//!
//! Producers, the relay and dashboards exchange event frames over a
//! WebSocket. Each frame names an event and carries a data payload:
//!
//! - `update_seriousness` - producer → relay
//! - `dashboard_update` - relay → every subscriber, payload untouched
//! - `connected` / `ping` / `pong` / `error` - connection housekeeping
//!
//! ## Example
//!
//! ```rust
//! use ward_protocol::{codec, Frame};
//! use serde_json::json;
//!
//! let frame = Frame::update_seriousness(json!({"bedId": "3", "seriousness": 2}));
//!
//! let text = codec::encode_text(&frame).unwrap();
//! assert_eq!(codec::decode_text(&text).unwrap(), frame);
//! ```

pub mod codec;
pub mod frames;

pub use codec::{decode, encode, ProtocolError, WireFormat};
pub use frames::{Frame, EVENT_DASHBOARD_UPDATE, EVENT_UPDATE_SERIOUSNESS, PROTOCOL_VERSION};
