//! # ward-transport
//!
//! Client side of the Wardwatch relay.
//!
//! A process holds one [`RelayClient`]. Components that need the relay call
//! [`RelayClient::acquire`] and keep the returned [`LinkHandle`] for as long
//! as they use it. The socket is opened on the first acquire and closed when
//! the last handle is dropped.
//!
//! ```rust,ignore
//! use ward_transport::{LinkConfig, RelayClient};
//!
//! let client = RelayClient::new(LinkConfig::new("ws://127.0.0.1:8080/"));
//! let mut link = client.acquire().await?;
//! while let Ok(frame) = link.recv().await {
//!     // Process frame
//! }
//! ```

pub mod link;
pub mod traits;
pub mod websocket;

pub use link::{LinkConfig, LinkHandle, RelayClient};
pub use traits::TransportError;
pub use ward_protocol::WireFormat;
