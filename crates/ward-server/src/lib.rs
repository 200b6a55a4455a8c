//! # ward-server
//!
//! The Wardwatch relay: a WebSocket endpoint that republishes every
//! `update_seriousness` it receives to all connected clients as
//! `dashboard_update`. Nothing is stored.

pub mod config;
pub mod handlers;
pub mod metrics;

pub use config::Config;
pub use handlers::{build_router, run_server, serve, AppState};
