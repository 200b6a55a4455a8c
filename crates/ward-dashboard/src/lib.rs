//! # ward-dashboard
//!
//! Terminal dashboard for the Wardwatch relay. Each dashboard keeps its own
//! [`ward_core::AlertBook`], so alarm state is per screen, not per ward.

pub mod alarm;
pub mod board;

pub use alarm::{AlarmSink, RecordingSink, TerminalBell};
pub use board::{Dashboard, Patient, Roster, Sex, DEFAULT_BEDS};
