//! # ward-core
//!
//! Relay and alerting building blocks for Wardwatch.
//!
//! - **RelayHub** - fans each ingested update out to every subscriber
//! - **SubscriptionRegistry** - the live set of connected subscribers
//! - **AlertBook** - per-bed alarm hysteresis, one book per dashboard
//! - **Debouncer** - cancel-and-reschedule for bursty producers
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐     ┌─────────────┐     ┌──────────────┐     ┌───────────┐
//! │ Producer │────▶│  RelayHub   │────▶│  Subscriber  │────▶│ AlertBook │
//! └──────────┘     └─────────────┘     │  (dashboard) │     └───────────┘
//!                         │            └──────────────┘
//!                         ▼
//!                  ┌─────────────┐
//!                  │  Registry   │
//!                  └─────────────┘
//! ```

pub mod alert;
pub mod debounce;
pub mod envelope;
pub mod hub;
pub mod registry;
pub mod update;

pub use alert::{AlertBook, Indicator, PatientAlertState, Status, Transition};
pub use debounce::Debouncer;
pub use envelope::Envelope;
pub use hub::{HubError, HubStats, RelayHub};
pub use registry::{BroadcastReport, RegistryConfig, SubscriberId, Subscription, SubscriptionRegistry};
pub use update::{BedId, Reading, Seriousness, SeriousnessUpdate};
