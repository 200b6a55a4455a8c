//! Per-bed alarm hysteresis.
//!
//! An [`AlertBook`] turns a dashboard's stream of seriousness readings into
//! at most one alarm per excursion to [`Seriousness::EMERGENCY`]. A bed
//! re-arms as soon as a reading below emergency arrives.
//!
//! The book performs no side effects. [`AlertBook::observe`] returns a
//! [`Transition`] and the caller sounds the alarm when `alarm` is set.

use crate::update::{BedId, Reading, Seriousness};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};

/// Display status derived from the latest reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Status {
    Low,
    Moderate,
    High,
    Critical,
    Emergency,
}

impl Status {
    /// Map a reading to its status. Invalid readings fall back to `Low`.
    #[must_use]
    pub fn of(reading: Option<Seriousness>) -> Self {
        match reading.map(Seriousness::level) {
            Some(1) => Status::Moderate,
            Some(2) => Status::High,
            Some(3) => Status::Critical,
            Some(4) => Status::Emergency,
            _ => Status::Low,
        }
    }

    /// Map any raw integer to its status.
    #[must_use]
    pub fn from_level(level: i64) -> Self {
        Self::of(Seriousness::try_from(level).ok())
    }

    /// Status label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Low => "Low",
            Status::Moderate => "Moderate",
            Status::High => "High",
            Status::Critical => "Critical",
            Status::Emergency => "Emergency",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Risk-level indicator shown next to a bed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Indicator {
    Green,
    Yellow,
    Red,
    /// Critical and emergency beds pulse.
    PulsingRed,
}

impl Indicator {
    /// Indicator for a reading.
    #[must_use]
    pub fn of(reading: Option<Seriousness>) -> Self {
        match reading.map(Seriousness::level) {
            Some(3 | 4) => Indicator::PulsingRed,
            _ => match Status::of(reading) {
                Status::Moderate => Indicator::Yellow,
                Status::High => Indicator::Red,
                _ => Indicator::Green,
            },
        }
    }
}

/// Alarm state kept for one bed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientAlertState {
    /// Bed this state belongs to.
    pub bed_id: BedId,
    /// 4 while an emergency excursion is in progress, otherwise the last
    /// sub-emergency level seen.
    pub last_played_level: u8,
    /// Latest reading, `None` if it was malformed.
    pub last_reading: Option<Seriousness>,
    /// Status derived from the latest reading.
    pub status: Status,
    /// Indicator derived from the latest reading.
    pub indicator: Indicator,
    /// Alarms fired for this bed so far.
    pub alarms_fired: u64,
}

impl PatientAlertState {
    fn new(bed_id: BedId) -> Self {
        Self {
            bed_id,
            last_played_level: 0,
            last_reading: None,
            status: Status::Low,
            indicator: Indicator::Green,
            alarms_fired: 0,
        }
    }

    /// Whether the bed is inside an emergency excursion.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.last_played_level == Seriousness::EMERGENCY.level()
    }
}

/// Result of feeding one reading to the book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub bed_id: BedId,
    pub status: Status,
    pub indicator: Indicator,
    /// Level after the transition.
    pub last_played_level: u8,
    /// The caller must sound exactly one alarm for this bed.
    pub alarm: bool,
}

/// Keyed store of per-bed alert state, owned by one dashboard.
#[derive(Debug, Default)]
pub struct AlertBook {
    beds: HashMap<BedId, PatientAlertState>,
    alerts_enabled: bool,
}

impl AlertBook {
    /// Create an empty book with alerting disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate alerting. Returns `true` only on the activating call.
    pub fn enable_alerts(&mut self) -> bool {
        if self.alerts_enabled {
            return false;
        }
        self.alerts_enabled = true;
        info!(beds = self.beds.len(), "Alerting enabled");
        true
    }

    /// Whether alerting has been activated.
    #[must_use]
    pub fn alerts_enabled(&self) -> bool {
        self.alerts_enabled
    }

    /// Feed one reading for a bed.
    ///
    /// `None` stands for a missing or out-of-range seriousness: the bed
    /// shows `Low` and its level is left alone.
    pub fn observe(&mut self, bed_id: &BedId, reading: Option<Seriousness>) -> Transition {
        let alerts_enabled = self.alerts_enabled;
        let state = self
            .beds
            .entry(bed_id.clone())
            .or_insert_with(|| PatientAlertState::new(bed_id.clone()));

        let alarm = match reading {
            Some(s) if s.is_emergency() => {
                if state.is_armed() {
                    false
                } else {
                    state.last_played_level = s.level();
                    alerts_enabled
                }
            }
            Some(s) => {
                state.last_played_level = s.level();
                false
            }
            None => false,
        };

        if alarm {
            state.alarms_fired += 1;
        }
        state.last_reading = reading;
        state.status = Status::of(reading);
        state.indicator = Indicator::of(reading);

        debug!(
            bed = %bed_id,
            status = %state.status,
            last_played_level = state.last_played_level,
            alarm,
            "Observed reading"
        );

        Transition {
            bed_id: bed_id.clone(),
            status: state.status,
            indicator: state.indicator,
            last_played_level: state.last_played_level,
            alarm,
        }
    }

    /// Feed a raw `dashboard_update` payload.
    ///
    /// Returns `None` when the payload names no usable bed.
    pub fn observe_payload(&mut self, payload: &Value) -> Option<Transition> {
        let reading = Reading::from_payload(payload);
        let bed_id = reading.bed_id?;
        Some(self.observe(&bed_id, reading.seriousness))
    }

    /// State for one bed, if it has been observed.
    #[must_use]
    pub fn get(&self, bed_id: &BedId) -> Option<&PatientAlertState> {
        self.beds.get(bed_id)
    }

    /// Number of beds observed so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.beds.len()
    }

    /// Whether no bed has been observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.beds.is_empty()
    }

    /// Iterate over all observed beds.
    pub fn iter(&self) -> impl Iterator<Item = &PatientAlertState> {
        self.beds.values()
    }
}
