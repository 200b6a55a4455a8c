//! Patient roster and the live board built on top of it.

use std::fmt::{self, Write as _};

use tracing::{debug, warn};
use ward_core::{AlertBook, BedId, Indicator, Status, Transition};
use ward_protocol::Frame;

use crate::alarm::AlarmSink;

/// Default number of beds on the roster.
pub const DEFAULT_BEDS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sex {
    Male,
    Female,
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Sex::Male => "Male",
            Sex::Female => "Female",
        })
    }
}

/// One patient on the roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patient {
    pub bed_id: BedId,
    pub name: String,
    pub age: u32,
    pub sex: Sex,
}

/// Patients shown on the board, in bed order.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    patients: Vec<Patient>,
}

impl Roster {
    /// Generate beds `1..=count`.
    #[must_use]
    pub fn generate(count: u32) -> Self {
        let patients = (1..=count)
            .map(|i| Patient {
                bed_id: BedId::from(i),
                name: format!("Patient {i}"),
                age: 49 + i,
                sex: if i % 2 == 1 { Sex::Male } else { Sex::Female },
            })
            .collect();
        Self { patients }
    }

    #[must_use]
    pub fn get(&self, bed_id: &BedId) -> Option<&Patient> {
        self.patients.iter().find(|p| &p.bed_id == bed_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Patient> {
        self.patients.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.patients.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patients.is_empty()
    }
}

/// A monitoring dashboard: roster, alert book and alarm output.
///
/// All updates go through [`Dashboard::apply`] on one task, so a bed's state
/// change and its alarm are never interleaved with another update.
pub struct Dashboard<S> {
    roster: Roster,
    book: AlertBook,
    sink: S,
}

impl<S: AlarmSink> Dashboard<S> {
    pub fn new(roster: Roster, sink: S) -> Self {
        Self {
            roster,
            book: AlertBook::new(),
            sink,
        }
    }

    /// One-time alert activation. Returns `true` on the activating call.
    pub fn enable_alerts(&mut self) -> bool {
        self.book.enable_alerts()
    }

    /// Handle a frame from the relay.
    ///
    /// Only `dashboard_update` frames change state. Beds missing from the
    /// roster are still tracked and can still alarm.
    pub fn apply(&mut self, frame: &Frame) -> Option<Transition> {
        let Frame::DashboardUpdate(payload) = frame else {
            return None;
        };

        let Some(transition) = self.book.observe_payload(payload) else {
            warn!(payload = %payload, "Dropping update without a usable bed id");
            return None;
        };

        if self.roster.get(&transition.bed_id).is_none() {
            debug!(bed = %transition.bed_id, "Update for bed not on the roster");
        }
        if transition.alarm {
            self.sink.sound(&transition.bed_id);
        }
        Some(transition)
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn book(&self) -> &AlertBook {
        &self.book
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Current status and indicator of a roster bed.
    #[must_use]
    pub fn status_of(&self, bed_id: &BedId) -> (Status, Indicator) {
        self.book
            .get(bed_id)
            .map_or((Status::Low, Indicator::Green), |s| (s.status, s.indicator))
    }

    /// Render the roster as a text table.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<5} {:<12} {:>4} {:<7} {:<10} {:<11} alerts {}",
            "Bed",
            "Name",
            "Age",
            "Sex",
            "Status",
            "Indicator",
            if self.book.alerts_enabled() { "on" } else { "off" }
        );
        for patient in self.roster.iter() {
            let (status, indicator) = self.status_of(&patient.bed_id);
            let _ = writeln!(
                out,
                "{:<5} {:<12} {:>4} {:<7} {:<10} {:<11}",
                patient.bed_id.as_str(),
                patient.name,
                patient.age,
                patient.sex.to_string(),
                status.as_str(),
                format!("{indicator:?}")
            );
        }
        out
    }
}
