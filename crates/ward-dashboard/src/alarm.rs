//! Audible alarm output.

use std::io::Write;
use tracing::warn;
use ward_core::BedId;

/// Receives alarm triggers from the dashboard.
pub trait AlarmSink: Send {
    /// Sound one alarm for `bed_id`.
    fn sound(&mut self, bed_id: &BedId);
}

/// Rings the terminal bell.
#[derive(Debug, Default)]
pub struct TerminalBell;

impl AlarmSink for TerminalBell {
    fn sound(&mut self, bed_id: &BedId) {
        warn!(bed = %bed_id, "EMERGENCY alarm");
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = stdout.write_all(b"\x07").and_then(|()| stdout.flush()) {
            warn!(error = %e, "Failed to ring terminal bell");
        }
    }
}

/// Keeps every alarm in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub alarms: Vec<BedId>,
}

impl AlarmSink for RecordingSink {
    fn sound(&mut self, bed_id: &BedId) {
        self.alarms.push(bed_id.clone());
    }
}
