//! Shared inputs for the Wardwatch benchmarks.

use serde_json::{json, Value};

/// A `{ bedId, seriousness }` payload.
#[must_use]
pub fn payload(bed: u32, seriousness: u8) -> Value {
    json!({ "bedId": bed.to_string(), "seriousness": seriousness })
}

/// A deterministic, oscillating stream of readings across `beds` beds.
///
/// Levels walk 0..=4 and back so every bed keeps re-arming and firing.
#[must_use]
pub fn oscillating_readings(beds: u32, count: usize) -> Vec<Value> {
    const WAVE: [u8; 8] = [0, 1, 2, 3, 4, 4, 3, 2];
    (0..count)
        .map(|i| {
            let bed = (i as u32 % beds) + 1;
            payload(bed, WAVE[(i / beds as usize) % WAVE.len()])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oscillating_readings_cover_every_bed() {
        let readings = oscillating_readings(3, 24);
        assert_eq!(readings.len(), 24);
        assert_eq!(readings[0], payload(1, 0));
        assert_eq!(readings[2], payload(3, 0));
        assert_eq!(readings[3], payload(1, 1));
        assert_eq!(readings[12], payload(1, 4));
    }
}
