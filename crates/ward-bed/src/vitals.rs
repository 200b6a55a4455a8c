//! Simulated vital signs.
//!
//! Each vital is a dial with a fixed range and step. Temperature is dialed
//! in Fahrenheit and reported in Celsius.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One adjustable vital.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dial {
    /// Heart rate, BPM.
    HeartRate,
    /// Systolic blood pressure, mmHg.
    Systolic,
    /// Diastolic blood pressure, mmHg.
    Diastolic,
    /// Oxygen saturation, percent.
    SpO2,
    /// Body temperature, °F.
    Temperature,
    /// Movement level.
    Movement,
}

impl Dial {
    /// Every dial, in display order.
    pub const ALL: [Dial; 6] = [
        Dial::HeartRate,
        Dial::Systolic,
        Dial::Diastolic,
        Dial::SpO2,
        Dial::Temperature,
        Dial::Movement,
    ];

    /// Key used by the classifier and on the command line.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Dial::HeartRate => "HR",
            Dial::Systolic => "Systolic",
            Dial::Diastolic => "Diastolic",
            Dial::SpO2 => "SpO2",
            Dial::Temperature => "Temp",
            Dial::Movement => "Movement",
        }
    }

    /// Human-readable label with unit.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Dial::HeartRate => "Heart Rate (BPM)",
            Dial::Systolic => "Systolic BP (mmHg)",
            Dial::Diastolic => "Diastolic BP (mmHg)",
            Dial::SpO2 => "Oxygen Saturation (%)",
            Dial::Temperature => "Body Temperature (°F)",
            Dial::Movement => "Movement",
        }
    }

    /// Inclusive `(min, max)`.
    #[must_use]
    pub fn range(self) -> (f64, f64) {
        match self {
            Dial::HeartRate => (40.0, 200.0),
            Dial::Systolic => (80.0, 200.0),
            Dial::Diastolic => (50.0, 140.0),
            Dial::SpO2 => (70.0, 100.0),
            Dial::Temperature => (95.0, 108.0),
            Dial::Movement => (0.0, 3.0),
        }
    }

    /// Smallest increment.
    #[must_use]
    pub fn step(self) -> f64 {
        match self {
            Dial::Temperature => 0.1,
            _ => 1.0,
        }
    }

    /// Clamp to range and snap to step. `None` for non-finite input.
    #[must_use]
    pub fn quantize(self, value: f64) -> Option<f64> {
        if !value.is_finite() {
            return None;
        }
        let (min, max) = self.range();
        let step = self.step();
        let snapped = (value.clamp(min, max) / step).round() * step;
        // Keep one decimal exact for temperature
        Some((snapped * 10.0).round() / 10.0)
    }
}

impl fmt::Display for Dial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Dial {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hr" | "heartrate" | "heart_rate" => Ok(Dial::HeartRate),
            "systolic" | "sys" => Ok(Dial::Systolic),
            "diastolic" | "dia" => Ok(Dial::Diastolic),
            "spo2" | "o2" => Ok(Dial::SpO2),
            "temp" | "temperature" => Ok(Dial::Temperature),
            "movement" | "move" => Ok(Dial::Movement),
            other => Err(format!("unknown dial: {other}")),
        }
    }
}

/// Current dial positions.
#[derive(Debug, Clone, PartialEq)]
pub struct Vitals {
    pub heart_rate: u16,
    pub systolic: u16,
    pub diastolic: u16,
    pub spo2: u16,
    /// Fahrenheit.
    pub temperature_f: f64,
    pub movement: u8,
}

impl Default for Vitals {
    fn default() -> Self {
        Self {
            heart_rate: 80,
            systolic: 120,
            diastolic: 80,
            spo2: 98,
            temperature_f: 98.0,
            movement: 0,
        }
    }
}

impl Vitals {
    /// Current value of a dial.
    #[must_use]
    pub fn get(&self, dial: Dial) -> f64 {
        match dial {
            Dial::HeartRate => f64::from(self.heart_rate),
            Dial::Systolic => f64::from(self.systolic),
            Dial::Diastolic => f64::from(self.diastolic),
            Dial::SpO2 => f64::from(self.spo2),
            Dial::Temperature => self.temperature_f,
            Dial::Movement => f64::from(self.movement),
        }
    }

    /// Move a dial, clamping to its range. Returns the value applied, or
    /// `None` (leaving the dial alone) for non-finite input.
    pub fn set(&mut self, dial: Dial, value: f64) -> Option<f64> {
        let value = dial.quantize(value)?;
        // Quantized values are within range, so the casts cannot truncate
        match dial {
            Dial::HeartRate => self.heart_rate = value as u16,
            Dial::Systolic => self.systolic = value as u16,
            Dial::Diastolic => self.diastolic = value as u16,
            Dial::SpO2 => self.spo2 = value as u16,
            Dial::Temperature => self.temperature_f = value,
            Dial::Movement => self.movement = value as u8,
        }
        Some(value)
    }

    /// Body temperature in Celsius, one decimal.
    #[must_use]
    pub fn temperature_c(&self) -> f64 {
        let celsius = (self.temperature_f - 32.0) * 5.0 / 9.0;
        (celsius * 10.0).round() / 10.0
    }

    /// Body of the classification request.
    #[must_use]
    pub fn to_request(&self) -> ClassifierRequest {
        ClassifierRequest {
            heart_rate: self.heart_rate,
            systolic: self.systolic,
            diastolic: self.diastolic,
            spo2: self.spo2,
            temperature_c: self.temperature_c(),
            movement: self.movement,
        }
    }
}

impl fmt::Display for Vitals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HR {} | BP {}/{} | SpO2 {}% | Temp {:.1}°F | Movement {}",
            self.heart_rate,
            self.systolic,
            self.diastolic,
            self.spo2,
            self.temperature_f,
            self.movement
        )
    }
}

/// Classifier input, keyed the way the classification service expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierRequest {
    #[serde(rename = "HR")]
    pub heart_rate: u16,
    #[serde(rename = "Systolic")]
    pub systolic: u16,
    #[serde(rename = "Diastolic")]
    pub diastolic: u16,
    #[serde(rename = "SpO2")]
    pub spo2: u16,
    /// Celsius, one decimal.
    #[serde(rename = "Temp")]
    pub temperature_c: f64,
    #[serde(rename = "Movement")]
    pub movement: u8,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let vitals = Vitals::default();
        assert_eq!(vitals.to_string(), "HR 80 | BP 120/80 | SpO2 98% | Temp 98.0°F | Movement 0");
    }

    #[test]
    fn test_set_clamps_to_range() {
        let mut vitals = Vitals::default();
        assert_eq!(vitals.set(Dial::HeartRate, 250.0), Some(200.0));
        assert_eq!(vitals.heart_rate, 200);
        assert_eq!(vitals.set(Dial::SpO2, 10.0), Some(70.0));
        assert_eq!(vitals.set(Dial::Movement, 2.6), Some(3.0));
        assert_eq!(vitals.set(Dial::Temperature, 94.0), Some(95.0));
    }

    #[test]
    fn test_set_snaps_to_step() {
        let mut vitals = Vitals::default();
        assert_eq!(vitals.set(Dial::Temperature, 101.37), Some(101.4));
        assert_eq!(vitals.set(Dial::Systolic, 133.4), Some(133.0));
    }

    #[test]
    fn test_non_finite_is_ignored() {
        let mut vitals = Vitals::default();
        assert_eq!(vitals.set(Dial::HeartRate, f64::NAN), None);
        assert_eq!(vitals.heart_rate, 80);
    }

    #[test]
    fn test_request_uses_celsius() {
        let mut vitals = Vitals::default();
        vitals.set(Dial::Temperature, 104.0);
        let body = serde_json::to_value(vitals.to_request()).unwrap();
        assert_eq!(
            body,
            json!({
                "HR": 80,
                "Systolic": 120,
                "Diastolic": 80,
                "SpO2": 98,
                "Temp": 40.0,
                "Movement": 0
            })
        );
        assert_eq!(Vitals::default().temperature_c(), 36.7);
    }

    #[test]
    fn test_dial_parse() {
        assert_eq!("hr".parse::<Dial>().unwrap(), Dial::HeartRate);
        assert_eq!("Temp".parse::<Dial>().unwrap(), Dial::Temperature);
        assert_eq!("SPO2".parse::<Dial>().unwrap(), Dial::SpO2);
        assert!("pulse".parse::<Dial>().is_err());
        for dial in Dial::ALL {
            assert_eq!(dial.key().parse::<Dial>().unwrap(), dial);
        }
    }
}
