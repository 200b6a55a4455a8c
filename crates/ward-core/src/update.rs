//! Seriousness updates and the identifiers they carry.
//!
//! The relay never looks inside an update. These types are for the two
//! ends of the pipe: producers build a [`SeriousnessUpdate`], dashboards
//! pull a [`Reading`] back out of whatever payload arrived, without failing.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;
use ward_protocol::Frame;

/// Payload field holding the bed identifier.
pub const FIELD_BED_ID: &str = "bedId";

/// Payload field holding the seriousness level.
pub const FIELD_SERIOUSNESS: &str = "seriousness";

/// Opaque bed identifier.
///
/// Producers may send a string or an integer; both normalize to the same
/// key, so `7` and `"7"` name one bed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct BedId(String);

impl BedId {
    /// Create a bed identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract a bed identifier from a JSON value.
    ///
    /// Accepts non-empty strings and integers. Anything else yields `None`.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(Self(n.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for BedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BedId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<u32> for BedId {
    fn from(n: u32) -> Self {
        Self(n.to_string())
    }
}

impl<'de> Deserialize<'de> for BedId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        BedId::from_value(&value)
            .ok_or_else(|| serde::de::Error::custom("bedId must be a non-empty string or an integer"))
    }
}

/// Error for a seriousness outside the closed range 0..=4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("seriousness {0} outside 0..=4")]
pub struct InvalidSeriousness(pub i64);

/// Ordinal severity, 0 (Low) through 4 (Emergency).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Seriousness(u8);

impl Seriousness {
    /// Lowest level.
    pub const LOW: Seriousness = Seriousness(0);
    /// Highest level; the only one that arms an alarm.
    pub const EMERGENCY: Seriousness = Seriousness(4);

    /// Create a seriousness level, or `None` if out of range.
    #[must_use]
    pub fn new(level: u8) -> Option<Self> {
        (level <= Self::EMERGENCY.0).then_some(Self(level))
    }

    /// The numeric level.
    #[must_use]
    pub fn level(self) -> u8 {
        self.0
    }

    /// Whether this is the maximum severity.
    #[must_use]
    pub fn is_emergency(self) -> bool {
        self == Self::EMERGENCY
    }

    /// Parse a seriousness from a JSON value.
    ///
    /// Only integers in 0..=4 are accepted. Fractions, strings and
    /// out-of-range numbers yield `None`.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_i64().and_then(|n| Self::try_from(n).ok())
    }
}

impl TryFrom<i64> for Seriousness {
    type Error = InvalidSeriousness;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .and_then(Self::new)
            .ok_or(InvalidSeriousness(value))
    }
}

impl From<Seriousness> for u8 {
    fn from(s: Seriousness) -> u8 {
        s.0
    }
}

impl fmt::Display for Seriousness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One bed's seriousness, as a producer submits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriousnessUpdate {
    /// Bed the reading belongs to.
    #[serde(rename = "bedId")]
    pub bed_id: BedId,
    /// Classified severity.
    pub seriousness: Seriousness,
}

impl SeriousnessUpdate {
    /// Create an update.
    #[must_use]
    pub fn new(bed_id: BedId, seriousness: Seriousness) -> Self {
        Self {
            bed_id,
            seriousness,
        }
    }

    /// The JSON payload `{ bedId, seriousness }`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        json!({
            FIELD_BED_ID: self.bed_id.as_str(),
            FIELD_SERIOUSNESS: self.seriousness.level(),
        })
    }

    /// Wrap this update in an `update_seriousness` frame.
    #[must_use]
    pub fn to_frame(&self) -> Frame {
        Frame::update_seriousness(self.to_value())
    }
}

/// A payload as a dashboard sees it: either field may be unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    /// Bed identifier, if present and well-formed.
    pub bed_id: Option<BedId>,
    /// Seriousness, if present and within 0..=4.
    pub seriousness: Option<Seriousness>,
}

impl Reading {
    /// Pull a reading out of an opaque payload without failing.
    #[must_use]
    pub fn from_payload(payload: &Value) -> Self {
        Self {
            bed_id: payload.get(FIELD_BED_ID).and_then(BedId::from_value),
            seriousness: payload.get(FIELD_SERIOUSNESS).and_then(Seriousness::from_value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bed_id_normalizes_integers() {
        assert_eq!(BedId::from_value(&json!(7)), Some(BedId::from("7")));
        assert_eq!(BedId::from_value(&json!("7")), Some(BedId::from(7u32)));
        assert_eq!(BedId::from_value(&json!("")), None);
        assert_eq!(BedId::from_value(&json!(1.5)), None);
        assert_eq!(BedId::from_value(&Value::Null), None);
    }

    #[test]
    fn test_seriousness_range() {
        for level in 0i64..=4 {
            assert_eq!(Seriousness::try_from(level).map(u8::from), Ok(level as u8));
        }
        assert_eq!(Seriousness::try_from(5i64), Err(InvalidSeriousness(5)));
        assert_eq!(Seriousness::try_from(-1i64), Err(InvalidSeriousness(-1)));
        assert!(Seriousness::EMERGENCY.is_emergency());
    }

    #[test]
    fn test_seriousness_rejects_fractions_and_strings() {
        assert_eq!(Seriousness::from_value(&json!(3.5)), None);
        assert_eq!(Seriousness::from_value(&json!("4")), None);
        assert_eq!(Seriousness::from_value(&json!(2)), Seriousness::new(2));
    }

    #[test]
    fn test_update_payload_shape() {
        let update = SeriousnessUpdate::new(BedId::from("3"), Seriousness::EMERGENCY);
        assert_eq!(update.to_value(), json!({"bedId": "3", "seriousness": 4}));

        let parsed: SeriousnessUpdate =
            serde_json::from_value(json!({"bedId": 3, "seriousness": 4})).unwrap();
        assert_eq!(parsed, update);
    }

    #[test]
    fn test_update_deserialize_rejects_out_of_range() {
        let result: Result<SeriousnessUpdate, _> =
            serde_json::from_value(json!({"bedId": "3", "seriousness": 9}));
        assert!(result.is_err());
    }

    #[test]
    fn test_reading_tolerates_garbage() {
        let reading = Reading::from_payload(&json!({"bedId": "2", "seriousness": 7}));
        assert_eq!(reading.bed_id, Some(BedId::from("2")));
        assert_eq!(reading.seriousness, None);

        let reading = Reading::from_payload(&json!("not an object"));
        assert_eq!(reading.bed_id, None);
        assert_eq!(reading.seriousness, None);
    }
}
