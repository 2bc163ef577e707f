//! Simple data models for the UV meter pipeline.

use std::fmt;

use chrono::{DateTime, Utc};

// ---

/// Raw sensor output captured once per tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    // ---
    pub millivolts: f64,
}

/// Risk tiers in ascending order of severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskTier {
    Low,
    Moderate,
    High,
    VeryHigh,
    Extreme,
}

impl RiskTier {
    /// Human readable tier name, also used to build audio clip paths.
    pub fn name(self) -> &'static str {
        // ---
        match self {
            RiskTier::Low => "low",
            RiskTier::Moderate => "moderate",
            RiskTier::High => "high",
            RiskTier::VeryHigh => "very high",
            RiskTier::Extreme => "extreme",
        }
    }

    /// Display tint associated with the tier.
    pub fn color(self) -> &'static str {
        // ---
        match self {
            RiskTier::Low => "green",
            RiskTier::Moderate => "yellow",
            RiskTier::High => "orange",
            RiskTier::VeryHigh => "red",
            RiskTier::Extreme => "violet",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything derived from one [`Reading`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    // ---
    pub uv_index: f64,
    /// UV level in mW/cm^2.
    pub uv_level: f64,
    pub risk_tier: RiskTier,
    /// Upper bound of the matched tier in the risk table.
    pub threshold_upper_bound: f64,
    pub display_color: &'static str,
}

/// Best-effort time and position from the location peripheral.
///
/// Fields are independently optional; a missing peripheral yields
/// [`LocationTimeRecord::default`] with everything absent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LocationTimeRecord {
    // ---
    pub timestamp_utc: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A single cell in a [`LogRecord`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Missing,
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

impl From<Option<f64>> for FieldValue {
    fn from(v: Option<f64>) -> Self {
        v.map_or(FieldValue::Missing, FieldValue::Number)
    }
}

impl From<Option<DateTime<Utc>>> for FieldValue {
    fn from(v: Option<DateTime<Utc>>) -> Self {
        v.map_or(FieldValue::Missing, FieldValue::Timestamp)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        match self {
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Timestamp(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S%:z")),
            FieldValue::Missing => Ok(()),
        }
    }
}

/// Name of the field holding the record timestamp.
pub const TIME_FIELD: &str = "time";

/// One row of the data log: named fields in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogRecord {
    fields: Vec<(String, FieldValue)>,
}

impl LogRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, keeping its original position if the key already exists.
    pub fn insert(&mut self, key: &str, value: impl Into<FieldValue>) {
        // ---
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((key.to_string(), value)),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// The record timestamp, if the `time` field holds one.
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        // ---
        match self.get(TIME_FIELD) {
            Some(FieldValue::Timestamp(t)) => Some(*t),
            _ => None,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &FieldValue> {
        self.fields.iter().map(|(_, v)| v)
    }

    /// Build the standard data-log row from a classification and location fix.
    pub fn from_measurement(classification: &Classification, location: &LocationTimeRecord) -> Self {
        // ---
        LogRecord::new()
            .with("uv_index", classification.uv_index)
            .with("uv_level", classification.uv_level)
            .with(TIME_FIELD, location.timestamp_utc)
            .with("lat", location.latitude)
            .with("lon", location.longitude)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    fn create_test_classification() -> Classification {
        // ---
        Classification {
            uv_index: 3.5,
            uv_level: 42.0,
            risk_tier: RiskTier::Moderate,
            threshold_upper_bound: 5.0,
            display_color: "yellow",
        }
    }

    #[test]
    fn test_tier_names_and_colors() {
        // ---
        assert_eq!(RiskTier::VeryHigh.name(), "very high");
        assert_eq!(RiskTier::Extreme.color(), "violet");
        assert_eq!(RiskTier::Low.to_string(), "low");
        assert!(RiskTier::Low < RiskTier::Extreme);
    }

    #[test]
    fn test_insert_keeps_original_position() {
        // ---
        let mut record = LogRecord::new().with("a", 1.0).with("b", 2.0);
        record.insert("a", 5.0);

        let keys: Vec<&str> = record.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(record.get("a"), Some(&FieldValue::Number(5.0)));
    }

    #[test]
    fn test_record_from_measurement() {
        // ---
        let when = Utc.with_ymd_and_hms(2024, 2, 24, 12, 30, 0).unwrap();
        let location = LocationTimeRecord {
            timestamp_utc: Some(when),
            latitude: Some(48.1),
            longitude: None,
        };
        let record = LogRecord::from_measurement(&create_test_classification(), &location);

        let keys: Vec<&str> = record.keys().collect();
        assert_eq!(keys, vec!["uv_index", "uv_level", "time", "lat", "lon"]);
        assert_eq!(record.timestamp_utc(), Some(when));
        assert_eq!(record.get("lon"), Some(&FieldValue::Missing));
    }

    #[test]
    fn test_field_rendering() {
        // ---
        let when = Utc.with_ymd_and_hms(2024, 2, 24, 8, 5, 9).unwrap();
        assert_eq!(FieldValue::Timestamp(when).to_string(), "2024-02-24 08:05:09+00:00");
        assert_eq!(FieldValue::Number(2.5).to_string(), "2.5");
        assert_eq!(FieldValue::Missing.to_string(), "");
    }

    #[test]
    fn test_missing_time_has_no_timestamp() {
        // ---
        let record = LogRecord::new().with("uv_index", 1.0).with(TIME_FIELD, None::<DateTime<Utc>>);
        assert_eq!(record.timestamp_utc(), None);
    }
}
