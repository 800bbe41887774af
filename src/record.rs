//! Raw session records and normalization into the canonical field-named form.
//! Records arrive in one of three shapes; normalization is referentially
//! transparent: equal field values through any shape yield equal canonical
//! records.

use crate::error::{ProcessorError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Input field names, in the positional-record order used by the ingestion
/// side (CSV column order of the charging dataset).
pub const INPUT_FIELDS: [&str; 17] = [
    "user_id",
    "vehicle_model",
    "battery_capacity_kwh",
    "station_id",
    "start_time",
    "end_time",
    "energy_consumed_kwh",
    "duration_h",
    "charging_rate_kw",
    "charging_cost_eur",
    "time_of_day",
    "day_of_week",
    "soc_start",
    "soc_end",
    "distance_driven_km",
    "temperature_c",
    "vehicle_age_years",
];

/// A raw session record as delivered by the ingestion collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum RawRecord {
    /// Field-named mapping
    Mapping { fields: BTreeMap<String, Value> },
    /// Values ordered per [`INPUT_FIELDS`]; short sequences leave the tail absent
    Positional { values: Vec<Value> },
    /// JSON-encoded mapping as text
    Encoded { text: String },
}

/// Canonical field-named session record. Absent fields are representable;
/// they are simply not present in the map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    fields: BTreeMap<String, Value>,
}

impl CanonicalRecord {
    pub fn from_fields(fields: BTreeMap<String, Value>) -> Self {
        // Explicit nulls count as absent so all three shapes normalize alike.
        let fields = fields
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .collect();
        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Numeric field value. Accepts JSON numbers and strings with either a
    /// decimal point or a decimal comma; blank strings count as absent.
    pub fn number(&self, field: &str) -> Option<f64> {
        match self.fields.get(field)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => parse_decimal(s),
            _ => None,
        }
    }

    /// Text field value; blank strings count as absent.
    pub fn text(&self, field: &str) -> Option<&str> {
        match self.fields.get(field)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Parse a number that may use a decimal comma, as the source dataset does.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.replace(',', ".").parse::<f64>().ok()
}

/// Normalize a raw record of any shape into a canonical record.
///
/// Mapping input passes through; positional input is zipped by index against
/// [`INPUT_FIELDS`] (surplus values dropped, short tails absent); encoded
/// input must decode to a JSON object or the call fails with
/// [`ProcessorError::MalformedInput`].
pub fn normalize(raw: &RawRecord) -> Result<CanonicalRecord> {
    match raw {
        RawRecord::Mapping { fields } => Ok(CanonicalRecord::from_fields(fields.clone())),
        RawRecord::Positional { values } => {
            let fields = INPUT_FIELDS
                .iter()
                .zip(values.iter())
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect();
            Ok(CanonicalRecord::from_fields(fields))
        }
        RawRecord::Encoded { text } => {
            let parsed: Value = serde_json::from_str(text)
                .map_err(|e| ProcessorError::MalformedInput(format!("undecodable record text: {e}")))?;
            match parsed {
                Value::Object(map) => Ok(CanonicalRecord::from_fields(map.into_iter().collect())),
                other => Err(ProcessorError::MalformedInput(format!(
                    "encoded record must be an object, got {}",
                    json_kind(&other)
                ))),
            }
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
