//! Feature derivation from canonical session records and schema alignment.

mod featurize;

pub use featurize::{featurize, parse_session_time};

use crate::error::{ProcessorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Base feature names, in fixed order.
pub const BASE_FEATURES: [&str; 13] = [
    "energy_kwh",
    "duration_h",
    "rate_kw",
    "cost_eur",
    "soc_start",
    "soc_end",
    "soc_delta",
    "distance_km",
    "temperature_c",
    "vehicle_age_years",
    "hour",
    "energy_rel",
    "intensity",
];

/// One-hot time-of-day bucket columns (optional schema variant).
pub const BUCKET_FEATURES: [&str; 5] = [
    "bucket_morning",
    "bucket_midday",
    "bucket_afternoon",
    "bucket_evening",
    "bucket_night",
];

/// Ordered feature-name list fixed at training time. Defines feature-vector
/// layout; inference must align to the persisted schema, never recompute its
/// own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema(Vec<String>);

impl ColumnSchema {
    pub fn base() -> Self {
        Self(BASE_FEATURES.iter().map(|s| s.to_string()).collect())
    }

    pub fn with_time_buckets() -> Self {
        let mut names: Vec<String> = BASE_FEATURES.iter().map(|s| s.to_string()).collect();
        names.extend(BUCKET_FEATURES.iter().map(|s| s.to_string()));
        Self(names)
    }

    pub fn for_config(include_time_buckets: bool) -> Self {
        if include_time_buckets {
            Self::with_time_buckets()
        } else {
            Self::base()
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// Reject schemas naming columns the live featurizer can never produce.
    /// Runs before any numeric computation so a renamed feature surfaces as
    /// [`ProcessorError::TransformMismatch`] instead of a silent zero column.
    pub fn validate(&self) -> Result<()> {
        for name in &self.0 {
            let known = BASE_FEATURES.contains(&name.as_str())
                || BUCKET_FEATURES.contains(&name.as_str());
            if !known {
                return Err(ProcessorError::TransformMismatch(format!(
                    "schema column '{name}' is not a known feature"
                )));
            }
        }
        Ok(())
    }
}

/// Named feature values before schema alignment. Only defined derivations are
/// present; absence is distinct from zero until alignment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedFeatures {
    values: BTreeMap<&'static str, f64>,
}

impl NamedFeatures {
    pub(crate) fn set(&mut self, name: &'static str, value: f64) {
        self.values.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Align to a column schema: schema columns this record did not produce
    /// become zero (the missing-as-zero conflation is deliberate and pinned
    /// by tests), and produced features outside the schema are dropped.
    pub fn align(&self, schema: &ColumnSchema) -> Result<Vec<f64>> {
        schema.validate()?;
        Ok(schema
            .names()
            .iter()
            .map(|name| self.get(name).unwrap_or(0.0))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_zero_fills_missing_columns() {
        let mut nf = NamedFeatures::default();
        nf.set("energy_kwh", 12.0);
        let row = nf.align(&ColumnSchema::with_time_buckets()).unwrap();
        assert_eq!(row.len(), 18);
        assert_eq!(row[0], 12.0);
        assert!(row[1..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn align_drops_features_outside_schema() {
        let mut nf = NamedFeatures::default();
        nf.set("energy_kwh", 12.0);
        nf.set("bucket_night", 1.0);
        let row = nf.align(&ColumnSchema::base()).unwrap();
        assert_eq!(row.len(), BASE_FEATURES.len());
    }

    #[test]
    fn unknown_schema_column_is_transform_mismatch() {
        let schema = ColumnSchema(vec!["energy_kw".to_string()]);
        let nf = NamedFeatures::default();
        assert!(matches!(
            nf.align(&schema),
            Err(crate::error::ProcessorError::TransformMismatch(_))
        ));
    }
}
