//! Pure derivation of named features from a canonical record.
//!
//! Determinism contract: identical canonical input yields identical output on
//! every call, and training and inference share this exact code path.

use super::NamedFeatures;
use crate::record::CanonicalRecord;
use chrono::{DateTime, NaiveDateTime, Timelike};

/// Timestamp format of the source dataset, e.g. `27/03/25 14:30`.
const DATASET_TIME_FORMAT: &str = "%d/%m/%y %H:%M";

/// Parse a session timestamp: dataset format first, RFC 3339 as fallback for
/// streaming producers.
pub fn parse_session_time(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    NaiveDateTime::parse_from_str(trimmed, DATASET_TIME_FORMAT)
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|dt| dt.naive_utc())
        })
}

/// Derive named features from one canonical record.
///
/// Direct numeric fields stay undefined when absent or unparseable, except
/// `distance_km` which defaults to 0 when absent (asymmetry inherited from
/// the source pipeline, preserved and pinned by tests). Ratio features are
/// defined only when their guards hold. Undefined features become zero at
/// schema alignment, not here.
pub fn featurize(record: &CanonicalRecord) -> NamedFeatures {
    let mut out = NamedFeatures::default();

    let energy = record.number("energy_consumed_kwh");
    let duration = record.number("duration_h");

    if let Some(v) = energy {
        out.set("energy_kwh", v);
    }
    if let Some(v) = duration {
        out.set("duration_h", v);
    }
    if let Some(v) = record.number("charging_rate_kw") {
        out.set("rate_kw", v);
    }
    if let Some(v) = record.number("charging_cost_eur") {
        out.set("cost_eur", v);
    }

    let soc_start = record.number("soc_start");
    let soc_end = record.number("soc_end");
    if let Some(v) = soc_start {
        out.set("soc_start", v);
    }
    if let Some(v) = soc_end {
        out.set("soc_end", v);
    }
    if let (Some(start), Some(end)) = (soc_start, soc_end) {
        out.set("soc_delta", end - start);
    }

    out.set(
        "distance_km",
        record.number("distance_driven_km").unwrap_or(0.0),
    );

    if let Some(v) = record.number("temperature_c") {
        out.set("temperature_c", v);
    }
    if let Some(v) = record.number("vehicle_age_years") {
        out.set("vehicle_age_years", v);
    }

    let hour = record
        .text("start_time")
        .and_then(parse_session_time)
        .map(|dt| f64::from(dt.hour()));
    if let Some(h) = hour {
        out.set("hour", h);
        let bucket = bucket_for_hour(h as u32);
        for name in super::BUCKET_FEATURES {
            out.set(name, if name == bucket { 1.0 } else { 0.0 });
        }
    }

    if let (Some(e), Some(capacity)) = (energy, record.number("battery_capacity_kwh")) {
        if capacity > 0.0 {
            out.set("energy_rel", e / capacity);
        }
    }
    if let (Some(e), Some(d)) = (energy, duration) {
        if d > 0.0 {
            out.set("intensity", e / d);
        }
    }

    out
}

fn bucket_for_hour(hour: u32) -> &'static str {
    match hour {
        5..=10 => "bucket_morning",
        11..=14 => "bucket_midday",
        15..=18 => "bucket_afternoon",
        19..=22 => "bucket_evening",
        _ => "bucket_night",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{normalize, RawRecord};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn record(pairs: &[(&str, serde_json::Value)]) -> CanonicalRecord {
        let fields: BTreeMap<String, serde_json::Value> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        normalize(&RawRecord::Mapping { fields }).unwrap()
    }

    #[test]
    fn dataset_timestamp_yields_hour_and_bucket() {
        let rec = record(&[("start_time", json!("27/03/25 14:30"))]);
        let nf = featurize(&rec);
        assert_eq!(nf.get("hour"), Some(14.0));
        assert_eq!(nf.get("bucket_midday"), Some(1.0));
        assert_eq!(nf.get("bucket_morning"), Some(0.0));
    }

    #[test]
    fn rfc3339_fallback() {
        let rec = record(&[("start_time", json!("2025-03-27T23:10:00+00:00"))]);
        let nf = featurize(&rec);
        assert_eq!(nf.get("hour"), Some(23.0));
        assert_eq!(nf.get("bucket_night"), Some(1.0));
    }

    #[test]
    fn missing_timestamp_leaves_hour_and_buckets_undefined() {
        let rec = record(&[("energy_consumed_kwh", json!(10.0))]);
        let nf = featurize(&rec);
        assert_eq!(nf.get("hour"), None);
        assert_eq!(nf.get("bucket_night"), None);
    }

    #[test]
    fn distance_defaults_to_zero_when_absent() {
        let nf = featurize(&record(&[]));
        assert_eq!(nf.get("distance_km"), Some(0.0));
        assert_eq!(nf.get("energy_kwh"), None);
    }

    #[test]
    fn ratio_guards_hold_at_zero_denominators() {
        let rec = record(&[
            ("energy_consumed_kwh", json!(10.0)),
            ("duration_h", json!(0.0)),
            ("battery_capacity_kwh", json!(0.0)),
        ]);
        let nf = featurize(&rec);
        assert_eq!(nf.get("intensity"), None);
        assert_eq!(nf.get("energy_rel"), None);
    }

    #[test]
    fn soc_delta_needs_both_endpoints() {
        let nf = featurize(&record(&[("soc_start", json!(20.0))]));
        assert_eq!(nf.get("soc_delta"), None);

        let nf = featurize(&record(&[
            ("soc_start", json!("20,5")),
            ("soc_end", json!(80.0)),
        ]));
        assert_eq!(nf.get("soc_delta"), Some(59.5));
    }
}
