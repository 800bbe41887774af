//! Integration tests: normalization equivalence, featurizer determinism,
//! train/predict round-trips, degenerate batches, and store behavior.

use evml_processor::{
    config::{FeaturesConfig, ProcessorConfig, TrainingConfig},
    error::ProcessorError,
    features::{featurize, ColumnSchema},
    predict::{PredictionResult, PredictionService},
    record::{normalize, RawRecord, INPUT_FIELDS},
    service::{KeyedRecord, MlService, PredictManyResponse, PredictResponse, TrainResponse},
    storage::{BundleStore, SessionStore},
    train::Trainer,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;

fn mapping(pairs: &[(&str, Value)]) -> RawRecord {
    RawRecord::Mapping {
        fields: pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    }
}

/// A session in one of four well-separated duration/energy groups.
fn session(group: usize, jitter: f64) -> RawRecord {
    let (energy, duration) = [(5.0, 0.5), (20.0, 2.0), (45.0, 5.0), (80.0, 10.0)][group];
    mapping(&[
        ("user_id", json!(format!("u{group}"))),
        ("energy_consumed_kwh", json!(energy + jitter)),
        ("duration_h", json!(duration + jitter / 10.0)),
        ("charging_cost_eur", json!(energy * 0.3)),
    ])
}

/// 100 sessions, 25 per group, with small deterministic jitter.
fn synthetic_batch() -> Vec<RawRecord> {
    (0..100)
        .map(|i| session(i % 4, (i / 4) as f64 * 0.01))
        .collect()
}

fn test_config(data_dir: &std::path::Path) -> ProcessorConfig {
    ProcessorConfig {
        data_dir: data_dir.to_path_buf(),
        ..ProcessorConfig::default()
    }
}

#[test]
fn all_three_shapes_normalize_identically() {
    let fields: Vec<(&str, Value)> = vec![
        ("user_id", json!("u42")),
        ("energy_consumed_kwh", json!(12.5)),
        ("duration_h", json!(1.5)),
        ("start_time", json!("27/03/25 14:30")),
    ];

    let as_mapping = mapping(&fields);
    let mut values = vec![Value::Null; INPUT_FIELDS.len()];
    for (name, value) in &fields {
        let idx = INPUT_FIELDS.iter().position(|f| f == name).unwrap();
        values[idx] = value.clone();
    }
    let as_positional = RawRecord::Positional { values };
    let object: BTreeMap<String, Value> = fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    let as_encoded = RawRecord::Encoded {
        text: serde_json::to_string(&object).unwrap(),
    };

    let from_mapping = normalize(&as_mapping).unwrap();
    let from_positional = normalize(&as_positional).unwrap();
    let from_encoded = normalize(&as_encoded).unwrap();
    assert_eq!(from_mapping, from_positional);
    assert_eq!(from_mapping, from_encoded);
}

#[test]
fn featurizer_is_deterministic() {
    let rec = normalize(&session(2, 0.07)).unwrap();
    let a = featurize(&rec);
    let b = featurize(&rec);
    assert_eq!(a, b);
    let schema = ColumnSchema::with_time_buckets();
    assert_eq!(a.align(&schema).unwrap(), b.align(&schema).unwrap());
}

#[test]
fn boundary_zeros_do_not_raise() {
    let rec = normalize(&mapping(&[
        ("energy_consumed_kwh", json!(10.0)),
        ("duration_h", json!(0.0)),
        ("battery_capacity_kwh", json!(0.0)),
    ]))
    .unwrap();
    let row = featurize(&rec).align(&ColumnSchema::base()).unwrap();
    let names = ColumnSchema::base();
    let at = |name: &str| {
        let idx = names.names().iter().position(|n| n == name).unwrap();
        row[idx]
    };
    assert_eq!(at("energy_rel"), 0.0);
    assert_eq!(at("intensity"), 0.0);
    assert_eq!(at("soc_delta"), 0.0);
    assert_eq!(at("distance_km"), 0.0);
}

#[test]
fn train_then_predict_round_trips_cluster_ids() {
    let dir = tempfile::tempdir().unwrap();
    let store = BundleStore::new(dir.path());
    let batch = synthetic_batch();

    let trainer = Trainer::new(TrainingConfig::default(), &FeaturesConfig::default());
    let outcome = trainer.fit(&batch).unwrap();
    store.put(&outcome.bundle).unwrap();

    let service = PredictionService::new(&store);
    for (i, record) in batch.iter().enumerate().step_by(7) {
        let result = service.predict_one(record).unwrap();
        assert_eq!(result.cluster, outcome.assignments[i], "row {i}");
    }
}

#[test]
fn scenario_a_group_representative_predicts_majority_cluster() {
    let dir = tempfile::tempdir().unwrap();
    let store = BundleStore::new(dir.path());
    let batch = synthetic_batch();

    let trainer = Trainer::new(TrainingConfig::default(), &FeaturesConfig::default());
    let outcome = trainer.fit(&batch).unwrap();
    store.put(&outcome.bundle).unwrap();

    // Majority training-time assignment of group 1 rows.
    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for (i, &a) in outcome.assignments.iter().enumerate() {
        if i % 4 == 1 {
            *counts.entry(a).or_default() += 1;
        }
    }
    let majority = *counts.iter().max_by_key(|(_, n)| **n).unwrap().0;

    let service = PredictionService::new(&store);
    let result = service.predict_one(&session(1, 0.0)).unwrap();
    assert_eq!(result.cluster, majority);
}

#[test]
fn retraining_same_batch_is_idempotent() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let batch = synthetic_batch();
    let probe = session(3, 0.123);

    let mut results = Vec::new();
    for dir in [&dir_a, &dir_b] {
        let store = BundleStore::new(dir.path());
        let trainer = Trainer::new(TrainingConfig::default(), &FeaturesConfig::default());
        trainer.train(&batch, &store).unwrap();
        results.push(PredictionService::new(&store).predict_one(&probe).unwrap());
    }
    assert_eq!(results[0], results[1]);
}

#[test]
fn scenario_b_missing_fields_still_predict() {
    let dir = tempfile::tempdir().unwrap();
    let service = MlService::new(test_config(dir.path()));
    match service.train(&synthetic_batch()) {
        TrainResponse::Ok { meta } => {
            assert_eq!(meta.record_count, 100);
            assert_eq!(meta.cluster_count, 4);
        }
        TrainResponse::Error { message } => panic!("train failed: {message}"),
    }

    // No station id, no start timestamp.
    let record = mapping(&[
        ("user_id", json!("u9")),
        ("energy_consumed_kwh", json!(21.0)),
        ("duration_h", json!(2.1)),
    ]);
    match service.predict_one(&record) {
        PredictResponse::Ok { result } => {
            assert!(result.cluster < 4);
            assert!(result.density >= -1);
        }
        PredictResponse::Error { message } => panic!("predict failed: {message}"),
    }
}

#[test]
fn scenario_c_predict_before_train_is_missing_model_state() {
    let dir = tempfile::tempdir().unwrap();
    let store = BundleStore::new(dir.path());
    let service = PredictionService::new(&store);
    match service.predict_one(&session(0, 0.0)) {
        Err(ProcessorError::MissingModelState) => {}
        other => panic!("expected MissingModelState, got {other:?}"),
    }

    // And structurally through the envelope.
    let ml = MlService::new(test_config(dir.path()));
    match ml.predict_one(&session(0, 0.0)) {
        PredictResponse::Error { message } => {
            assert!(message.contains("no trained model"), "{message}")
        }
        PredictResponse::Ok { .. } => panic!("expected error envelope"),
    }
}

#[test]
fn predict_many_maps_caller_keys() {
    let dir = tempfile::tempdir().unwrap();
    let service = MlService::new(test_config(dir.path()));
    assert!(matches!(
        service.train(&synthetic_batch()),
        TrainResponse::Ok { .. }
    ));

    let records = vec![
        KeyedRecord {
            key: "s-1".to_string(),
            record: session(0, 0.0),
        },
        KeyedRecord {
            key: "s-2".to_string(),
            record: session(3, 0.0),
        },
    ];
    match service.predict_many(&records) {
        PredictManyResponse::Ok { results } => {
            assert_eq!(results.len(), 2);
            assert!(results.contains_key("s-1") && results.contains_key("s-2"));
            assert_ne!(results["s-1"].cluster, results["s-2"].cluster);
        }
        PredictManyResponse::Error { message } => panic!("predict_many failed: {message}"),
    }
}

#[test]
fn malformed_record_fails_train_structurally() {
    let dir = tempfile::tempdir().unwrap();
    let service = MlService::new(test_config(dir.path()));
    let mut batch = synthetic_batch();
    batch.push(RawRecord::Encoded {
        text: "{definitely not json".to_string(),
    });
    match service.train(&batch) {
        TrainResponse::Error { message } => assert!(message.contains("malformed"), "{message}"),
        TrainResponse::Ok { .. } => panic!("expected malformed-input error"),
    }
}

#[test]
fn empty_and_constant_batches_are_degenerate() {
    let dir = tempfile::tempdir().unwrap();
    let service = MlService::new(test_config(dir.path()));

    match service.train(&[]) {
        TrainResponse::Error { message } => assert!(message.contains("degenerate"), "{message}"),
        TrainResponse::Ok { .. } => panic!("expected degenerate-batch error"),
    }

    let constant: Vec<RawRecord> = (0..20).map(|_| session(1, 0.0)).collect();
    match service.train(&constant) {
        TrainResponse::Error { message } => assert!(message.contains("degenerate"), "{message}"),
        TrainResponse::Ok { .. } => panic!("expected degenerate-batch error"),
    }
}

#[test]
fn envelope_status_mirrors_payload() {
    let ok = TrainResponse::Ok {
        meta: evml_processor::model::BundleMeta {
            record_count: 10,
            feature_count: 18,
            cluster_count: 4,
            trained_at: chrono::Utc::now(),
            seed: 42,
        },
    };
    let v: Value = serde_json::to_value(&ok).unwrap();
    assert_eq!(v["status"], "ok");
    assert_eq!(v["meta"]["record_count"], 10);

    let err = PredictResponse::Error {
        message: "no trained model bundle is available".to_string(),
    };
    let v: Value = serde_json::to_value(&err).unwrap();
    assert_eq!(v["status"], "error");
    assert!(v["message"].as_str().unwrap().contains("no trained model"));
}

#[test]
fn bundle_store_detects_tampering() {
    let dir = tempfile::tempdir().unwrap();
    let store = BundleStore::new(dir.path());
    let trainer = Trainer::new(TrainingConfig::default(), &FeaturesConfig::default());
    let outcome = trainer.fit(&synthetic_batch()).unwrap();
    store.put(&outcome.bundle).unwrap();

    let loaded = store.get().unwrap();
    assert_eq!(loaded.meta, outcome.bundle.meta);
    assert_eq!(loaded.schema, outcome.bundle.schema);

    // Flip a payload field without updating the checksum.
    let raw = std::fs::read_to_string(store.path()).unwrap();
    let mut envelope: Value = serde_json::from_str(&raw).unwrap();
    envelope["bundle"]["meta"]["record_count"] = json!(9999);
    std::fs::write(store.path(), serde_json::to_vec(&envelope).unwrap()).unwrap();

    match store.get() {
        Err(ProcessorError::CorruptBundle(message)) => {
            assert!(message.contains("checksum"), "{message}")
        }
        other => panic!("expected CorruptBundle, got {other:?}"),
    }
}

#[test]
fn retrain_overwrites_previous_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let store = BundleStore::new(dir.path());
    let trainer = Trainer::new(TrainingConfig::default(), &FeaturesConfig::default());

    trainer.train(&synthetic_batch(), &store).unwrap();
    let first = store.get().unwrap();

    let smaller: Vec<RawRecord> = synthetic_batch().into_iter().take(40).collect();
    trainer.train(&smaller, &store).unwrap();
    let second = store.get().unwrap();

    assert_eq!(first.meta.record_count, 100);
    assert_eq!(second.meta.record_count, 40);
}

#[test]
fn session_store_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.db");
    let store = SessionStore::open(&path, b"test-secret").unwrap();
    let result = PredictionResult {
        cluster: 2,
        density: -1,
        anomaly: true,
    };
    store
        .insert_session("s1", 123, r#"{"energy_consumed_kwh":12.5}"#, Some(&result))
        .unwrap();

    let (ts, payload, stored) = store.get_session("s1").unwrap().unwrap();
    assert_eq!(ts, 123);
    assert_eq!(payload, r#"{"energy_consumed_kwh":12.5}"#);
    assert_eq!(stored, Some(result));
    assert_eq!(store.count().unwrap(), 1);
}
