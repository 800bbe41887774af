//! The remote-operation surface: train / predict_one / predict_many with
//! status envelopes. Transport plumbing lives outside; the envelope's
//! `status` field is the single source of truth for success or failure.

use crate::config::ProcessorConfig;
use crate::model::BundleMeta;
use crate::predict::{PredictionResult, PredictionService};
use crate::record::RawRecord;
use crate::storage::BundleStore;
use crate::train::Trainer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// One record of a keyed batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyedRecord {
    pub key: String,
    pub record: RawRecord,
}

/// Inbound request, one per delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Train {
        records: Vec<RawRecord>,
    },
    PredictOne {
        record: RawRecord,
        #[serde(default)]
        key: Option<String>,
    },
    PredictMany {
        records: Vec<KeyedRecord>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrainResponse {
    Ok { meta: BundleMeta },
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PredictResponse {
    Ok { result: PredictionResult },
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PredictManyResponse {
    Ok {
        results: BTreeMap<String, PredictionResult>,
    },
    Error {
        message: String,
    },
}

/// Synchronous facade over trainer and prediction service. Holds no model
/// state of its own; the persisted bundle is the only shared artifact.
pub struct MlService {
    config: ProcessorConfig,
    bundles: BundleStore,
}

impl MlService {
    pub fn new(config: ProcessorConfig) -> Self {
        let bundles = BundleStore::new(&config.data_dir);
        Self { config, bundles }
    }

    pub fn bundle_store(&self) -> &BundleStore {
        &self.bundles
    }

    pub fn train(&self, records: &[RawRecord]) -> TrainResponse {
        let trainer = Trainer::new(self.config.training.clone(), &self.config.features);
        match trainer.train(records, &self.bundles) {
            Ok(meta) => TrainResponse::Ok { meta },
            Err(e) => {
                warn!(error = %e, "train failed");
                TrainResponse::Error {
                    message: e.to_string(),
                }
            }
        }
    }

    pub fn predict_one(&self, record: &RawRecord) -> PredictResponse {
        let service = PredictionService::new(&self.bundles);
        match service.predict_one(record) {
            Ok(result) => PredictResponse::Ok { result },
            Err(e) => PredictResponse::Error {
                message: e.to_string(),
            },
        }
    }

    pub fn predict_many(&self, records: &[KeyedRecord]) -> PredictManyResponse {
        let keyed: Vec<(String, RawRecord)> = records
            .iter()
            .map(|kr| (kr.key.clone(), kr.record.clone()))
            .collect();
        let service = PredictionService::new(&self.bundles);
        match service.predict_many(&keyed) {
            Ok(results) => PredictManyResponse::Ok { results },
            Err(e) => PredictManyResponse::Error {
                message: e.to_string(),
            },
        }
    }
}
