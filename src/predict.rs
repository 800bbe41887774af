//! Per-record inference against the latest persisted bundle. Every call
//! loads the bundle fresh and whole; nothing is cached across calls, so a
//! concurrent retrain can never be observed half-written.

use crate::error::Result;
use crate::features::featurize;
use crate::model::ModelBundle;
use crate::record::{normalize, RawRecord};
use crate::storage::BundleStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label triple for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Partition-cluster id, nearest fitted centroid.
    pub cluster: usize,
    /// Density-cluster label; −1 is the noise sentinel.
    pub density: i64,
    /// Outlier-ensemble decision.
    pub anomaly: bool,
}

pub struct PredictionService<'a> {
    store: &'a BundleStore,
}

impl<'a> PredictionService<'a> {
    pub fn new(store: &'a BundleStore) -> Self {
        Self { store }
    }

    /// Label one raw record with the latest persisted bundle.
    pub fn predict_one(&self, record: &RawRecord) -> Result<PredictionResult> {
        let bundle = self.store.get()?;
        predict_with(&bundle, record)
    }

    /// Label a keyed batch. The bundle is read once for the whole call so
    /// every record in the batch sees the same model state.
    pub fn predict_many(
        &self,
        records: &[(String, RawRecord)],
    ) -> Result<BTreeMap<String, PredictionResult>> {
        let bundle = self.store.get()?;
        let mut results = BTreeMap::new();
        for (key, record) in records {
            results.insert(key.clone(), predict_with(&bundle, record)?);
        }
        Ok(results)
    }
}

/// The shared inference path: normalize → featurize → align to the bundle's
/// schema → standardize with the persisted scaler → read all three models.
pub fn predict_with(bundle: &ModelBundle, record: &RawRecord) -> Result<PredictionResult> {
    let canonical = normalize(record)?;
    let aligned = featurize(&canonical).align(&bundle.schema)?;
    let scaled = bundle.scaler.transform_row(&aligned);

    Ok(PredictionResult {
        cluster: bundle.kmeans.nearest(&scaled),
        density: bundle.density.label(&scaled),
        anomaly: bundle.forest.is_anomaly(&scaled),
    })
}
