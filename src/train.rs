//! Batch training: raw records → feature table → standardizer → three fitted
//! models → atomically persisted bundle.

use crate::config::{FeaturesConfig, TrainingConfig};
use crate::error::{ProcessorError, Result};
use crate::features::{featurize, ColumnSchema};
use crate::model::{dbscan, forest, kmeans, BundleMeta, ModelBundle, StandardScaler, TrainBudget};
use crate::record::{normalize, RawRecord};
use crate::storage::BundleStore;
use chrono::Utc;
use ndarray::Array2;
use tracing::info;

pub struct Trainer {
    config: TrainingConfig,
    schema: ColumnSchema,
}

/// A fitted bundle plus the training-row cluster assignments, for callers
/// that need to inspect what the batch looked like.
pub struct TrainOutcome {
    pub bundle: ModelBundle,
    pub assignments: Vec<usize>,
}

impl Trainer {
    pub fn new(config: TrainingConfig, features: &FeaturesConfig) -> Self {
        Self {
            config,
            schema: ColumnSchema::for_config(features.include_time_buckets),
        }
    }

    /// Normalize and featurize the whole batch into a feature table. A single
    /// malformed record fails the batch; silent partial training would change
    /// model semantics invisibly.
    fn feature_table(&self, records: &[RawRecord]) -> Result<Array2<f64>> {
        if records.is_empty() {
            return Err(ProcessorError::DegenerateBatch(
                "empty training batch".to_string(),
            ));
        }
        let mut flat = Vec::with_capacity(records.len() * self.schema.len());
        for raw in records {
            let canonical = normalize(raw)?;
            let row = featurize(&canonical).align(&self.schema)?;
            flat.extend(row);
        }
        Array2::from_shape_vec((records.len(), self.schema.len()), flat)
            .map_err(|e| ProcessorError::DegenerateBatch(e.to_string()))
    }

    /// Fit the full bundle without persisting it.
    pub fn fit(&self, records: &[RawRecord]) -> Result<TrainOutcome> {
        let budget = TrainBudget::new(self.config.budget_secs);
        let table = self.feature_table(records)?;

        let scaler = StandardScaler::fit(&table)?;
        let scaled = scaler.transform(&table);
        budget.check()?;

        let km = kmeans::fit(
            &scaled,
            self.config.clusters,
            self.config.restarts,
            self.config.max_iterations,
            self.config.seed,
            &budget,
        )?;
        budget.check()?;

        let scaled_rows: Vec<Vec<f64>> = scaled.rows().into_iter().map(|r| r.to_vec()).collect();
        let density = dbscan::fit(&scaled_rows, self.config.eps, self.config.min_samples);
        budget.check()?;

        let outliers = forest::fit(
            &scaled_rows,
            self.config.trees,
            self.config.sample_size,
            self.config.contamination,
            self.config.seed,
        );
        budget.check()?;

        let meta = BundleMeta {
            record_count: records.len(),
            feature_count: self.schema.len(),
            cluster_count: self.config.clusters,
            trained_at: Utc::now(),
            seed: self.config.seed,
        };
        info!(
            records = meta.record_count,
            features = meta.feature_count,
            clusters = meta.cluster_count,
            inertia = km.model.inertia,
            "bundle fitted"
        );

        Ok(TrainOutcome {
            bundle: ModelBundle {
                schema: self.schema.clone(),
                scaler,
                kmeans: km.model,
                density: density.model,
                forest: outliers,
                meta,
            },
            assignments: km.assignments,
        })
    }

    /// Fit and persist, replacing any previous bundle. Returns the training
    /// metadata summary.
    pub fn train(&self, records: &[RawRecord], store: &BundleStore) -> Result<BundleMeta> {
        let outcome = self.fit(records)?;
        store.put(&outcome.bundle)?;
        Ok(outcome.bundle.meta)
    }
}
