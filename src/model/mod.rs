//! Fitted model state: the persisted bundle and its component models.

pub mod dbscan;
pub mod forest;
pub mod kmeans;
pub mod scaler;

pub use dbscan::{DbscanModel, NOISE};
pub use forest::IsolationForest;
pub use kmeans::KMeansModel;
pub use scaler::StandardScaler;

use crate::error::{ProcessorError, Result};
use crate::features::ColumnSchema;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Training metadata returned to the caller and persisted with the bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleMeta {
    pub record_count: usize,
    pub feature_count: usize,
    pub cluster_count: usize,
    pub trained_at: DateTime<Utc>,
    pub seed: u64,
}

/// The complete persisted artifact. Created only by the trainer, consumed
/// only by the prediction service; a retrain replaces it wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle {
    pub schema: ColumnSchema,
    pub scaler: StandardScaler,
    pub kmeans: KMeansModel,
    pub density: DbscanModel,
    pub forest: IsolationForest,
    pub meta: BundleMeta,
}

/// Wall-clock budget for one train call, checked between fitting stages and
/// k-means restarts.
#[derive(Debug, Clone)]
pub struct TrainBudget {
    started: Instant,
    budget_secs: u64,
}

impl TrainBudget {
    pub fn new(budget_secs: u64) -> Self {
        Self {
            started: Instant::now(),
            budget_secs,
        }
    }

    pub fn check(&self) -> Result<()> {
        if self.started.elapsed() > Duration::from_secs(self.budget_secs) {
            return Err(ProcessorError::Timeout {
                budget_secs: self.budget_secs,
            });
        }
        Ok(())
    }
}
