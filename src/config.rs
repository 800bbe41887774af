//! Processor configuration. Uplink is server-controlled, not user preference.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Data directory (session archive, persisted model bundle)
    pub data_dir: PathBuf,
    /// Feature derivation parameters
    pub features: FeaturesConfig,
    /// Model fitting parameters
    pub training: TrainingConfig,
    /// Uplink: controlled by server policy, not user preference
    pub uplink: UplinkConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    /// Add the five time-of-day bucket columns to the trained schema
    pub include_time_buckets: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Fixed cluster count K for the partition model
    pub clusters: usize,
    /// Random restarts for k-means; the best-inertia solution is kept
    pub restarts: usize,
    /// Lloyd iteration cap per restart
    pub max_iterations: usize,
    /// DBSCAN neighborhood radius (in standardized feature space)
    pub eps: f64,
    /// DBSCAN minimum neighborhood size for a core point
    pub min_samples: usize,
    /// Isolation forest tree count
    pub trees: usize,
    /// Isolation forest subsample size per tree
    pub sample_size: usize,
    /// Expected anomaly fraction; sets the forest score threshold
    pub contamination: f64,
    /// Seed for all randomized fitting
    pub seed: u64,
    /// Wall-clock budget for one train call (seconds)
    pub budget_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UplinkConfig {
    /// Whether uplink is enabled (set by server policy, not user)
    pub enabled: bool,
    /// Endpoint URL when enabled
    pub endpoint: Option<String>,
    /// Stable identifier for this processor instance
    pub source_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".evml"),
            features: FeaturesConfig::default(),
            training: TrainingConfig::default(),
            uplink: UplinkConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            include_time_buckets: true,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            clusters: 4,
            restarts: 10,
            max_iterations: 300,
            eps: 0.5,
            min_samples: 5,
            trees: 100,
            sample_size: 256,
            contamination: 0.05,
            seed: 42,
            budget_secs: 300,
        }
    }
}

impl Default for UplinkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            source_id: None,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl ProcessorConfig {
    /// Load from JSON file if present; otherwise return default
    pub fn load(path: &std::path::Path) -> Self {
        if path.exists() {
            if let Ok(data) = std::fs::read_to_string(path) {
                if let Ok(c) = serde_json::from_str::<ProcessorConfig>(&data) {
                    return c;
                }
            }
        }
        Self::default()
    }
}
