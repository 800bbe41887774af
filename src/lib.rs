//! EV charging session processor — behavioral clustering and anomaly flags.
//!
//! Modular structure:
//! - [`record`] — Raw session record shapes and normalization
//! - [`features`] — Deterministic feature derivation and schema alignment
//! - [`model`] — Standardizer, k-means, DBSCAN, isolation forest, bundle
//! - [`train`] — Batch fitting and bundle persistence
//! - [`predict`] — Per-record inference against the persisted bundle
//! - [`service`] — Train/predict operations with status envelopes
//! - [`storage`] — Bundle slot and encrypted session archive
//! - [`logging`] — Structured JSON logging

pub mod config;
pub mod error;
pub mod features;
pub mod logging;
pub mod model;
pub mod predict;
pub mod record;
pub mod service;
pub mod storage;
pub mod train;
pub mod uplink;

pub use config::ProcessorConfig;
pub use error::{ProcessorError, Result};
pub use features::ColumnSchema;
pub use model::{BundleMeta, ModelBundle};
pub use predict::{PredictionResult, PredictionService};
pub use record::{CanonicalRecord, RawRecord};
pub use service::MlService;
pub use storage::{BundleStore, SessionStore};
pub use train::Trainer;
pub use uplink::UplinkClient;
