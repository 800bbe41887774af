//! Uplink client: report training summaries and session labels to the
//! analytics API. Failures are logged and never affect the pipeline.

use crate::config::UplinkConfig;
use crate::model::BundleMeta;
use crate::predict::PredictionResult;
use chrono::Utc;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Serialize)]
struct SourcePayload {
    source_id: String,
    first_seen: String,
}

#[derive(Serialize)]
struct TrainingPayload {
    source_id: String,
    record_count: usize,
    feature_count: usize,
    cluster_count: usize,
    trained_at: String,
}

#[derive(Serialize)]
struct LabelPayload {
    id: String,
    source_id: String,
    cluster: usize,
    density: i64,
    anomaly: bool,
    ts: String,
}

pub struct UplinkClient {
    client: reqwest::blocking::Client,
    base_url: String,
    source_id: String,
    source_registered: std::sync::atomic::AtomicBool,
}

impl UplinkClient {
    pub fn new(config: UplinkConfig) -> Option<Self> {
        let endpoint = config.endpoint.as_ref()?.trim_end_matches('/');
        let source_id = config
            .source_id
            .clone()
            .unwrap_or_else(|| "evml-processor".to_string());
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .ok()?;
        Some(Self {
            client,
            base_url: endpoint.to_string(),
            source_id,
            source_registered: std::sync::atomic::AtomicBool::new(false),
        })
    }

    fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<(), String> {
        let url = format!("{}{}", self.base_url, path);
        let res = self
            .client
            .post(&url)
            .json(body)
            .send()
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().unwrap_or_default();
            return Err(format!("{} {}", status, text));
        }
        Ok(())
    }

    /// Register this processor instance once (idempotent).
    fn ensure_source(&self) {
        if self
            .source_registered
            .load(std::sync::atomic::Ordering::Relaxed)
        {
            return;
        }
        let payload = SourcePayload {
            source_id: self.source_id.clone(),
            first_seen: Utc::now().to_rfc3339(),
        };
        if self.post("/api/v1/sources", &payload).is_ok() {
            self.source_registered
                .store(true, std::sync::atomic::Ordering::Relaxed);
            info!(source_id = %self.source_id, "uplink source registered");
        } else {
            warn!(source_id = %self.source_id, "uplink source registration failed");
        }
    }

    /// Report a training run's metadata summary.
    pub fn report_training(&self, meta: &BundleMeta) {
        self.ensure_source();
        let payload = TrainingPayload {
            source_id: self.source_id.clone(),
            record_count: meta.record_count,
            feature_count: meta.feature_count,
            cluster_count: meta.cluster_count,
            trained_at: meta.trained_at.to_rfc3339(),
        };
        match self.post("/api/v1/training_runs", &payload) {
            Ok(()) => info!(records = meta.record_count, "uplink training reported"),
            Err(e) => warn!(error = %e, "uplink training report failed"),
        }
    }

    /// Report one session's label triple.
    pub fn report_labels(&self, key: &str, result: &PredictionResult) {
        self.ensure_source();
        let payload = LabelPayload {
            id: key.to_string(),
            source_id: self.source_id.clone(),
            cluster: result.cluster,
            density: result.density,
            anomaly: result.anomaly,
            ts: Utc::now().to_rfc3339(),
        };
        if let Err(e) = self.post("/api/v1/session_labels", &payload) {
            warn!(session = key, error = %e, "uplink label report failed");
        }
    }
}
