//! Durable single-slot store for the fitted model bundle.
//!
//! Persist is write-temp → fsync → atomic rename, so a reader never observes
//! a partially written bundle; load reads the whole file once per call and
//! verifies a SHA-256 checksum over the serialized payload.

use crate::error::{ProcessorError, Result};
use crate::model::ModelBundle;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

const BUNDLE_FILE: &str = "model_bundle.json";
const SCHEMA_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct BundleEnvelope {
    schema_version: u32,
    checksum: String,
    bundle: Value,
}

pub struct BundleStore {
    path: PathBuf,
}

impl BundleStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(BUNDLE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Persist a bundle, replacing any previous one atomically.
    pub fn put(&self, bundle: &ModelBundle) -> Result<()> {
        let payload = serde_json::to_value(bundle)?;
        let envelope = BundleEnvelope {
            schema_version: SCHEMA_VERSION,
            checksum: checksum_of(&payload)?,
            bundle: payload,
        };
        let serialized = serde_json::to_vec(&envelope)?;

        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&serialized)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Load the persisted bundle. Absence is [`ProcessorError::MissingModelState`];
    /// a failed version or checksum gate is [`ProcessorError::CorruptBundle`].
    pub fn get(&self) -> Result<ModelBundle> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProcessorError::MissingModelState)
            }
            Err(e) => return Err(e.into()),
        };

        let envelope: BundleEnvelope = serde_json::from_slice(&data)
            .map_err(|e| ProcessorError::CorruptBundle(format!("unreadable envelope: {e}")))?;
        if envelope.schema_version != SCHEMA_VERSION {
            return Err(ProcessorError::CorruptBundle(format!(
                "schema version {} (expected {})",
                envelope.schema_version, SCHEMA_VERSION
            )));
        }
        let expected = checksum_of(&envelope.bundle)?;
        if expected != envelope.checksum {
            return Err(ProcessorError::CorruptBundle(
                "payload checksum mismatch".to_string(),
            ));
        }

        serde_json::from_value(envelope.bundle)
            .map_err(|e| ProcessorError::CorruptBundle(format!("undecodable payload: {e}")))
    }
}

fn checksum_of(payload: &Value) -> Result<String> {
    let canonical = serde_json::to_vec(payload)?;
    let mut h = Sha256::new();
    h.update(&canonical);
    Ok(format!("{:x}", h.finalize()))
}
