//! SQLite-backed session archive with AES-GCM encryption of the raw payload
//! column. Key derived from a deployment-bound secret.

use crate::error::{ProcessorError, Result};
use crate::predict::PredictionResult;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::RngCore;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

fn derive_key(seed: &[u8]) -> [u8; KEY_LEN] {
    use ring::digest;
    let mut out = [0u8; KEY_LEN];
    let h = digest::digest(&digest::SHA256, seed);
    out[..h.as_ref().len().min(KEY_LEN)].copy_from_slice(h.as_ref());
    out
}

fn encrypt(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<String> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| ProcessorError::Crypto(format!("{e:?}")))?;
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt((&nonce).into(), plaintext)
        .map_err(|e| ProcessorError::Crypto(format!("{e:?}")))?;
    let mut out = nonce.to_vec();
    out.extend(ciphertext);
    Ok(BASE64.encode(&out))
}

fn decrypt(key: &[u8; KEY_LEN], encoded: &str) -> Result<Vec<u8>> {
    let raw = BASE64
        .decode(encoded)
        .map_err(|e| ProcessorError::Crypto(e.to_string()))?;
    if raw.len() < NONCE_LEN {
        return Err(ProcessorError::Crypto("payload too short".to_string()));
    }
    let (nonce, ct) = raw.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| ProcessorError::Crypto(format!("{e:?}")))?;
    cipher
        .decrypt(nonce.into(), ct)
        .map_err(|e| ProcessorError::Crypto(format!("{e:?}")))
}

pub struct SessionStore {
    conn: Mutex<Connection>,
    key: [u8; KEY_LEN],
}

impl SessionStore {
    /// Open or create the archive at path. Key is derived from `secret`.
    pub fn open(path: &Path, secret: &[u8]) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                ts INTEGER NOT NULL,
                payload_enc TEXT NOT NULL,
                cluster INTEGER,
                density INTEGER,
                anomaly INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_ts ON sessions(ts);
            CREATE TABLE IF NOT EXISTS meta (k TEXT PRIMARY KEY, v TEXT);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            key: derive_key(secret),
        })
    }

    /// Insert a session (raw payload stored encrypted) with its labels, if any.
    pub fn insert_session(
        &self,
        id: &str,
        ts: i64,
        payload_json: &str,
        result: Option<&PredictionResult>,
    ) -> Result<()> {
        let enc = encrypt(&self.key, payload_json.as_bytes())?;
        let (cluster, density, anomaly) = match result {
            Some(r) => (
                Some(r.cluster as i64),
                Some(r.density),
                Some(r.anomaly as i64),
            ),
            None => (None, None, None),
        };
        self.conn.lock().unwrap().execute(
            "INSERT OR REPLACE INTO sessions (id, ts, payload_enc, cluster, density, anomaly)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, ts, enc, cluster, density, anomaly],
        )?;
        Ok(())
    }

    /// Read a session by id (decrypts the payload).
    pub fn get_session(&self, id: &str) -> Result<Option<(i64, String, Option<PredictionResult>)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT ts, payload_enc, cluster, density, anomaly FROM sessions WHERE id = ?1",
        )?;
        let mut rows = stmt.query(params![id])?;
        if let Some(row) = rows.next()? {
            let ts: i64 = row.get(0)?;
            let enc: String = row.get(1)?;
            let cluster: Option<i64> = row.get(2)?;
            let density: Option<i64> = row.get(3)?;
            let anomaly: Option<i64> = row.get(4)?;
            let plain = decrypt(&self.key, &enc)?;
            let payload = String::from_utf8(plain).unwrap_or_default();
            let result = match (cluster, density, anomaly) {
                (Some(c), Some(d), Some(a)) => Some(PredictionResult {
                    cluster: c as usize,
                    density: d,
                    anomaly: a != 0,
                }),
                _ => None,
            };
            return Ok(Some((ts, payload, result)));
        }
        Ok(None)
    }

    pub fn count(&self) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))?;
        Ok(n as u64)
    }

    /// Retention: delete sessions older than the given timestamp.
    pub fn prune_before(&self, ts: i64) -> Result<u64> {
        let n = self
            .conn
            .lock()
            .unwrap()
            .execute("DELETE FROM sessions WHERE ts < ?1", params![ts])?;
        Ok(n as u64)
    }
}
