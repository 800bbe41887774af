//! Processor entrypoint: serves train/predict requests as NDJSON over
//! stdin/stdout (one request per line, one envelope per line), archiving
//! predicted sessions locally and reporting to the uplink when enabled.

use evml_processor::{
    config::ProcessorConfig,
    logging::StructuredLogger,
    service::{MlService, PredictResponse, Request, TrainResponse},
    storage::SessionStore,
    uplink::UplinkClient,
};
use std::io::{BufRead, Write};
use tracing::{info, warn};

fn handle_line(
    line: &str,
    service: &MlService,
    sessions: &SessionStore,
    uplink: Option<&UplinkClient>,
) -> String {
    let request: Request = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            return serde_json::json!({
                "status": "error",
                "message": format!("malformed request: {e}"),
            })
            .to_string()
        }
    };

    match request {
        Request::Train { records } => {
            let response = service.train(&records);
            if let TrainResponse::Ok { meta } = &response {
                info!(records = meta.record_count, clusters = meta.cluster_count, "trained");
                if let Some(u) = uplink {
                    u.report_training(meta);
                }
            }
            serde_json::to_string(&response).expect("serializable response")
        }
        Request::PredictOne { record, key } => {
            let response = service.predict_one(&record);
            if let PredictResponse::Ok { result } = &response {
                let key = key.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                let ts = chrono::Utc::now().timestamp_millis();
                let payload = serde_json::to_string(&record).unwrap_or_default();
                if let Err(e) = sessions.insert_session(&key, ts, &payload, Some(result)) {
                    warn!(session = %key, error = %e, "session archive failed");
                }
                if let Some(u) = uplink {
                    u.report_labels(&key, result);
                }
            }
            serde_json::to_string(&response).expect("serializable response")
        }
        Request::PredictMany { records } => {
            let response = service.predict_many(&records);
            serde_json::to_string(&response).expect("serializable response")
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config_path = std::env::var("EVML_CONFIG_PATH")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("config.json"));
    let config = ProcessorConfig::load(&config_path);

    StructuredLogger::init(config.log.json, &config.log.level);

    info!(data_dir = ?config.data_dir, "evml processor starting");

    std::fs::create_dir_all(&config.data_dir)?;
    let sessions_path = config.data_dir.join("sessions.db");
    let secret = b"deployment-secret-placeholder"; // In production: from the platform secret store
    let sessions = SessionStore::open(&sessions_path, secret)?;

    let uplink: Option<UplinkClient> = if config.uplink.enabled {
        UplinkClient::new(config.uplink.clone())
    } else {
        None
    };

    let service = MlService::new(config);

    static STOP: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(false);
    let _ = ctrlc::set_handler(|| {
        STOP.store(true, std::sync::atomic::Ordering::Relaxed);
    });

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    for line in stdin.lock().lines() {
        if STOP.load(std::sync::atomic::Ordering::Relaxed) {
            break;
        }
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(&line, &service, &sessions, uplink.as_ref());
        let mut out = stdout.lock();
        writeln!(out, "{response}")?;
        out.flush()?;
    }

    info!("evml processor stopping");
    Ok(())
}
