//! Structured JSON logging for ingestion and audit.

mod format;

pub use format::{LogEvent, StructuredLogger};
