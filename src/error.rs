//! Typed errors for the processing pipeline. Train/predict callers receive
//! these structurally (`status: error`), never as a panic.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessorError {
    /// Raw record text or shape that cannot be decoded into a session record.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Predict was called before any successful train persisted a bundle.
    #[error("no trained model bundle is available")]
    MissingModelState,

    /// Training batch is empty or carries no usable signal.
    #[error("degenerate training batch: {0}")]
    DegenerateBatch(String),

    /// A persisted column schema and the live featurizer disagree in a way
    /// alignment cannot resolve (e.g. a renamed feature).
    #[error("feature schema mismatch: {0}")]
    TransformMismatch(String),

    /// Training exceeded its configured wall-clock budget.
    #[error("training budget of {budget_secs}s exceeded")]
    Timeout { budget_secs: u64 },

    /// Persisted bundle failed its integrity or version check.
    #[error("corrupt model bundle: {0}")]
    CorruptBundle(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("storage error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProcessorError>;
