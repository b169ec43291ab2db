//! Error types for the SeeTrue engine

use thiserror::Error;

/// Errors that can occur while ingesting, cleaning, or submitting a recording
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("The uploaded file is empty or has no header row")]
    EmptyInput,

    #[error("Missing required columns: found [{}], expected [{}]", found.join(", "), expected.join(", "))]
    MissingColumns {
        found: Vec<String>,
        expected: Vec<String>,
    },

    #[error("Column {column} has {actual} values, expected {expected}")]
    ColumnLengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid batch size: {0} (must be at least 1)")]
    InvalidBatchSize(usize),

    #[error("Unknown job key: {0}")]
    JobNotFound(String),
}
