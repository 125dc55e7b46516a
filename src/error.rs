use thiserror::Error;

/// Application error type
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid SAS7BDAT file: {0}")]
    Format(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Unsupported SAS7BDAT feature: {0}")]
    Unsupported(String),

    #[error("Not a date value: {0}")]
    NotADate(String),
}
