// Error types for the anidex client core.
// Covers stats API errors, snapshot persistence errors, and general failures.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnidexError {
    #[error("Stats API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, AnidexError>;
