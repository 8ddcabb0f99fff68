//! Extraction pipeline error types

use quarry_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    /// The artifact is corrupt or cannot be decoded
    #[error("unreadable input: {0}")]
    Unreadable(String),

    /// An external tool (tesseract, ffmpeg) failed or is missing
    #[error("{tool} failed: {message}")]
    Tool { tool: &'static str, message: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<AppError> for ExtractError {
    fn from(e: AppError) -> Self {
        match e {
            AppError::Database(_) | AppError::DatabaseConnection { .. } => {
                ExtractError::Database(e.to_string())
            }
            AppError::StorageFailure { .. } => ExtractError::Storage(e.to_string()),
            other => ExtractError::Unreadable(other.to_string()),
        }
    }
}

impl ExtractError {
    /// Human-readable reason retained on the failed document
    pub fn reason(&self) -> String {
        format!("ExtractionFailed: {}", self)
    }
}
