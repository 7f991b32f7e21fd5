//! Error types for core state operations.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core state operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Session or project (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A setting was outside its accepted domain.
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),
}
