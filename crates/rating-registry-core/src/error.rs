//! Error types for the rating registry domain

use thiserror::Error;

/// Result type alias for domain operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Main error type for domain operations
#[derive(Error, Debug)]
pub enum RegistryError {
    /// No promoted model exists yet
    #[error("Model is not available: {0}")]
    ModelNotAvailable(String),

    /// Version directory name could not be parsed
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    /// Checksum mismatch
    #[error("Checksum mismatch for {artifact}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        artifact: String,
        expected: String,
        actual: String,
    },

    /// Column is not part of the table
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Storage location error
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for RegistryError {
    fn from(err: std::io::Error) -> Self {
        RegistryError::IoError(err.to_string())
    }
}
