//! Store-specific error types and conversions
//!
//! This module provides error types for persistence operations: the
//! document store, file I/O and the model registry directory.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Store-specific errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem error with the path that caused it
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File does not exist
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Malformed CSV input
    #[error("CSV error: {0}")]
    Csv(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid data format
    #[error("Invalid data format: {0}")]
    InvalidData(String),

    /// Target version directory already present
    #[error("Version {0} already exists in the registry")]
    VersionExists(u64),

    /// Domain error from core crate
    #[error("Domain error: {0}")]
    Domain(#[from] rating_registry_core::RegistryError),
}

impl StoreError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if this error is a missing file or missing model
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound(_)
                | StoreError::Domain(rating_registry_core::RegistryError::ModelNotAvailable(_))
        )
    }
}

/// Convert bare I/O errors when no path is at hand
impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

/// Convert CSV errors
impl From<csv::Error> for StoreError {
    fn from(err: csv::Error) -> Self {
        StoreError::Csv(format!("{}", err))
    }
}

/// Convert serde_json errors
impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(format!("{}", err))
    }
}

/// Convert serde_yaml errors
impl From<serde_yaml::Error> for StoreError {
    fn from(err: serde_yaml::Error) -> Self {
        StoreError::Serialization(format!("{}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rating_registry_core::RegistryError;

    #[test]
    fn test_error_classification() {
        let missing = StoreError::NotFound(PathBuf::from("model.json"));
        assert!(missing.is_not_found());

        let no_model = StoreError::from(RegistryError::ModelNotAvailable("empty".to_string()));
        assert!(no_model.is_not_found());

        let exists = StoreError::VersionExists(3);
        assert!(!exists.is_not_found());
    }

    #[test]
    fn test_error_display() {
        let err = StoreError::VersionExists(4);
        assert_eq!(err.to_string(), "Version 4 already exists in the registry");

        let err = StoreError::NotFound(PathBuf::from("a/b.csv"));
        assert_eq!(err.to_string(), "File not found: a/b.csv");
    }
}
