//! Pipeline error types
//!
//! Every stage propagates `PipelineError`. Lower-layer failures keep their
//! original cause; gate failures carry the scores that tripped them.

use rating_registry_core::RegistryError;
use rating_registry_store::StoreError;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Pipeline error types
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Persistence failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Domain failure
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// A dataset has no usable rows
    #[error("Dataset is empty: {0}")]
    EmptyDataset(String),

    /// Required columns are absent
    #[error("Missing columns in {dataset}: {}", .columns.join(", "))]
    MissingColumns {
        dataset: String,
        columns: Vec<String>,
    },

    /// Label encoder has never seen this value
    #[error("Unknown category {value:?} in column {column}")]
    UnknownCategory { column: String, value: String },

    /// Non-numeric value where a number is required
    #[error("Non-numeric value {value:?} in column {column}")]
    NonNumeric { column: String, value: String },

    /// Feature matrix does not match what the model was fitted on
    #[error("Shape mismatch: expected {expected} features, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Test score below the accepted minimum
    #[error("Model test score {score:.4} is below the expected score {expected:.4}")]
    BelowExpectedScore { score: f64, expected: f64 },

    /// Train and test scores are too far apart
    #[error(
        "Train/test score difference {difference:.4} exceeds the overfitting threshold {threshold:.4}"
    )]
    Overfitting { difference: f64, threshold: f64 },

    /// Trained model does not beat the promoted one
    #[error("Current model score {current:.4} does not improve on previous score {previous:.4}")]
    ModelNotImproved { current: f64, previous: f64 },

    /// Invalid pipeline configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    /// Check if this error is one of the accuracy gates rather than a fault
    pub fn is_gate_failure(&self) -> bool {
        matches!(
            self,
            PipelineError::BelowExpectedScore { .. }
                | PipelineError::Overfitting { .. }
                | PipelineError::ModelNotImproved { .. }
        )
    }

    /// Check if no promoted model exists
    pub fn is_model_not_available(&self) -> bool {
        match self {
            PipelineError::Registry(RegistryError::ModelNotAvailable(_)) => true,
            PipelineError::Store(err) => err.is_not_found(),
            _ => false,
        }
    }
}
