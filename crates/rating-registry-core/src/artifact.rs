//! Artifact records passed between pipeline stages
//!
//! Each stage produces exactly one of these records and the next stage
//! consumes it. Fields are private and only readable, so a record cannot be
//! altered once its stage has returned it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::types::ModelVersion;

/// Output of data ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataIngestionArtifact {
    feature_store_file_path: PathBuf,
    train_file_path: PathBuf,
    test_file_path: PathBuf,
}

impl DataIngestionArtifact {
    pub fn new(
        feature_store_file_path: impl Into<PathBuf>,
        train_file_path: impl Into<PathBuf>,
        test_file_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            feature_store_file_path: feature_store_file_path.into(),
            train_file_path: train_file_path.into(),
            test_file_path: test_file_path.into(),
        }
    }

    /// Full collection snapshot as CSV
    pub fn feature_store_file_path(&self) -> &Path {
        &self.feature_store_file_path
    }

    pub fn train_file_path(&self) -> &Path {
        &self.train_file_path
    }

    pub fn test_file_path(&self) -> &Path {
        &self.test_file_path
    }
}

/// Output of data validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataValidationArtifact {
    report_file_path: PathBuf,
}

impl DataValidationArtifact {
    pub fn new(report_file_path: impl Into<PathBuf>) -> Self {
        Self {
            report_file_path: report_file_path.into(),
        }
    }

    pub fn report_file_path(&self) -> &Path {
        &self.report_file_path
    }
}

/// Output of data transformation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTransformationArtifact {
    transformer_object_file_path: PathBuf,
    encoder_object_file_path: PathBuf,
    transformed_train_file_path: PathBuf,
    transformed_test_file_path: PathBuf,
}

impl DataTransformationArtifact {
    pub fn new(
        transformer_object_file_path: impl Into<PathBuf>,
        encoder_object_file_path: impl Into<PathBuf>,
        transformed_train_file_path: impl Into<PathBuf>,
        transformed_test_file_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transformer_object_file_path: transformer_object_file_path.into(),
            encoder_object_file_path: encoder_object_file_path.into(),
            transformed_train_file_path: transformed_train_file_path.into(),
            transformed_test_file_path: transformed_test_file_path.into(),
        }
    }

    /// Fitted one-hot transformer for nominal features
    pub fn transformer_object_file_path(&self) -> &Path {
        &self.transformer_object_file_path
    }

    /// Fitted label encoder for ordinal features
    pub fn encoder_object_file_path(&self) -> &Path {
        &self.encoder_object_file_path
    }

    /// `[features..., target]` matrix of the train split
    pub fn transformed_train_file_path(&self) -> &Path {
        &self.transformed_train_file_path
    }

    /// `[features..., target]` matrix of the test split
    pub fn transformed_test_file_path(&self) -> &Path {
        &self.transformed_test_file_path
    }
}

/// Output of model training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTrainerArtifact {
    model_file_path: PathBuf,
    r2_train_score: f64,
    r2_test_score: f64,
}

impl ModelTrainerArtifact {
    pub fn new(model_file_path: impl Into<PathBuf>, r2_train_score: f64, r2_test_score: f64) -> Self {
        Self {
            model_file_path: model_file_path.into(),
            r2_train_score,
            r2_test_score,
        }
    }

    pub fn model_file_path(&self) -> &Path {
        &self.model_file_path
    }

    pub fn r2_train_score(&self) -> f64 {
        self.r2_train_score
    }

    pub fn r2_test_score(&self) -> f64 {
        self.r2_test_score
    }
}

/// Output of model evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEvaluationArtifact {
    is_model_accepted: bool,
    improved_accuracy: Option<f64>,
}

impl ModelEvaluationArtifact {
    /// Accepted with nothing to compare against
    pub fn first_model() -> Self {
        Self {
            is_model_accepted: true,
            improved_accuracy: None,
        }
    }

    /// Accepted because it beat the previous model by `improved_accuracy`
    pub fn improved(improved_accuracy: f64) -> Self {
        Self {
            is_model_accepted: true,
            improved_accuracy: Some(improved_accuracy),
        }
    }

    pub fn is_model_accepted(&self) -> bool {
        self.is_model_accepted
    }

    /// `None` when there was no previous model
    pub fn improved_accuracy(&self) -> Option<f64> {
        self.improved_accuracy
    }
}

/// Output of model pushing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPusherArtifact {
    pusher_model_dir: PathBuf,
    saved_model_dir: PathBuf,
    version: ModelVersion,
}

impl ModelPusherArtifact {
    pub fn new(
        pusher_model_dir: impl Into<PathBuf>,
        saved_model_dir: impl Into<PathBuf>,
        version: ModelVersion,
    ) -> Self {
        Self {
            pusher_model_dir: pusher_model_dir.into(),
            saved_model_dir: saved_model_dir.into(),
            version,
        }
    }

    /// Copy of the bundle inside the run's artifact directory
    pub fn pusher_model_dir(&self) -> &Path {
        &self.pusher_model_dir
    }

    /// Registry root the bundle was promoted into
    pub fn saved_model_dir(&self) -> &Path {
        &self.saved_model_dir
    }

    /// Version the bundle was promoted as
    pub fn version(&self) -> ModelVersion {
        self.version
    }
}

impl fmt::Display for ModelPusherArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "version {} in {}",
            self.version,
            self.saved_model_dir.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluation_constructors() {
        let first = ModelEvaluationArtifact::first_model();
        assert!(first.is_model_accepted());
        assert_eq!(first.improved_accuracy(), None);

        let better = ModelEvaluationArtifact::improved(0.03);
        assert_eq!(better.improved_accuracy(), Some(0.03));
    }

    #[test]
    fn test_pusher_display() {
        let artifact = ModelPusherArtifact::new("run/model_pusher", "saved_models", ModelVersion::new(4));
        assert_eq!(artifact.to_string(), "version 4 in saved_models");
    }
}
