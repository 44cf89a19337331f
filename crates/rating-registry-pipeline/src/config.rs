//! Pipeline configuration
//!
//! `PipelineSettings` is the tunable part, deserialized from the
//! application configuration. `TrainingPipelineConfig` pins one run to a
//! timestamped artifact directory and derives every stage's file layout
//! from it:
//!
//! ```text
//! artifact/<mmddyy__HHMMSS>/
//!   data_ingestion/feature_store/zomato.csv
//!   data_ingestion/datasets/{train,test}.csv
//!   data_validation/report.yaml
//!   data_transformation/transformer/transformer.json
//!   data_transformation/encoder/encoder.json
//!   data_transformation/transformed/{train,test}.json
//!   model_trainer/model/model.json
//!   model_pusher/saved_models/{model,transformer,encoder}/...
//! ```

use chrono::Local;
use rating_registry_core::{ArtifactKind, FeatureSchema};
use rating_registry_store::bundle_path;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};
use crate::forest::ForestParams;
use crate::tuning::SearchParams;

/// Timestamp format of artifact directory names
pub const RUN_ID_FORMAT: &str = "%m%d%y__%H%M%S";

pub const FEATURE_STORE_FILE_NAME: &str = "zomato.csv";
pub const TRAIN_FILE_NAME: &str = "train.csv";
pub const TEST_FILE_NAME: &str = "test.csv";
pub const REPORT_FILE_NAME: &str = "report.yaml";
pub const TRANSFORMED_TRAIN_FILE_NAME: &str = "train.json";
pub const TRANSFORMED_TEST_FILE_NAME: &str = "test.json";

/// Where raw records come from and how they are split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionSettings {
    pub database: String,
    pub collection: String,
    /// Fraction of rows held out for testing
    pub test_size: f64,
    /// Seed of the train/test shuffle
    pub seed: u64,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            database: "Zomato".to_string(),
            collection: "Restaurant".to_string(),
            test_size: 0.3,
            seed: 42,
        }
    }
}

/// Data validation thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Columns with a larger missing fraction are reported
    pub missing_threshold: f64,
    /// Reference dataset for drift checks; skipped when absent
    pub base_file_path: Option<PathBuf>,
    /// KS p-value above which two samples count as the same distribution
    pub p_value_threshold: f64,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            missing_threshold: 0.3,
            base_file_path: Some(PathBuf::from("cleaned_zomato.csv")),
            p_value_threshold: 0.05,
        }
    }
}

/// Model training and its gates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerSettings {
    /// Minimum accepted R² on the test split
    pub expected_score: f64,
    /// Maximum accepted |train R² - test R²|
    pub overfitting_threshold: f64,
    pub forest: ForestParams,
    /// Run a randomized hyper-parameter search before the final fit
    pub tune: bool,
    pub search: SearchParams,
}

impl Default for TrainerSettings {
    fn default() -> Self {
        Self {
            expected_score: 0.8,
            overfitting_threshold: 0.1,
            forest: ForestParams::default(),
            tune: false,
            search: SearchParams::default(),
        }
    }
}

/// Tunable settings of the training pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub schema: FeatureSchema,
    pub ingestion: IngestionSettings,
    pub validation: ValidationSettings,
    pub trainer: TrainerSettings,
}

impl PipelineSettings {
    /// Reject settings no run could succeed with
    pub fn validate(&self) -> PipelineResult<()> {
        self.schema.validate()?;

        let test_size = self.ingestion.test_size;
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "test_size must be in (0, 1), got {}",
                test_size
            )));
        }
        if !(0.0..=1.0).contains(&self.validation.missing_threshold) {
            return Err(PipelineError::InvalidConfig(format!(
                "missing_threshold must be in [0, 1], got {}",
                self.validation.missing_threshold
            )));
        }
        if self.trainer.overfitting_threshold < 0.0 {
            return Err(PipelineError::InvalidConfig(
                "overfitting_threshold cannot be negative".to_string(),
            ));
        }
        self.trainer.forest.validate()?;
        if self.trainer.tune {
            self.trainer.search.validate()?;
        }
        Ok(())
    }
}

/// Paths and settings of one training run
#[derive(Debug, Clone)]
pub struct TrainingPipelineConfig {
    run_id: String,
    artifact_dir: PathBuf,
    registry_dir: PathBuf,
    settings: PipelineSettings,
}

impl TrainingPipelineConfig {
    /// Start a run named after the current local time
    pub fn new(
        artifact_root: impl AsRef<Path>,
        registry_dir: impl Into<PathBuf>,
        settings: PipelineSettings,
    ) -> PipelineResult<Self> {
        let run_id = Local::now().format(RUN_ID_FORMAT).to_string();
        Self::with_run_id(artifact_root, run_id, registry_dir, settings)
    }

    /// Start a run with an explicit identifier
    pub fn with_run_id(
        artifact_root: impl AsRef<Path>,
        run_id: impl Into<String>,
        registry_dir: impl Into<PathBuf>,
        settings: PipelineSettings,
    ) -> PipelineResult<Self> {
        settings.validate()?;
        let run_id = run_id.into();
        if run_id.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "run id cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            artifact_dir: artifact_root.as_ref().join(&run_id),
            run_id,
            registry_dir: registry_dir.into(),
            settings,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    pub fn registry_dir(&self) -> &Path {
        &self.registry_dir
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn data_ingestion(&self) -> DataIngestionConfig {
        let dir = self.artifact_dir.join("data_ingestion");
        DataIngestionConfig {
            feature_store_file_path: dir.join("feature_store").join(FEATURE_STORE_FILE_NAME),
            train_file_path: dir.join("datasets").join(TRAIN_FILE_NAME),
            test_file_path: dir.join("datasets").join(TEST_FILE_NAME),
            settings: self.settings.ingestion.clone(),
            features_to_drop: self.settings.schema.features_to_drop.clone(),
        }
    }

    pub fn data_validation(&self) -> DataValidationConfig {
        DataValidationConfig {
            report_file_path: self
                .artifact_dir
                .join("data_validation")
                .join(REPORT_FILE_NAME),
            settings: self.settings.validation.clone(),
            schema: self.settings.schema.clone(),
        }
    }

    pub fn data_transformation(&self) -> DataTransformationConfig {
        let dir = self.artifact_dir.join("data_transformation");
        DataTransformationConfig {
            transformer_object_file_path: bundle_path(&dir, ArtifactKind::Transformer),
            encoder_object_file_path: bundle_path(&dir, ArtifactKind::Encoder),
            transformed_train_file_path: dir
                .join("transformed")
                .join(TRANSFORMED_TRAIN_FILE_NAME),
            transformed_test_file_path: dir.join("transformed").join(TRANSFORMED_TEST_FILE_NAME),
            schema: self.settings.schema.clone(),
        }
    }

    pub fn model_trainer(&self) -> ModelTrainerConfig {
        let dir = self.artifact_dir.join("model_trainer");
        ModelTrainerConfig {
            model_file_path: bundle_path(&dir, ArtifactKind::Model),
            settings: self.settings.trainer.clone(),
        }
    }

    pub fn model_evaluation(&self) -> ModelEvaluationConfig {
        ModelEvaluationConfig {
            schema: self.settings.schema.clone(),
        }
    }

    pub fn model_pusher(&self) -> ModelPusherConfig {
        ModelPusherConfig {
            pusher_model_dir: self.artifact_dir.join("model_pusher").join("saved_models"),
            run_id: self.run_id.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DataIngestionConfig {
    pub feature_store_file_path: PathBuf,
    pub train_file_path: PathBuf,
    pub test_file_path: PathBuf,
    pub settings: IngestionSettings,
    pub features_to_drop: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DataValidationConfig {
    pub report_file_path: PathBuf,
    pub settings: ValidationSettings,
    pub schema: FeatureSchema,
}

#[derive(Debug, Clone)]
pub struct DataTransformationConfig {
    pub transformer_object_file_path: PathBuf,
    pub encoder_object_file_path: PathBuf,
    pub transformed_train_file_path: PathBuf,
    pub transformed_test_file_path: PathBuf,
    pub schema: FeatureSchema,
}

#[derive(Debug, Clone)]
pub struct ModelTrainerConfig {
    pub model_file_path: PathBuf,
    pub settings: TrainerSettings,
}

#[derive(Debug, Clone)]
pub struct ModelEvaluationConfig {
    pub schema: FeatureSchema,
}

#[derive(Debug, Clone)]
pub struct ModelPusherConfig {
    /// Local copy of the promoted bundle inside the run directory
    pub pusher_model_dir: PathBuf,
    pub run_id: String,
}
