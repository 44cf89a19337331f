//! Training and prediction pipeline for restaurant ratings
//!
//! The training pipeline runs six stages, each consuming the artifact of
//! the one before it:
//!
//! - **DataIngestion**: collection to feature store and train/test CSVs
//! - **DataValidation**: required columns, missing values, drift report
//! - **DataTransformation**: fitted encoder and transformer, feature matrices
//! - **ModelTrainer**: random-forest regressor behind two accuracy gates
//! - **ModelEvaluation**: comparison with the latest promoted model
//! - **ModelPusher**: promotion into the model registry
//!
//! The **Predictor** serves the latest promoted bundle for single inputs and
//! batch files.
//!
//! # Example
//!
//! ```rust,no_run
//! use rating_registry_pipeline::{PipelineSettings, TrainingPipeline, TrainingPipelineConfig};
//! use rating_registry_store::FileDocumentStore;
//! use std::sync::Arc;
//!
//! # fn example() -> rating_registry_pipeline::PipelineResult<()> {
//! let config = TrainingPipelineConfig::new("artifact", "saved_models", PipelineSettings::default())?;
//! let store = Arc::new(FileDocumentStore::new("data"));
//! let outcome = TrainingPipeline::new(config, store).run()?;
//! println!("promoted {}", outcome.pusher);
//! # Ok(())
//! # }
//! ```

pub mod bundle;
pub mod config;
pub mod encoding;
pub mod error;
pub mod evaluation;
pub mod forest;
pub mod ingestion;
pub mod metrics;
pub mod predictor;
pub mod pusher;
pub mod trainer;
pub mod training;
pub mod transformation;
pub mod tree;
pub mod tuning;
pub mod validation;

// Re-exports for convenience
pub use bundle::ModelBundle;
pub use config::{
    DataIngestionConfig, DataTransformationConfig, DataValidationConfig, IngestionSettings,
    ModelEvaluationConfig, ModelPusherConfig, ModelTrainerConfig, PipelineSettings,
    TrainerSettings, TrainingPipelineConfig, ValidationSettings,
};
pub use encoding::{
    fit_encoders, prepare_features, LabelEncoder, OneHotTransformer, OrdinalEncoder,
    PreparedData,
};
pub use error::{PipelineError, PipelineResult};
pub use evaluation::ModelEvaluation;
pub use forest::{ForestParams, RandomForest};
pub use ingestion::{train_test_split, DataIngestion};
pub use metrics::{mean_squared_error, r2_score};
pub use predictor::{Predictor, RatingInput, PREDICTION_COLUMN};
pub use pusher::ModelPusher;
pub use trainer::ModelTrainer;
pub use training::{TrainingOutcome, TrainingPipeline};
pub use transformation::{split_target, with_target, DataTransformation};
pub use tree::MaxFeatures;
pub use tuning::{KFold, ParamGrid, RandomizedSearch, SearchParams};
pub use validation::{ColumnDrift, DataValidation, ValidationReport};

/// Pipeline version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
