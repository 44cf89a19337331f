//! Training pipeline orchestrator
//!
//! Runs ingestion, validation, transformation, training, evaluation and
//! pushing in order. The first failing stage aborts the run; the artifacts
//! of completed stages stay on disk under the run directory.

use rating_registry_core::{
    DataIngestionArtifact, DataTransformationArtifact, DataValidationArtifact,
    ModelEvaluationArtifact, ModelPusherArtifact, ModelTrainerArtifact,
};
use rating_registry_store::{DocumentStore, ModelRegistry};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::config::TrainingPipelineConfig;
use crate::error::PipelineResult;
use crate::evaluation::ModelEvaluation;
use crate::ingestion::DataIngestion;
use crate::pusher::ModelPusher;
use crate::trainer::ModelTrainer;
use crate::transformation::DataTransformation;
use crate::validation::DataValidation;

/// Artifacts of a completed run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub run_id: String,
    pub ingestion: DataIngestionArtifact,
    pub validation: DataValidationArtifact,
    pub transformation: DataTransformationArtifact,
    pub trainer: ModelTrainerArtifact,
    pub evaluation: ModelEvaluationArtifact,
    pub pusher: ModelPusherArtifact,
}

/// End-to-end training run
pub struct TrainingPipeline {
    config: TrainingPipelineConfig,
    store: Arc<dyn DocumentStore>,
}

impl TrainingPipeline {
    pub fn new(config: TrainingPipelineConfig, store: Arc<dyn DocumentStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &TrainingPipelineConfig {
        &self.config
    }

    #[instrument(skip(self), fields(run_id = %self.config.run_id()))]
    pub fn run(&self) -> PipelineResult<TrainingOutcome> {
        let config = &self.config;
        info!(artifact_dir = %config.artifact_dir().display(), "Starting training run");

        let ingestion = DataIngestion::new(config.data_ingestion(), Arc::clone(&self.store))
            .initiate_data_ingestion()?;
        info!("Data ingestion completed");

        let validation = DataValidation::new(config.data_validation())
            .initiate_data_validation(ingestion.train_file_path(), ingestion.test_file_path())?;
        info!("Data validation completed");

        let transformation = DataTransformation::new(config.data_transformation())
            .initiate_data_transformation(
                ingestion.train_file_path(),
                ingestion.test_file_path(),
            )?;
        info!("Data transformation completed");

        let trainer =
            ModelTrainer::new(config.model_trainer()).initiate_model_training(&transformation)?;
        info!("Model training completed");

        let registry = ModelRegistry::open(config.registry_dir())?;
        let evaluation = ModelEvaluation::new(config.model_evaluation(), registry.clone())
            .initiate_model_evaluation(&ingestion, &transformation, &trainer)?;
        info!("Model evaluation completed");

        let pusher = ModelPusher::new(config.model_pusher(), registry).initiate_model_pusher(
            &transformation,
            &trainer,
            &evaluation,
        )?;
        info!(version = %pusher.version(), "Model pusher completed");

        Ok(TrainingOutcome {
            run_id: config.run_id().to_string(),
            ingestion,
            validation,
            transformation,
            trainer,
            evaluation,
            pusher,
        })
    }
}
