//! Model evaluation stage
//!
//! Compares the freshly trained bundle with the latest promoted one on the
//! raw test split. Each bundle preprocesses the split with its own encoder
//! and transformer.

use rating_registry_core::{
    DataIngestionArtifact, DataTransformationArtifact, ModelEvaluationArtifact,
    ModelTrainerArtifact,
};
use rating_registry_store::{read_csv, BundleFiles, ModelRegistry};
use tracing::{info, instrument};

use crate::bundle::ModelBundle;
use crate::config::ModelEvaluationConfig;
use crate::error::{PipelineError, PipelineResult};

/// Model evaluation stage
pub struct ModelEvaluation {
    config: ModelEvaluationConfig,
    registry: ModelRegistry,
}

impl ModelEvaluation {
    pub fn new(config: ModelEvaluationConfig, registry: ModelRegistry) -> Self {
        Self { config, registry }
    }

    #[instrument(skip_all, fields(registry = %self.registry.root().display()))]
    pub fn initiate_model_evaluation(
        &self,
        ingestion: &DataIngestionArtifact,
        transformation: &DataTransformationArtifact,
        trainer: &ModelTrainerArtifact,
    ) -> PipelineResult<ModelEvaluationArtifact> {
        let Some(latest) = self.registry.latest_version() else {
            info!("No promoted model, accepting the first one");
            return Ok(ModelEvaluationArtifact::first_model());
        };

        let schema = &self.config.schema;
        let previous = ModelBundle::latest(&self.registry)?;
        let current = ModelBundle::load(&BundleFiles {
            model: trainer.model_file_path().to_path_buf(),
            transformer: transformation.transformer_object_file_path().to_path_buf(),
            encoder: transformation.encoder_object_file_path().to_path_buf(),
        })?;

        let test = read_csv(ingestion.test_file_path())?;
        let previous_score = previous.score(&test, schema)?;
        let current_score = current.score(&test, schema)?;
        info!(
            previous_version = %latest,
            previous_score,
            current_score,
            "Compared against promoted model"
        );

        if current_score <= previous_score {
            return Err(PipelineError::ModelNotImproved {
                current: current_score,
                previous: previous_score,
            });
        }
        Ok(ModelEvaluationArtifact::improved(
            current_score - previous_score,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_registry_accepts_first_model() {
        let dir = TempDir::new().unwrap();
        let registry = ModelRegistry::open(dir.path().join("saved_models")).unwrap();
        let evaluation = ModelEvaluation::new(
            ModelEvaluationConfig {
                schema: Default::default(),
            },
            registry,
        );

        // Nothing is read when there is no previous model
        let artifact = evaluation
            .initiate_model_evaluation(
                &DataIngestionArtifact::new("a.csv", "b.csv", "c.csv"),
                &DataTransformationArtifact::new("t", "e", "tr", "te"),
                &ModelTrainerArtifact::new("m", 0.9, 0.9),
            )
            .unwrap();
        assert!(artifact.is_model_accepted());
        assert_eq!(artifact.improved_accuracy(), None);
    }
}
