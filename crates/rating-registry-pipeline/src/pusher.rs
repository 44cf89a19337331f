//! Model pusher stage
//!
//! Copies the accepted bundle into the run directory and promotes it into
//! the registry as the next version.

use rating_registry_core::{
    ArtifactKind, DataTransformationArtifact, ModelEvaluationArtifact, ModelPusherArtifact,
    ModelTrainerArtifact, Provenance,
};
use rating_registry_store::{load_object, BundleFiles, ModelRegistry, StoreError};
use std::fs;
use tracing::{info, instrument};

use crate::config::ModelPusherConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::forest::RandomForest;

/// Model pusher stage
pub struct ModelPusher {
    config: ModelPusherConfig,
    registry: ModelRegistry,
}

impl ModelPusher {
    pub fn new(config: ModelPusherConfig, registry: ModelRegistry) -> Self {
        Self { config, registry }
    }

    /// Registry as updated by the last push
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    fn copy_bundle(&self, source: &BundleFiles) -> PipelineResult<BundleFiles> {
        let local = BundleFiles::in_dir(&self.config.pusher_model_dir);
        for kind in ArtifactKind::ALL {
            let dest = local.path(kind);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
            }
            fs::copy(source.path(kind), dest).map_err(|e| StoreError::io(source.path(kind), e))?;
        }
        Ok(local)
    }

    #[instrument(skip_all, fields(run_id = %self.config.run_id))]
    pub fn initiate_model_pusher(
        &mut self,
        transformation: &DataTransformationArtifact,
        trainer: &ModelTrainerArtifact,
        evaluation: &ModelEvaluationArtifact,
    ) -> PipelineResult<ModelPusherArtifact> {
        if !evaluation.is_model_accepted() {
            return Err(PipelineError::InvalidConfig(
                "refusing to push a model that evaluation did not accept".to_string(),
            ));
        }

        let source = BundleFiles {
            model: trainer.model_file_path().to_path_buf(),
            transformer: transformation.transformer_object_file_path().to_path_buf(),
            encoder: transformation.encoder_object_file_path().to_path_buf(),
        };
        let local = self.copy_bundle(&source)?;
        info!(dir = %self.config.pusher_model_dir.display(), "Copied bundle into run directory");

        let model: RandomForest = load_object(&local.model)?;
        let provenance = Provenance::builder(&self.config.run_id)
            .scores(trainer.r2_train_score(), trainer.r2_test_score())
            .improved_accuracy(evaluation.improved_accuracy())
            .metadata("n_estimators", model.n_trees().to_string())
            .metadata("n_features", model.n_features().to_string())
            .metadata(
                "forest_params",
                serde_json::to_string(model.params()).map_err(StoreError::from)?,
            )
            .build()?;

        let version = self.registry.promote(&local, provenance)?;
        let artifact = ModelPusherArtifact::new(
            &self.config.pusher_model_dir,
            self.registry.root(),
            version,
        );
        info!(%artifact, "Pushed model");
        Ok(artifact)
    }
}
