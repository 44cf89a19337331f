//! A fitted model together with the encoders it was trained behind

use ndarray::Array1;
use rating_registry_core::{ArtifactKind, FeatureSchema, Table};
use rating_registry_store::{load_object, BundleFiles, ModelRegistry};
use tracing::debug;

use crate::encoding::{prepare_features, rows_with_target, OneHotTransformer, OrdinalEncoder};
use crate::error::{PipelineError, PipelineResult};
use crate::forest::RandomForest;
use crate::metrics::r2_score;

/// Model, transformer and encoder loaded as one unit
#[derive(Debug, Clone)]
pub struct ModelBundle {
    pub model: RandomForest,
    pub transformer: OneHotTransformer,
    pub encoder: OrdinalEncoder,
}

impl ModelBundle {
    pub fn load(files: &BundleFiles) -> PipelineResult<Self> {
        let bundle = Self {
            model: load_object(&files.model)?,
            transformer: load_object(&files.transformer)?,
            encoder: load_object(&files.encoder)?,
        };
        if bundle.model.n_features() != bundle.transformer.n_features() {
            return Err(PipelineError::ShapeMismatch {
                expected: bundle.model.n_features(),
                actual: bundle.transformer.n_features(),
            });
        }
        debug!(
            model = %files.model.display(),
            features = bundle.model.n_features(),
            "Loaded model bundle"
        );
        Ok(bundle)
    }

    /// Latest promoted bundle
    ///
    /// # Errors
    /// `ModelNotAvailable` when nothing has been promoted.
    pub fn latest(registry: &ModelRegistry) -> PipelineResult<Self> {
        let files = BundleFiles {
            model: registry.latest_path(ArtifactKind::Model)?,
            transformer: registry.latest_path(ArtifactKind::Transformer)?,
            encoder: registry.latest_path(ArtifactKind::Encoder)?,
        };
        Self::load(&files)
    }

    /// Predict every row of a raw table; a target column, if present, is ignored
    pub fn predict(&self, table: &Table, schema: &FeatureSchema) -> PipelineResult<Array1<f64>> {
        let inputs = table.drop_columns(&[schema.target_column.as_str()]);
        let prepared = prepare_features(&inputs, &self.encoder, &self.transformer, schema)?;
        self.model.predict(&prepared.features)
    }

    /// R² on the rows of a raw table that carry a target
    pub fn score(&self, table: &Table, schema: &FeatureSchema) -> PipelineResult<f64> {
        let labelled = rows_with_target(table, &schema.target_column)?;
        if labelled.is_empty() {
            return Err(PipelineError::EmptyDataset(
                "no labelled rows to score".to_string(),
            ));
        }
        let prepared = prepare_features(&labelled, &self.encoder, &self.transformer, schema)?;
        let target = prepared
            .target
            .ok_or_else(|| PipelineError::MissingColumns {
                dataset: "scoring input".to_string(),
                columns: vec![schema.target_column.clone()],
            })?;
        let predicted = self.model.predict(&prepared.features)?;
        Ok(r2_score(&target, &predicted))
    }
}
