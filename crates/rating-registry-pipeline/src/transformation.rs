//! Data transformation stage
//!
//! Fits the encoder and transformer on the train split only, then turns
//! both splits into `[features..., target]` matrices.

use ndarray::{concatenate, s, Array1, Array2, Axis};
use rating_registry_core::{DataTransformationArtifact, Table};
use rating_registry_store::{read_csv, save_array, save_object};
use std::path::Path;
use tracing::{info, instrument};

use crate::config::DataTransformationConfig;
use crate::encoding::{
    fit_encoders, prepare_features, rows_with_target, OneHotTransformer, OrdinalEncoder,
};
use crate::error::{PipelineError, PipelineResult};

/// Append the target as the last matrix column
pub fn with_target(features: &Array2<f64>, target: &Array1<f64>) -> PipelineResult<Array2<f64>> {
    if features.nrows() != target.len() {
        return Err(PipelineError::ShapeMismatch {
            expected: features.nrows(),
            actual: target.len(),
        });
    }
    let column = target.view().insert_axis(Axis(1));
    concatenate(Axis(1), &[features.view(), column]).map_err(|_| PipelineError::ShapeMismatch {
        expected: features.nrows(),
        actual: target.len(),
    })
}

/// Split a `[features..., target]` matrix back into features and target
pub fn split_target(matrix: &Array2<f64>) -> PipelineResult<(Array2<f64>, Array1<f64>)> {
    let width = matrix.ncols();
    if width < 2 {
        return Err(PipelineError::ShapeMismatch {
            expected: 2,
            actual: width,
        });
    }
    Ok((
        matrix.slice(s![.., ..width - 1]).to_owned(),
        matrix.column(width - 1).to_owned(),
    ))
}

/// Data transformation stage
pub struct DataTransformation {
    config: DataTransformationConfig,
}

impl DataTransformation {
    pub fn new(config: DataTransformationConfig) -> Self {
        Self { config }
    }

    fn load_split(&self, path: &Path, name: &str) -> PipelineResult<Table> {
        let table = rows_with_target(&read_csv(path)?, &self.config.schema.target_column)?;
        if table.is_empty() {
            return Err(PipelineError::EmptyDataset(format!(
                "{} split has no rows with a target",
                name
            )));
        }
        Ok(table)
    }

    fn matrix(
        &self,
        table: &Table,
        encoder: &OrdinalEncoder,
        transformer: &OneHotTransformer,
    ) -> PipelineResult<Array2<f64>> {
        let schema = &self.config.schema;
        let prepared = prepare_features(table, encoder, transformer, schema)?;
        let target = prepared
            .target
            .ok_or_else(|| PipelineError::MissingColumns {
                dataset: "transformation input".to_string(),
                columns: vec![schema.target_column.clone()],
            })?;
        with_target(&prepared.features, &target)
    }

    #[instrument(skip(self, train_file_path, test_file_path), fields(
        train = %train_file_path.display(),
        test = %test_file_path.display()
    ))]
    pub fn initiate_data_transformation(
        &self,
        train_file_path: &Path,
        test_file_path: &Path,
    ) -> PipelineResult<DataTransformationArtifact> {
        let train = self.load_split(train_file_path, "train")?;
        let test = self.load_split(test_file_path, "test")?;

        let (encoder, transformer) = fit_encoders(&train, &self.config.schema)?;
        let train_matrix = self.matrix(&train, &encoder, &transformer)?;
        let test_matrix = self.matrix(&test, &encoder, &transformer)?;

        save_array(&self.config.transformed_train_file_path, &train_matrix)?;
        save_array(&self.config.transformed_test_file_path, &test_matrix)?;
        save_object(&self.config.transformer_object_file_path, &transformer)?;
        save_object(&self.config.encoder_object_file_path, &encoder)?;

        info!(
            train_rows = train_matrix.nrows(),
            test_rows = test_matrix.nrows(),
            features = transformer.n_features(),
            "Transformed datasets"
        );

        Ok(DataTransformationArtifact::new(
            &self.config.transformer_object_file_path,
            &self.config.encoder_object_file_path,
            &self.config.transformed_train_file_path,
            &self.config.transformed_test_file_path,
        ))
    }
}
