//! Rating prediction with the latest promoted bundle
//!
//! A [`Predictor`] loads the model, transformer and encoder once and reuses
//! them for single inputs and batch files alike.

use chrono::Local;
use rating_registry_core::{Cell, FeatureSchema, ModelVersion, RegistryError, Table};
use rating_registry_store::{read_csv, write_csv, BundleFiles, ModelRegistry, StoreError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use crate::bundle::ModelBundle;
use crate::error::{PipelineError, PipelineResult};

/// Column appended to batch prediction output
pub const PREDICTION_COLUMN: &str = "prediction";

/// Timestamp appended to the stem of batch output files
pub const PREDICTION_FILE_TIME_FORMAT: &str = "%m%d%Y__%H%M%S";

/// One restaurant as entered by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingInput {
    pub online_order: String,
    pub book_table: String,
    pub location: String,
    pub rest_type: String,
    pub cuisines: String,
    pub approx_cost: f64,
    pub votes: u32,
}

impl RatingInput {
    /// Single-row table with the input's field names as columns
    pub fn to_table(&self) -> PipelineResult<Table> {
        let mut table = Table::new(
            [
                "online_order",
                "book_table",
                "location",
                "rest_type",
                "cuisines",
                "approx_cost",
                "votes",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        );
        table.push_row(vec![
            Cell::Text(self.online_order.clone()),
            Cell::Text(self.book_table.clone()),
            Cell::Text(self.location.clone()),
            Cell::Text(self.rest_type.clone()),
            Cell::Text(self.cuisines.clone()),
            Cell::Number(self.approx_cost),
            Cell::Number(f64::from(self.votes)),
        ])?;
        Ok(table)
    }
}

/// Predicts ratings with one loaded bundle
#[derive(Debug, Clone)]
pub struct Predictor {
    bundle: ModelBundle,
    schema: FeatureSchema,
    version: ModelVersion,
}

impl Predictor {
    /// Load the latest bundle of a registry
    ///
    /// # Errors
    /// `ModelNotAvailable` when nothing has been promoted.
    #[instrument(skip_all, fields(registry = %registry.root().display()))]
    pub fn from_registry(registry: &ModelRegistry, schema: FeatureSchema) -> PipelineResult<Self> {
        let version = registry.latest_version().ok_or_else(|| {
            RegistryError::ModelNotAvailable(format!(
                "no model in registry {}",
                registry.root().display()
            ))
        })?;
        let bundle = ModelBundle::load(&BundleFiles::in_dir(&registry.version_dir(version)))?;
        info!(%version, "Loaded model for prediction");
        Ok(Self {
            bundle,
            schema,
            version,
        })
    }

    /// Version the predictor was loaded from
    pub fn version(&self) -> ModelVersion {
        self.version
    }

    /// Predict every row; extra columns and the target are ignored
    pub fn predict_table(&self, table: &Table) -> PipelineResult<Vec<f64>> {
        Ok(self.bundle.predict(table, &self.schema)?.to_vec())
    }

    /// Predicted rating of one input, rounded to one decimal
    pub fn predict_one(&self, input: &RatingInput) -> PipelineResult<f64> {
        let predicted = self.predict_table(&input.to_table()?)?;
        let value = predicted.first().copied().ok_or_else(|| {
            PipelineError::EmptyDataset("prediction produced no rows".to_string())
        })?;
        debug!(?input, value, "Predicted single input");
        Ok((value * 10.0).round() / 10.0)
    }

    /// Predict a CSV file and write the original rows plus a prediction
    /// column to `<prediction_dir>/<stem><timestamp>.csv`
    #[instrument(skip(self), fields(version = %self.version))]
    pub fn start_batch_prediction(
        &self,
        input_file_path: &Path,
        prediction_dir: &Path,
    ) -> PipelineResult<PathBuf> {
        let mut table = read_csv(input_file_path)?;
        let predictions = self.predict_table(&table)?;
        table.add_column(
            PREDICTION_COLUMN,
            predictions.into_iter().map(Cell::Number).collect(),
        )?;

        let stem = input_file_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_name = format!(
            "{}{}.csv",
            stem,
            Local::now().format(PREDICTION_FILE_TIME_FORMAT)
        );
        let output = prediction_dir.join(file_name);
        write_csv(&output, &table)?;
        info!(rows = table.len(), output = %output.display(), "Batch prediction completed");
        Ok(output)
    }

    /// Run batch prediction for every `.csv` file of a directory, in name order
    #[instrument(skip(self), fields(version = %self.version))]
    pub fn batch_predict_dir(
        &self,
        input_dir: &Path,
        prediction_dir: &Path,
    ) -> PipelineResult<Vec<PathBuf>> {
        let entries = fs::read_dir(input_dir).map_err(|e| StoreError::io(input_dir, e))?;
        let mut inputs = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| StoreError::io(input_dir, e))?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "csv") {
                inputs.push(path);
            }
        }
        inputs.sort();

        let mut outputs = Vec::with_capacity(inputs.len());
        for input in &inputs {
            outputs.push(self.start_batch_prediction(input, prediction_dir)?);
        }
        info!(files = outputs.len(), "Batch directory completed");
        Ok(outputs)
    }
}
