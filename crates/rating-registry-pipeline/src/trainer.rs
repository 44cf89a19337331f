//! Model training stage

use ndarray::{Array1, Array2};
use rating_registry_core::{DataTransformationArtifact, ModelTrainerArtifact};
use rating_registry_store::{load_array, save_object};
use tracing::{debug, info, instrument};

use crate::config::ModelTrainerConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::forest::RandomForest;
use crate::metrics::r2_score;
use crate::transformation::split_target;
use crate::tuning::{ParamGrid, RandomizedSearch};

/// Model training stage
pub struct ModelTrainer {
    config: ModelTrainerConfig,
}

impl ModelTrainer {
    pub fn new(config: ModelTrainerConfig) -> Self {
        Self { config }
    }

    /// Fit the forest, searching hyper-parameters first when tuning is on
    pub fn train_model(&self, x: &Array2<f64>, y: &Array1<f64>) -> PipelineResult<RandomForest> {
        let settings = &self.config.settings;
        let params = if settings.tune {
            RandomizedSearch::new(ParamGrid::default(), settings.search.clone())
                .run(x, y, &settings.forest)?
                .best
        } else {
            settings.forest.clone()
        };
        debug!(?params, "Fitting model");
        RandomForest::fit(x, y, &params)
    }

    /// Reject a model whose scores fail either gate
    pub fn check_gates(&self, r2_train_score: f64, r2_test_score: f64) -> PipelineResult<()> {
        let settings = &self.config.settings;
        if r2_test_score < settings.expected_score {
            return Err(PipelineError::BelowExpectedScore {
                score: r2_test_score,
                expected: settings.expected_score,
            });
        }

        let difference = (r2_train_score - r2_test_score).abs();
        if difference > settings.overfitting_threshold {
            return Err(PipelineError::Overfitting {
                difference,
                threshold: settings.overfitting_threshold,
            });
        }
        Ok(())
    }

    #[instrument(skip_all, fields(tune = self.config.settings.tune))]
    pub fn initiate_model_training(
        &self,
        transformation: &DataTransformationArtifact,
    ) -> PipelineResult<ModelTrainerArtifact> {
        let (x_train, y_train) =
            split_target(&load_array(transformation.transformed_train_file_path())?)?;
        let (x_test, y_test) =
            split_target(&load_array(transformation.transformed_test_file_path())?)?;

        let model = self.train_model(&x_train, &y_train)?;
        let r2_train_score = r2_score(&y_train, &model.predict(&x_train)?);
        let r2_test_score = r2_score(&y_test, &model.predict(&x_test)?);
        info!(r2_train_score, r2_test_score, "Scored trained model");

        self.check_gates(r2_train_score, r2_test_score)?;

        save_object(&self.config.model_file_path, &model)?;
        info!(path = %self.config.model_file_path.display(), "Saved model");

        Ok(ModelTrainerArtifact::new(
            &self.config.model_file_path,
            r2_train_score,
            r2_test_score,
        ))
    }
}
