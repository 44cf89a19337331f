//! Random-forest regressor
//!
//! Bagged CART trees averaged at prediction time. Each tree draws its own
//! seed from a generator seeded with `ForestParams::seed`, so a fit is
//! reproducible for a given dataset and parameter set.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::tree::{DecisionTree, MaxFeatures, TreeParams};

/// Hyper-parameters of the forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_estimators: usize,
    /// `None` grows trees until leaves are pure
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: Some(300),
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            bootstrap: true,
            seed: 42,
        }
    }
}

impl ForestParams {
    pub fn validate(&self) -> PipelineResult<()> {
        if self.n_estimators == 0 {
            return Err(PipelineError::InvalidConfig(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if self.max_depth == Some(0) {
            return Err(PipelineError::InvalidConfig(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if self.min_samples_split < 2 {
            return Err(PipelineError::InvalidConfig(
                "min_samples_split must be at least 2".to_string(),
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(PipelineError::InvalidConfig(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features,
        }
    }
}

/// Fitted random-forest regressor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Fit a forest on a feature matrix and target vector
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, params: &ForestParams) -> PipelineResult<Self> {
        params.validate()?;
        if x.nrows() == 0 {
            return Err(PipelineError::EmptyDataset(
                "cannot fit a forest on zero rows".to_string(),
            ));
        }
        if x.nrows() != y.len() {
            return Err(PipelineError::ShapeMismatch {
                expected: x.nrows(),
                actual: y.len(),
            });
        }

        let n = x.nrows();
        let tree_params = params.tree_params();
        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut trees = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            let mut tree_rng = StdRng::seed_from_u64(rng.gen());
            let samples: Vec<usize> = if params.bootstrap {
                (0..n).map(|_| tree_rng.gen_range(0..n)).collect()
            } else {
                (0..n).collect()
            };
            trees.push(DecisionTree::fit(
                x.view(),
                y.view(),
                samples,
                &tree_params,
                &mut tree_rng,
            ));
        }

        debug!(
            trees = trees.len(),
            rows = n,
            features = x.ncols(),
            "Fitted random forest"
        );

        Ok(Self {
            params: params.clone(),
            n_features: x.ncols(),
            trees,
        })
    }

    /// Predict every row of a feature matrix
    pub fn predict(&self, x: &Array2<f64>) -> PipelineResult<Array1<f64>> {
        self.check_width(x.ncols())?;
        Ok(x.axis_iter(Axis(0)).map(|row| self.average(row)).collect())
    }

    /// Predict a single feature row
    pub fn predict_row(&self, row: &[f64]) -> PipelineResult<f64> {
        self.check_width(row.len())?;
        Ok(self.average(ArrayView1::from(row)))
    }

    fn average(&self, row: ArrayView1<'_, f64>) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.predict_row(row)).sum();
        total / self.trees.len() as f64
    }

    fn check_width(&self, width: usize) -> PipelineResult<()> {
        if width != self.n_features {
            return Err(PipelineError::ShapeMismatch {
                expected: self.n_features,
                actual: width,
            });
        }
        Ok(())
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::r2_score;

    fn linear_data(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| ((i * (j + 3)) % 17) as f64);
        let y = x.column(0).mapv(|v| 2.0 * v) + x.column(1);
        (x, y)
    }

    fn small_params() -> ForestParams {
        ForestParams {
            n_estimators: 10,
            ..ForestParams::default()
        }
    }

    #[test]
    fn test_fit_is_reproducible() {
        let (x, y) = linear_data(60);
        let a = RandomForest::fit(&x, &y, &small_params()).unwrap();
        let b = RandomForest::fit(&x, &y, &small_params()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.n_trees(), 10);

        let c = RandomForest::fit(
            &x,
            &y,
            &ForestParams {
                seed: 7,
                ..small_params()
            },
        )
        .unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_fits_training_data_well() {
        let (x, y) = linear_data(80);
        let forest = RandomForest::fit(&x, &y, &small_params()).unwrap();
        let predicted = forest.predict(&x).unwrap();
        assert!(r2_score(&y, &predicted) > 0.9);
    }

    #[test]
    fn test_without_bootstrap_trees_are_identical() {
        let (x, y) = linear_data(30);
        let params = ForestParams {
            n_estimators: 3,
            bootstrap: false,
            ..ForestParams::default()
        };
        let forest = RandomForest::fit(&x, &y, &params).unwrap();
        let predicted = forest.predict(&x).unwrap();
        assert!(r2_score(&y, &predicted) > 0.999);
    }

    #[test]
    fn test_width_checked_on_predict() {
        let (x, y) = linear_data(20);
        let forest = RandomForest::fit(&x, &y, &small_params()).unwrap();
        assert!(matches!(
            forest.predict_row(&[1.0, 2.0, 3.0]),
            Err(PipelineError::ShapeMismatch {
                expected: 2,
                actual: 3
            })
        ));
        assert!(forest.predict_row(&[1.0, 2.0]).is_ok());
    }

    #[test]
    fn test_rejects_empty_and_invalid_input() {
        let x = Array2::<f64>::zeros((0, 2));
        let y = Array1::<f64>::zeros(0);
        assert!(RandomForest::fit(&x, &y, &small_params()).is_err());

        let (x, y) = linear_data(10);
        let params = ForestParams {
            n_estimators: 0,
            ..ForestParams::default()
        };
        assert!(RandomForest::fit(&x, &y, &params).is_err());
    }
}
