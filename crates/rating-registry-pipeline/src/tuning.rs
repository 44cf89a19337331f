//! Randomized hyper-parameter search
//!
//! Samples distinct candidates from a discrete grid, scores each by mean
//! squared error averaged over k folds, and keeps the lowest.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{PipelineError, PipelineResult};
use crate::forest::{ForestParams, RandomForest};
use crate::metrics::mean_squared_error;
use crate::tree::MaxFeatures;

/// Search budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    /// Number of candidates drawn from the grid
    pub n_iter: usize,
    /// Number of cross-validation folds
    pub cv: usize,
    pub seed: u64,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            n_iter: 20,
            cv: 3,
            seed: 42,
        }
    }
}

impl SearchParams {
    pub fn validate(&self) -> PipelineResult<()> {
        if self.n_iter == 0 {
            return Err(PipelineError::InvalidConfig(
                "search n_iter must be at least 1".to_string(),
            ));
        }
        if self.cv < 2 {
            return Err(PipelineError::InvalidConfig(
                "search cv must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}

/// Discrete values tried for each hyper-parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParamGrid {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<Option<usize>>,
    pub min_samples_split: Vec<usize>,
    pub min_samples_leaf: Vec<usize>,
    pub max_features: Vec<MaxFeatures>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![50, 100, 200, 500],
            max_depth: vec![None, Some(10), Some(20), Some(30), Some(50)],
            min_samples_split: vec![2, 5, 10],
            min_samples_leaf: vec![1, 2, 4],
            max_features: vec![MaxFeatures::Sqrt, MaxFeatures::Log2, MaxFeatures::All],
        }
    }
}

impl ParamGrid {
    /// Number of distinct combinations
    pub fn len(&self) -> usize {
        self.n_estimators.len()
            * self.max_depth.len()
            * self.min_samples_split.len()
            * self.min_samples_leaf.len()
            * self.max_features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode a combination index; fields outside the grid come from `base`
    pub fn candidate(&self, mut index: usize, base: &ForestParams) -> ForestParams {
        let mut pick = |len: usize| {
            let i = index % len;
            index /= len;
            i
        };
        let n_estimators = self.n_estimators[pick(self.n_estimators.len())];
        let max_depth = self.max_depth[pick(self.max_depth.len())];
        let min_samples_split = self.min_samples_split[pick(self.min_samples_split.len())];
        let min_samples_leaf = self.min_samples_leaf[pick(self.min_samples_leaf.len())];
        let max_features = self.max_features[pick(self.max_features.len())];

        ForestParams {
            n_estimators,
            max_depth,
            min_samples_split,
            min_samples_leaf,
            max_features,
            ..base.clone()
        }
    }
}

/// K-fold cross-validation splitter
#[derive(Debug, Clone)]
pub struct KFold {
    n_splits: usize,
    shuffle: bool,
    seed: u64,
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: false,
            seed: 42,
        }
    }

    /// Shuffle rows with the given seed before cutting folds
    pub fn shuffled(mut self, seed: u64) -> Self {
        self.shuffle = true;
        self.seed = seed;
        self
    }

    /// Train/test indices for each fold; the first `n % k` folds get one
    /// extra row
    pub fn split(&self, n_samples: usize) -> Vec<(Vec<usize>, Vec<usize>)> {
        let mut indices: Vec<usize> = (0..n_samples).collect();
        if self.shuffle {
            indices.shuffle(&mut StdRng::seed_from_u64(self.seed));
        }

        let fold_size = n_samples / self.n_splits;
        let remainder = n_samples % self.n_splits;
        let mut folds = Vec::with_capacity(self.n_splits);
        let mut start = 0;

        for i in 0..self.n_splits {
            let end = start + fold_size + usize::from(i < remainder);
            let test = indices[start..end].to_vec();
            let train = indices[..start]
                .iter()
                .chain(indices[end..].iter())
                .copied()
                .collect();
            folds.push((train, test));
            start = end;
        }
        folds
    }
}

/// Cross-validated score of one candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateScore {
    pub params: ForestParams,
    pub mean_mse: f64,
}

/// Result of a search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub best: ForestParams,
    pub best_mse: f64,
    pub candidates: Vec<CandidateScore>,
}

/// Randomized search over a parameter grid
#[derive(Debug, Clone)]
pub struct RandomizedSearch {
    grid: ParamGrid,
    params: SearchParams,
}

impl RandomizedSearch {
    pub fn new(grid: ParamGrid, params: SearchParams) -> Self {
        Self { grid, params }
    }

    /// Score sampled candidates and return the best one
    #[instrument(skip(self, x, y, base), fields(rows = x.nrows(), n_iter = self.params.n_iter))]
    pub fn run(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        base: &ForestParams,
    ) -> PipelineResult<SearchOutcome> {
        self.params.validate()?;
        if self.grid.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "parameter grid is empty".to_string(),
            ));
        }
        if x.nrows() < self.params.cv {
            return Err(PipelineError::EmptyDataset(format!(
                "{} rows cannot be split into {} folds",
                x.nrows(),
                self.params.cv
            )));
        }

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let amount = self.params.n_iter.min(self.grid.len());
        let picks = index::sample(&mut rng, self.grid.len(), amount);
        let folds = KFold::new(self.params.cv).split(x.nrows());

        let mut candidates = Vec::with_capacity(amount);
        for pick in picks.iter() {
            let params = self.grid.candidate(pick, base);
            let mut total = 0.0;
            for (train, test) in &folds {
                let x_train = x.select(Axis(0), train);
                let y_train = y.select(Axis(0), train);
                let model = RandomForest::fit(&x_train, &y_train, &params)?;
                let predicted = model.predict(&x.select(Axis(0), test))?;
                total += mean_squared_error(&y.select(Axis(0), test), &predicted);
            }
            let mean_mse = total / folds.len() as f64;
            debug!(?params, mean_mse, "Scored candidate");
            candidates.push(CandidateScore { params, mean_mse });
        }

        let best = candidates
            .iter()
            .min_by(|a, b| a.mean_mse.total_cmp(&b.mean_mse))
            .cloned()
            .ok_or_else(|| PipelineError::InvalidConfig("no candidates scored".to_string()))?;

        info!(best_mse = best.mean_mse, params = ?best.params, "Hyper-parameter search finished");
        Ok(SearchOutcome {
            best: best.params,
            best_mse: best.mean_mse,
            candidates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_kfold_partitions_rows() {
        let folds = KFold::new(3).split(10);
        assert_eq!(folds.len(), 3);
        assert_eq!(folds[0].1, vec![0, 1, 2, 3]);
        assert_eq!(folds[2].1, vec![7, 8, 9]);

        let mut seen: Vec<usize> = folds.iter().flat_map(|(_, t)| t.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
        for (train, test) in &folds {
            assert_eq!(train.len() + test.len(), 10);
        }
    }

    #[test]
    fn test_shuffled_kfold_is_seeded() {
        let a = KFold::new(2).shuffled(5).split(20);
        let b = KFold::new(2).shuffled(5).split(20);
        assert_eq!(a, b);
    }

    #[test]
    fn test_grid_decoding_covers_every_combination() {
        let grid = ParamGrid::default();
        assert_eq!(grid.len(), 540);

        let base = ForestParams::default();
        let unique: HashSet<String> = (0..grid.len())
            .map(|i| format!("{:?}", grid.candidate(i, &base)))
            .collect();
        assert_eq!(unique.len(), 540);
        assert_eq!(grid.candidate(0, &base).seed, base.seed);
    }

    #[test]
    fn test_search_picks_lowest_error() {
        let x = Array2::from_shape_fn((30, 1), |(i, _)| i as f64);
        let y = x.column(0).mapv(|v| if v < 15.0 { 1.0 } else { 3.0 });
        let grid = ParamGrid {
            n_estimators: vec![3],
            max_depth: vec![Some(1), None],
            min_samples_split: vec![2],
            min_samples_leaf: vec![1],
            max_features: vec![MaxFeatures::All],
        };
        let search = RandomizedSearch::new(
            grid,
            SearchParams {
                n_iter: 5,
                cv: 3,
                seed: 1,
            },
        );

        let outcome = search.run(&x, &y, &ForestParams::default()).unwrap();
        assert_eq!(outcome.candidates.len(), 2);
        let worst = outcome
            .candidates
            .iter()
            .map(|c| c.mean_mse)
            .fold(f64::NEG_INFINITY, f64::max);
        assert!(outcome.best_mse <= worst);
    }

    #[test]
    fn test_search_needs_enough_rows() {
        let x = Array2::<f64>::zeros((2, 1));
        let y = Array1::<f64>::zeros(2);
        let search = RandomizedSearch::new(ParamGrid::default(), SearchParams::default());
        assert!(search.run(&x, &y, &ForestParams::default()).is_err());
    }
}
