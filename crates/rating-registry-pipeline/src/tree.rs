//! CART regression tree
//!
//! Splits minimise the summed squared error of the children. Nodes are
//! stored in a flat vector so deep trees neither recurse on prediction nor
//! nest when serialized.

use ndarray::{ArrayView1, ArrayView2};
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Number of features considered at each split
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxFeatures {
    /// Every feature
    #[default]
    All,
    /// `floor(sqrt(n))`, at least one
    Sqrt,
    /// `floor(log2(n))`, at least one
    Log2,
}

impl MaxFeatures {
    pub fn count(&self, n_features: usize) -> usize {
        let k = match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2() as usize,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// Growth limits of a single tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
}

/// A node of a fitted tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    /// Rows with `x[feature] <= threshold` go left
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Fitted regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
}

struct PendingNode {
    node: usize,
    samples: Vec<usize>,
    depth: usize,
}

struct Split {
    feature: usize,
    threshold: f64,
}

impl DecisionTree {
    /// Grow a tree on the given sample indices (duplicates act as weights)
    pub fn fit<R: Rng + ?Sized>(
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        samples: Vec<usize>,
        params: &TreeParams,
        rng: &mut R,
    ) -> Self {
        let mut nodes = vec![TreeNode::Leaf {
            value: mean(y, &samples),
        }];
        let mut stack = vec![PendingNode {
            node: 0,
            samples,
            depth: 0,
        }];
        let mut buffer: Vec<(f64, f64)> = Vec::new();

        while let Some(pending) = stack.pop() {
            let value = mean(y, &pending.samples);
            let split = if Self::can_split(&pending, y, params) {
                best_split(x, y, &pending.samples, params, rng, &mut buffer)
            } else {
                None
            };

            let Some(split) = split else {
                nodes[pending.node] = TreeNode::Leaf { value };
                continue;
            };

            let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = pending
                .samples
                .iter()
                .copied()
                .partition(|&i| x[[i, split.feature]] <= split.threshold);

            let left = nodes.len();
            let right = left + 1;
            nodes.push(TreeNode::Leaf { value });
            nodes.push(TreeNode::Leaf { value });
            nodes[pending.node] = TreeNode::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };

            stack.push(PendingNode {
                node: right,
                samples: right_samples,
                depth: pending.depth + 1,
            });
            stack.push(PendingNode {
                node: left,
                samples: left_samples,
                depth: pending.depth + 1,
            });
        }

        Self { nodes }
    }

    fn can_split(pending: &PendingNode, y: ArrayView1<'_, f64>, params: &TreeParams) -> bool {
        let n = pending.samples.len();
        if params.max_depth.is_some_and(|max| pending.depth >= max) {
            return false;
        }
        if n < params.min_samples_split || n < 2 * params.min_samples_leaf {
            return false;
        }
        // A pure node cannot be improved
        let first = y[pending.samples[0]];
        pending.samples.iter().any(|&i| y[i] != first)
    }

    /// Predict one row
    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Length of the longest root-to-leaf path
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            if let TreeNode::Split { left, right, .. } = &self.nodes[idx] {
                stack.push((*left, depth + 1));
                stack.push((*right, depth + 1));
            }
        }
        max_depth
    }
}

fn mean(y: ArrayView1<'_, f64>, samples: &[usize]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|&i| y[i]).sum::<f64>() / samples.len() as f64
}

/// Find the split with the lowest summed squared error of the children
///
/// Maximising `sum_l^2 / n_l + sum_r^2 / n_r` is equivalent and avoids
/// tracking squares.
fn best_split<R: Rng + ?Sized>(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
    samples: &[usize],
    params: &TreeParams,
    rng: &mut R,
    buffer: &mut Vec<(f64, f64)>,
) -> Option<Split> {
    let n_features = x.ncols();
    let k = params.max_features.count(n_features);
    let features: Vec<usize> = if k >= n_features {
        (0..n_features).collect()
    } else {
        index::sample(rng, n_features, k).into_vec()
    };

    let n = samples.len();
    let total: f64 = samples.iter().map(|&i| y[i]).sum();
    let parent_score = total * total / n as f64;
    let min_leaf = params.min_samples_leaf.max(1);

    let mut best: Option<(f64, Split)> = None;
    for feature in features {
        buffer.clear();
        buffer.extend(samples.iter().map(|&i| (x[[i, feature]], y[i])));

        let (lo, hi) = buffer
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(v, _)| {
                (lo.min(v), hi.max(v))
            });
        if lo >= hi {
            continue;
        }
        buffer.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_sum = 0.0;
        for pos in 0..n - 1 {
            left_sum += buffer[pos].1;
            let (current, next) = (buffer[pos].0, buffer[pos + 1].0);
            if current == next {
                continue;
            }
            let left_n = pos + 1;
            let right_n = n - left_n;
            if left_n < min_leaf || right_n < min_leaf {
                continue;
            }

            let right_sum = total - left_sum;
            let score = left_sum * left_sum / left_n as f64 + right_sum * right_sum / right_n as f64;
            if score <= parent_score + 1e-12 {
                continue;
            }
            if best.as_ref().map_or(true, |(s, _)| score > *s) {
                let mut threshold = current + (next - current) / 2.0;
                if threshold >= next {
                    threshold = current;
                }
                best = Some((score, Split { feature, threshold }));
            }
        }
    }

    best.map(|(_, split)| split)
}
