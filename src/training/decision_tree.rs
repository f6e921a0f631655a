//! Decision tree implementation
//!
//! Binary classification trees (labels 0 and 1) and regression trees share
//! one structure: every leaf stores the mean target of its samples, which
//! for 0/1 labels is the positive-class probability.

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with the mean target of its samples
    Leaf { value: f64, n_samples: usize },
    /// Internal node; samples with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Shannon entropy (classification)
    Entropy,
    /// Same impurity as `Entropy`, kept as a distinct search option
    LogLoss,
    /// Mean squared error (regression)
    MSE,
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Criterion::Gini => "gini",
            Criterion::Entropy => "entropy",
            Criterion::LogLoss => "log_loss",
            Criterion::MSE => "squared_error",
        };
        f.write_str(name)
    }
}

impl Criterion {
    /// Impurity of a node from its sample count, target sum and target square sum
    fn impurity(&self, count: f64, sum: f64, sq_sum: f64) -> f64 {
        if count <= 0.0 {
            return 0.0;
        }
        match self {
            Criterion::Gini => {
                let p = sum / count;
                2.0 * p * (1.0 - p)
            }
            Criterion::Entropy | Criterion::LogLoss => {
                let p = sum / count;
                let h = |q: f64| if q > 0.0 { -q * q.ln() } else { 0.0 };
                h(p) + h(1.0 - p)
            }
            Criterion::MSE => (sq_sum / count - (sum / count).powi(2)).max(0.0),
        }
    }
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features examined per split; all when `None`
    pub max_features: Option<usize>,
    pub criterion: Criterion,
    pub random_state: u64,
    n_features: usize,
    is_classification: bool,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: 42,
            n_features: 0,
            is_classification: true,
        }
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::MSE,
            is_classification: false,
            ..Self::new_classifier()
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(PipelineError::TrainingError(
                "cannot fit a tree on zero samples".to_string(),
            ));
        }
        if self.is_classification && y.iter().any(|&v| v != 0.0 && v != 1.0) {
            return Err(PipelineError::TrainingError(
                "classification tree expects labels 0 and 1".to_string(),
            ));
        }

        self.n_features = x.ncols();
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_tree(x, y, &indices, 0, &mut rng));
        Ok(self)
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let value = sum / n_samples as f64;
        let leaf = TreeNode::Leaf { value, n_samples };

        let first = y[indices[0]];
        let pure = indices.iter().all(|&i| (y[i] - first).abs() < 1e-12);
        if pure
            || n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
        {
            return leaf;
        }

        let features = self.candidate_features(rng);
        let Some((feature_idx, threshold)) = self.find_best_split(x, y, indices, &features) else {
            return leaf;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature_idx]] <= threshold);

        let left = Box::new(self.build_tree(x, y, &left_idx, depth + 1, rng));
        let right = Box::new(self.build_tree(x, y, &right_idx, depth + 1, rng));

        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            n_samples,
        }
    }

    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        match self.max_features {
            Some(k) if k < self.n_features => {
                let mut chosen = sample(rng, self.n_features, k).into_vec();
                chosen.sort_unstable();
                chosen
            }
            _ => (0..self.n_features).collect(),
        }
    }

    /// Best (feature, threshold) by impurity decrease. Ties keep the lowest feature index.
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        features: &[usize],
    ) -> Option<(usize, f64)> {
        let n = indices.len() as f64;
        let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
        let parent = self.criterion.impurity(n, total_sum, total_sq);
        let min_leaf = self.min_samples_leaf;

        let per_feature: Vec<Option<(usize, f64, f64)>> = features
            .par_iter()
            .map(|&feature_idx| {
                let mut order: Vec<(f64, f64)> =
                    indices.iter().map(|&i| (x[[i, feature_idx]], y[i])).collect();
                order.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

                let mut best: Option<(f64, f64)> = None;
                let (mut left_sum, mut left_sq) = (0.0f64, 0.0f64);

                for pos in 0..order.len() - 1 {
                    let (xv, yv) = order[pos];
                    left_sum += yv;
                    left_sq += yv * yv;

                    let next = order[pos + 1].0;
                    if next <= xv {
                        continue;
                    }
                    let left_n = pos + 1;
                    let right_n = order.len() - left_n;
                    if left_n < min_leaf || right_n < min_leaf {
                        continue;
                    }

                    let left_imp = self.criterion.impurity(left_n as f64, left_sum, left_sq);
                    let right_imp = self.criterion.impurity(
                        right_n as f64,
                        total_sum - left_sum,
                        total_sq - left_sq,
                    );
                    let weighted = (left_n as f64 * left_imp + right_n as f64 * right_imp) / n;
                    let gain = parent - weighted;

                    // impure nodes may split without gain so XOR-like data can still be separated
                    if gain > -1e-12 && best.map_or(true, |(g, _)| gain > g) {
                        best = Some((gain, (xv + next) / 2.0));
                    }
                }

                best.map(|(gain, threshold)| (feature_idx, threshold, gain))
            })
            .collect();

        per_feature
            .into_iter()
            .flatten()
            .fold(None, |acc: Option<(usize, f64, f64)>, cand| match acc {
                Some(a) if a.2 >= cand.2 => Some(a),
                _ => Some(cand),
            })
            .map(|(f, t, _)| (f, t))
    }

    fn leaf_value(&self, sample: &[f64]) -> Result<f64> {
        let mut node = self.root.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return Ok(*value),
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if sample[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    /// Raw leaf values: positive-class probability for classifiers, mean for regressors
    pub fn predict_values(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.root.is_none() {
            return Err(PipelineError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        x.rows()
            .into_iter()
            .map(|row| self.leaf_value(&row.to_vec()))
            .collect::<Result<Vec<f64>>>()
            .map(Array1::from_vec)
    }

    /// Probability of label 1
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.predict_values(x)
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let values = self.predict_values(x)?;
        if self.is_classification {
            Ok(values.mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
        } else {
            Ok(values)
        }
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }
}
