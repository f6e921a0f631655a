//! Cross-validated grid search over one model kind's hyperparameters

use super::cross_validation::{CVSplit, CVStrategy, CrossValidator};
use super::metrics::accuracy;
use super::models::{Hyperparams, ModelKind};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Mean cross-validated accuracy of one configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfigScore {
    pub params: Hyperparams,
    pub mean_accuracy: f64,
}

/// Outcome of a grid search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub best_params: Hyperparams,
    pub best_score: f64,
    /// Every configuration in grid order
    pub scores: Vec<ConfigScore>,
}

/// Exhaustive search over a model kind's grid
#[derive(Debug, Clone)]
pub struct GridSearch {
    strategy: CVStrategy,
    seed: u64,
}

impl Default for GridSearch {
    fn default() -> Self {
        Self::new(CVStrategy::default(), 42)
    }
}

impl GridSearch {
    pub fn new(strategy: CVStrategy, seed: u64) -> Self {
        Self { strategy, seed }
    }

    pub fn strategy(&self) -> CVStrategy {
        self.strategy
    }

    /// Score every configuration of `kind` and keep the first best one.
    ///
    /// All (configuration, fold) fits run in parallel; results are gathered
    /// in grid order so the outcome does not depend on scheduling.
    pub fn run(&self, kind: ModelKind, x: &Array2<f64>, y: &Array1<f64>) -> Result<SearchResult> {
        if x.nrows() != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} labels", x.nrows()),
                actual: format!("{} labels", y.len()),
            });
        }

        let grid = kind.param_grid();
        let splits = CrossValidator::new(self.strategy)
            .with_random_state(self.seed)
            .split(y)?;

        let jobs: Vec<(usize, &CVSplit)> = (0..grid.len())
            .flat_map(|g| splits.iter().map(move |s| (g, s)))
            .collect();

        let fold_scores: Vec<f64> = jobs
            .par_iter()
            .map(|&(g, split)| self.score_fold(&grid[g], x, y, split))
            .collect::<Result<Vec<_>>>()?;

        let scores: Vec<ConfigScore> = grid
            .iter()
            .zip(fold_scores.chunks(splits.len()))
            .map(|(params, folds)| ConfigScore {
                params: *params,
                mean_accuracy: folds.iter().sum::<f64>() / folds.len() as f64,
            })
            .collect();

        let mut best = scores
            .first()
            .copied()
            .ok_or_else(|| PipelineError::TrainingError(format!("empty grid for {}", kind)))?;
        for score in &scores[1..] {
            if score.mean_accuracy > best.mean_accuracy {
                best = *score;
            }
        }

        debug!(
            model = kind.name(),
            params = %best.params,
            cv_accuracy = best.mean_accuracy,
            "grid search finished"
        );

        Ok(SearchResult {
            best_params: best.params,
            best_score: best.mean_accuracy,
            scores,
        })
    }

    fn score_fold(&self, params: &Hyperparams, x: &Array2<f64>, y: &Array1<f64>, split: &CVSplit) -> Result<f64> {
        let x_train = x.select(Axis(0), &split.train_indices);
        let y_train = y.select(Axis(0), &split.train_indices);
        let x_val = x.select(Axis(0), &split.test_indices);
        let y_val = y.select(Axis(0), &split.test_indices);

        let mut model = params.build(self.seed);
        model.fit(&x_train, &y_train)?;
        let predictions = model.predict(&x_val)?;
        Ok(accuracy(&y_val, &predictions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::decision_tree::Criterion;

    fn threshold_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| if j == 0 { i as f64 } else { (i % 4) as f64 });
        let y = Array1::from_shape_fn(30, |i| if i >= 15 { 1.0 } else { 0.0 });
        (x, y)
    }

    #[test]
    fn test_scores_every_configuration_in_grid_order() {
        let (x, y) = threshold_data();
        let result = GridSearch::default().run(ModelKind::DecisionTree, &x, &y).unwrap();

        assert_eq!(result.scores.len(), 3);
        assert_eq!(
            result.scores[0].params,
            Hyperparams::DecisionTree { criterion: Criterion::Gini }
        );
        assert!((0.0..=1.0).contains(&result.best_score));
    }

    #[test]
    fn test_ties_keep_first_configuration() {
        let (x, y) = threshold_data();
        let result = GridSearch::default().run(ModelKind::DecisionTree, &x, &y).unwrap();

        // every criterion finds the same single cut on feature 0
        assert!(result.scores.iter().all(|s| s.mean_accuracy == result.best_score));
        assert_eq!(result.best_params, result.scores[0].params);
    }

    #[test]
    fn test_search_is_repeatable() {
        let (x, y) = threshold_data();
        let search = GridSearch::default();
        let a = search.run(ModelKind::AdaBoost, &x, &y).unwrap();
        let b = search.run(ModelKind::AdaBoost, &x, &y).unwrap();
        assert_eq!(a.scores, b.scores);
    }
}
