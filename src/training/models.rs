//! Candidate model registry
//!
//! A closed set of model kinds. Each kind knows its hyperparameter grid and
//! how to build an unfitted [`Classifier`] from one grid point.

use super::adaboost::AdaBoostClassifier;
use super::decision_tree::{Criterion, DecisionTree};
use super::gradient_boosting::{BoostingLoss, GradientBoostingClassifier, GradientBoostingConfig};
use super::linear_models::{LogisticRegression, Penalty};
use super::random_forest::RandomForest;
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Candidate model families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    RandomForest,
    DecisionTree,
    GradientBoosting,
    LogisticRegression,
    AdaBoost,
}

impl ModelKind {
    /// Registry order; selection ties resolve to the earliest entry
    pub const ALL: [ModelKind; 5] = [
        ModelKind::RandomForest,
        ModelKind::DecisionTree,
        ModelKind::GradientBoosting,
        ModelKind::LogisticRegression,
        ModelKind::AdaBoost,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::RandomForest => "Random Forest",
            ModelKind::DecisionTree => "Decision Tree",
            ModelKind::GradientBoosting => "Gradient Boosting",
            ModelKind::LogisticRegression => "Logistic Regression",
            ModelKind::AdaBoost => "AdaBoost",
        }
    }

    /// Hyperparameter search space, in evaluation order
    pub fn param_grid(&self) -> Vec<Hyperparams> {
        const TREE_CRITERIA: [Criterion; 3] = [Criterion::Gini, Criterion::Entropy, Criterion::LogLoss];
        match self {
            ModelKind::RandomForest => TREE_CRITERIA
                .iter()
                .map(|&criterion| Hyperparams::RandomForest { criterion })
                .collect(),
            ModelKind::DecisionTree => TREE_CRITERIA
                .iter()
                .map(|&criterion| Hyperparams::DecisionTree { criterion })
                .collect(),
            ModelKind::GradientBoosting => [BoostingLoss::LogLoss, BoostingLoss::Exponential]
                .iter()
                .map(|&loss| Hyperparams::GradientBoosting { loss })
                .collect(),
            ModelKind::LogisticRegression => [Penalty::L1, Penalty::L2, Penalty::ElasticNet, Penalty::None]
                .iter()
                .map(|&penalty| Hyperparams::LogisticRegression { penalty })
                .collect(),
            ModelKind::AdaBoost => [0.1, 0.01, 0.001]
                .iter()
                .map(|&learning_rate| Hyperparams::AdaBoost { learning_rate })
                .collect(),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One point of a model kind's search space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Hyperparams {
    RandomForest { criterion: Criterion },
    DecisionTree { criterion: Criterion },
    GradientBoosting { loss: BoostingLoss },
    LogisticRegression { penalty: Penalty },
    AdaBoost { learning_rate: f64 },
}

impl Hyperparams {
    pub fn kind(&self) -> ModelKind {
        match self {
            Hyperparams::RandomForest { .. } => ModelKind::RandomForest,
            Hyperparams::DecisionTree { .. } => ModelKind::DecisionTree,
            Hyperparams::GradientBoosting { .. } => ModelKind::GradientBoosting,
            Hyperparams::LogisticRegression { .. } => ModelKind::LogisticRegression,
            Hyperparams::AdaBoost { .. } => ModelKind::AdaBoost,
        }
    }

    /// Build an unfitted classifier; stochastic models are seeded with `seed`
    pub fn build(&self, seed: u64) -> Classifier {
        match *self {
            Hyperparams::RandomForest { criterion } => Classifier::RandomForest(
                RandomForest::new(100)
                    .with_criterion(criterion)
                    .with_random_state(seed),
            ),
            Hyperparams::DecisionTree { criterion } => Classifier::DecisionTree(
                DecisionTree::new_classifier()
                    .with_criterion(criterion)
                    .with_random_state(seed),
            ),
            Hyperparams::GradientBoosting { loss } => {
                Classifier::GradientBoosting(GradientBoostingClassifier::new(GradientBoostingConfig {
                    loss,
                    random_state: seed,
                    ..GradientBoostingConfig::default()
                }))
            }
            Hyperparams::LogisticRegression { penalty } => {
                Classifier::LogisticRegression(LogisticRegression::new().with_penalty(penalty))
            }
            Hyperparams::AdaBoost { learning_rate } => {
                Classifier::AdaBoost(AdaBoostClassifier::new(50, learning_rate))
            }
        }
    }
}

impl fmt::Display for Hyperparams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hyperparams::RandomForest { criterion } | Hyperparams::DecisionTree { criterion } => {
                write!(f, "criterion={}", criterion)
            }
            Hyperparams::GradientBoosting { loss } => write!(f, "loss={}", loss),
            Hyperparams::LogisticRegression { penalty } => write!(f, "penalty={}", penalty),
            Hyperparams::AdaBoost { learning_rate } => write!(f, "learning_rate={}", learning_rate),
        }
    }
}

/// A binary classifier of any registered kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Classifier {
    RandomForest(RandomForest),
    DecisionTree(DecisionTree),
    GradientBoosting(GradientBoostingClassifier),
    LogisticRegression(LogisticRegression),
    AdaBoost(AdaBoostClassifier),
}

impl Classifier {
    pub fn kind(&self) -> ModelKind {
        match self {
            Classifier::RandomForest(_) => ModelKind::RandomForest,
            Classifier::DecisionTree(_) => ModelKind::DecisionTree,
            Classifier::GradientBoosting(_) => ModelKind::GradientBoosting,
            Classifier::LogisticRegression(_) => ModelKind::LogisticRegression,
            Classifier::AdaBoost(_) => ModelKind::AdaBoost,
        }
    }

    /// Fit on labels 0 and 1
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if let Some(bad) = y.iter().find(|&&v| v != 0.0 && v != 1.0) {
            return Err(PipelineError::TrainingError(format!(
                "labels must be 0 or 1, found {}",
                bad
            )));
        }
        match self {
            Classifier::RandomForest(m) => m.fit(x, y).map(|_| ()),
            Classifier::DecisionTree(m) => m.fit(x, y).map(|_| ()),
            Classifier::GradientBoosting(m) => m.fit(x, y),
            Classifier::LogisticRegression(m) => m.fit(x, y).map(|_| ()),
            Classifier::AdaBoost(m) => m.fit(x, y).map(|_| ()),
        }
    }

    /// Predicted labels (0 or 1)
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Classifier::RandomForest(m) => m.predict(x),
            Classifier::DecisionTree(m) => m.predict(x),
            Classifier::GradientBoosting(m) => m.predict(x),
            Classifier::LogisticRegression(m) => m.predict(x),
            Classifier::AdaBoost(m) => m.predict(x),
        }
    }

    /// Probability of label 1
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Classifier::RandomForest(m) => m.predict_proba(x),
            Classifier::DecisionTree(m) => m.predict_proba(x),
            Classifier::GradientBoosting(m) => m.predict_proba(x),
            Classifier::LogisticRegression(m) => m.predict_proba(x),
            Classifier::AdaBoost(m) => m.predict_proba(x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grids_match_their_kind() {
        for kind in ModelKind::ALL {
            let grid = kind.param_grid();
            assert!(!grid.is_empty());
            for params in grid {
                assert_eq!(params.kind(), kind);
                assert_eq!(params.build(42).kind(), kind);
            }
        }
        assert_eq!(ModelKind::RandomForest.param_grid().len(), 3);
        assert_eq!(ModelKind::LogisticRegression.param_grid().len(), 4);
    }

    #[test]
    fn test_hyperparams_display() {
        assert_eq!(
            Hyperparams::DecisionTree { criterion: Criterion::LogLoss }.to_string(),
            "criterion=log_loss"
        );
        assert_eq!(
            Hyperparams::AdaBoost { learning_rate: 0.01 }.to_string(),
            "learning_rate=0.01"
        );
    }

    #[test]
    fn test_classifier_rejects_non_binary_labels() {
        let x = Array2::zeros((2, 1));
        let y = Array1::from_vec(vec![-1.0, 1.0]);
        let mut model = Hyperparams::DecisionTree { criterion: Criterion::Gini }.build(0);
        assert!(matches!(model.fit(&x, &y), Err(PipelineError::TrainingError(_))));
    }

    #[test]
    fn test_classifier_survives_bincode() {
        let x = Array2::from_shape_fn((8, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(8, |i| if i >= 4 { 1.0 } else { 0.0 });
        let mut model = Hyperparams::DecisionTree { criterion: Criterion::Gini }.build(0);
        model.fit(&x, &y).unwrap();

        let bytes = bincode::serialize(&model).unwrap();
        let restored: Classifier = bincode::deserialize(&bytes).unwrap();
        assert_eq!(restored.predict(&x).unwrap(), y);
    }
}
