//! Gradient Boosting implementation
//!
//! Binary gradient boosted trees: each round fits a small regression tree
//! to the negative gradient of the loss and adds it, shrunk by the learning
//! rate, to the raw decision function.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::decision_tree::DecisionTree;
use crate::error::{PipelineError, Result};

/// Boosting loss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoostingLoss {
    /// Binomial deviance; probabilities are `sigmoid(F)`
    LogLoss,
    /// AdaBoost-style exponential loss; probabilities are `sigmoid(2F)`
    Exponential,
}

impl fmt::Display for BoostingLoss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoostingLoss::LogLoss => f.write_str("log_loss"),
            BoostingLoss::Exponential => f.write_str("exponential"),
        }
    }
}

/// Gradient Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Row subsample ratio for each tree
    pub subsample: f64,
    pub loss: BoostingLoss,
    /// Random seed
    pub random_state: u64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 1.0,
            loss: BoostingLoss::LogLoss,
            random_state: 42,
        }
    }
}

fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

/// Gradient Boosting Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTree>,
    initial_score: f64,
    fitted: bool,
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_score: 0.0,
            fitted: false,
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    /// Fit binary classification on labels 0 and 1
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(PipelineError::TrainingError(
                "cannot fit gradient boosting on zero samples".to_string(),
            ));
        }

        let p = y.mean().unwrap_or(0.5).clamp(1e-10, 1.0 - 1e-10);
        let log_odds = (p / (1.0 - p)).ln();
        self.initial_score = match self.config.loss {
            BoostingLoss::LogLoss => log_odds,
            BoostingLoss::Exponential => 0.5 * log_odds,
        };

        let mut scores = Array1::from_elem(n_samples, self.initial_score);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        self.trees.clear();

        for round in 0..self.config.n_estimators {
            let residuals = self.negative_gradient(y, &scores);

            let rows = self.subsample_indices(n_samples, &mut rng);
            let x_sub = x.select(Axis(0), &rows);
            let r_sub = residuals.select(Axis(0), &rows);

            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(self.config.max_depth)
                .with_min_samples_leaf(self.config.min_samples_leaf)
                .with_random_state(self.config.random_state.wrapping_add(round as u64));
            tree.fit(&x_sub, &r_sub)?;

            scores.scaled_add(self.config.learning_rate, &tree.predict(x)?);
            self.trees.push(tree);
        }

        self.fitted = true;
        Ok(())
    }

    fn negative_gradient(&self, y: &Array1<f64>, scores: &Array1<f64>) -> Array1<f64> {
        match self.config.loss {
            BoostingLoss::LogLoss => y
                .iter()
                .zip(scores.iter())
                .map(|(&yi, &fi)| yi - sigmoid(fi))
                .collect(),
            BoostingLoss::Exponential => y
                .iter()
                .zip(scores.iter())
                .map(|(&yi, &fi)| {
                    let sign = 2.0 * yi - 1.0;
                    sign * (-sign * fi).exp()
                })
                .collect(),
        }
    }

    fn subsample_indices(&self, n: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..n).collect();
        if self.config.subsample >= 1.0 {
            return indices;
        }
        let sample_size = ((n as f64) * self.config.subsample).ceil().max(1.0) as usize;
        indices.shuffle(rng);
        indices.truncate(sample_size);
        indices.sort_unstable();
        indices
    }

    /// Raw additive scores
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.fitted {
            return Err(PipelineError::ModelNotFitted);
        }
        let mut scores = Array1::from_elem(x.nrows(), self.initial_score);
        for tree in &self.trees {
            scores.scaled_add(self.config.learning_rate, &tree.predict(x)?);
        }
        Ok(scores)
    }

    /// Probability of label 1
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scores = self.decision_function(x)?;
        Ok(match self.config.loss {
            BoostingLoss::LogLoss => scores.mapv(sigmoid),
            BoostingLoss::Exponential => scores.mapv(|f| sigmoid(2.0 * f)),
        })
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_proba(x)?.mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
    }
}
