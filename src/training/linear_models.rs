//! Logistic regression

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Regularization penalty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Penalty {
    L1,
    L2,
    ElasticNet,
    None,
}

impl fmt::Display for Penalty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Penalty::L1 => "l1",
            Penalty::L2 => "l2",
            Penalty::ElasticNet => "elasticnet",
            Penalty::None => "none",
        };
        f.write_str(name)
    }
}

/// Logistic regression for binary classification.
///
/// Minimizes mean log loss plus `alpha * (r * |w|_1 + (1 - r) / 2 * |w|_2^2)`
/// with `alpha = 1 / (C * n_samples)` and `r` the L1 share of the penalty,
/// using proximal gradient descent. The intercept is not penalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Fitted coefficients
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept
    pub intercept: Option<f64>,
    pub penalty: Penalty,
    /// Inverse regularization strength
    pub c: f64,
    /// Elastic-net mixing, used only with `Penalty::ElasticNet`
    pub l1_ratio: f64,
    /// Maximum iterations
    pub max_iter: usize,
    /// Convergence tolerance on the parameter update
    pub tol: f64,
    /// Learning rate
    pub learning_rate: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            penalty: Penalty::L2,
            c: 1.0,
            l1_ratio: 0.5,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.1,
        }
    }

    pub fn with_penalty(mut self, penalty: Penalty) -> Self {
        self.penalty = penalty;
        self
    }

    fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
        z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
    }

    /// (L1 strength, L2 strength)
    fn penalty_strengths(&self, n_samples: usize) -> (f64, f64) {
        let alpha = 1.0 / (self.c * n_samples as f64);
        match self.penalty {
            Penalty::L1 => (alpha, 0.0),
            Penalty::L2 => (0.0, alpha),
            Penalty::ElasticNet => (alpha * self.l1_ratio, alpha * (1.0 - self.l1_ratio)),
            Penalty::None => (0.0, 0.0),
        }
    }

    /// Fit the model using proximal gradient descent
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(PipelineError::TrainingError(
                "cannot fit logistic regression on zero samples".to_string(),
            ));
        }

        let (l1, l2) = self.penalty_strengths(n_samples);
        let lr = self.learning_rate;
        let mut weights = Array1::<f64>::zeros(n_features);
        let mut bias = 0.0;

        for _iter in 0..self.max_iter {
            let predictions = Self::sigmoid(&(x.dot(&weights) + bias));
            let errors = &predictions - y;

            let dw = x.t().dot(&errors) / n_samples as f64 + l2 * &weights;
            let db = errors.mean().unwrap_or(0.0);

            let stepped = &weights - &(lr * &dw);
            // soft-thresholding is the proximal step of the L1 term
            let next = stepped.mapv(|w| w.signum() * (w.abs() - lr * l1).max(0.0));

            let change = (&next - &weights).mapv(f64::abs).fold(0.0f64, |a, &b| a.max(b));
            weights = next;
            bias -= lr * db;

            if change < self.tol && (lr * db).abs() < self.tol {
                break;
            }
        }

        self.coefficients = Some(weights);
        self.intercept = Some(bias);
        Ok(self)
    }

    /// Predict probabilities of label 1
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        if x.ncols() != coefficients.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", coefficients.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        let intercept = self.intercept.unwrap_or(0.0);
        Ok(Self::sigmoid(&(x.dot(coefficients) + intercept)))
    }

    /// Predict class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
    }
}
