//! AdaBoost (Adaptive Boosting) implementation
//!
//! SAMME boosting of weighted decision stumps, weighting misclassified
//! samples more heavily in subsequent rounds.

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A single decision stump: splits on one feature at one threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Stump {
    feature_index: usize,
    threshold: f64,
    /// Prediction when feature <= threshold
    left_label: f64,
    /// Prediction when feature > threshold
    right_label: f64,
}

impl Stump {
    fn predict_sample(&self, value: f64) -> f64 {
        if value <= self.threshold {
            self.left_label
        } else {
            self.right_label
        }
    }

    fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        x.column(self.feature_index).mapv(|v| self.predict_sample(v))
    }
}

/// AdaBoost binary classifier (SAMME)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostClassifier {
    pub n_estimators: usize,
    pub learning_rate: f64,
    stumps: Vec<Stump>,
    alphas: Vec<f64>,
    n_features: usize,
    is_fitted: bool,
}

impl Default for AdaBoostClassifier {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostClassifier {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators: n_estimators.max(1),
            learning_rate,
            stumps: Vec::new(),
            alphas: Vec::new(),
            n_features: 0,
            is_fitted: false,
        }
    }

    pub fn n_stumps(&self) -> usize {
        self.stumps.len()
    }

    /// Lowest weighted-error stump, found with one sorted sweep per feature
    fn fit_stump(x: &Array2<f64>, y: &Array1<f64>, weights: &Array1<f64>) -> Stump {
        let total_pos: f64 = y.iter().zip(weights.iter()).filter(|(l, _)| **l == 1.0).map(|(_, w)| w).sum();
        let total: f64 = weights.sum();

        // Constant stump predicting the weighted majority
        let majority = if total_pos * 2.0 > total { 1.0 } else { 0.0 };
        let mut best_error = if majority == 1.0 { total - total_pos } else { total_pos };
        let mut best = Stump {
            feature_index: 0,
            threshold: f64::INFINITY,
            left_label: majority,
            right_label: majority,
        };

        for f in 0..x.ncols() {
            let mut order: Vec<(f64, f64, f64)> = (0..x.nrows())
                .map(|i| (x[[i, f]], y[i], weights[i]))
                .collect();
            order.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

            let (mut left_pos, mut left_total) = (0.0f64, 0.0f64);
            for pos in 0..order.len().saturating_sub(1) {
                let (value, label, w) = order[pos];
                left_total += w;
                if label == 1.0 {
                    left_pos += w;
                }
                let next = order[pos + 1].0;
                if next <= value {
                    continue;
                }

                let left_neg = left_total - left_pos;
                let right_pos = total_pos - left_pos;
                let right_neg = (total - left_total) - right_pos;

                // left -> 0, right -> 1
                let err_a = left_pos + right_neg;
                // left -> 1, right -> 0
                let err_b = left_neg + right_pos;
                let threshold = (value + next) / 2.0;

                if err_a < best_error {
                    best_error = err_a;
                    best = Stump { feature_index: f, threshold, left_label: 0.0, right_label: 1.0 };
                }
                if err_b < best_error {
                    best_error = err_b;
                    best = Stump { feature_index: f, threshold, left_label: 1.0, right_label: 0.0 };
                }
            }
        }
        best
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 || x.ncols() == 0 {
            return Err(PipelineError::TrainingError(
                "cannot fit AdaBoost on an empty matrix".to_string(),
            ));
        }

        let mut weights = Array1::from_elem(n_samples, 1.0 / n_samples as f64);
        self.stumps.clear();
        self.alphas.clear();

        for _round in 0..self.n_estimators {
            let stump = Self::fit_stump(x, y, &weights);
            let predictions = stump.predict(x);

            let error: f64 = predictions
                .iter()
                .zip(y.iter())
                .zip(weights.iter())
                .filter(|((p, t), _)| p != t)
                .map(|(_, w)| w)
                .sum::<f64>()
                / weights.sum();

            if error <= 0.0 {
                // perfect stump: nothing left to reweight
                self.stumps.push(stump);
                self.alphas.push(1.0);
                break;
            }
            if error >= 0.5 {
                if self.stumps.is_empty() {
                    self.stumps.push(stump);
                    self.alphas.push(1.0);
                }
                break;
            }

            // SAMME with two classes: the ln(K - 1) term vanishes
            let alpha = self.learning_rate * ((1.0 - error) / error).ln();

            for i in 0..n_samples {
                if predictions[i] != y[i] {
                    weights[i] *= alpha.exp();
                }
            }
            let w_sum = weights.sum();
            if w_sum > 0.0 {
                weights /= w_sum;
            }

            self.stumps.push(stump);
            self.alphas.push(alpha);
        }

        self.n_features = x.ncols();
        self.is_fitted = true;
        Ok(self)
    }

    /// Weighted vote in [-1, 1], positive for label 1
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        let alpha_sum: f64 = self.alphas.iter().sum();
        let mut votes = Array1::<f64>::zeros(x.nrows());
        for (stump, &alpha) in self.stumps.iter().zip(self.alphas.iter()) {
            votes.scaled_add(alpha, &stump.predict(x).mapv(|p| 2.0 * p - 1.0));
        }
        if alpha_sum > 0.0 {
            votes /= alpha_sum;
        }
        Ok(votes)
    }

    /// Probability of label 1
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(|d| 1.0 / (1.0 + (-d).exp())))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(|d| if d > 0.0 { 1.0 } else { 0.0 }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_adaboost_simple() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 1.0], [4.0, 1.0], [5.0, 1.0], [6.0, 0.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut clf = AdaBoostClassifier::new(20, 1.0);
        clf.fit(&x, &y).unwrap();
        assert_eq!(clf.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_boosting_combines_stumps() {
        // 1-D interval: label 1 only inside (2, 5); no single stump fits it
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0];

        let mut clf = AdaBoostClassifier::new(50, 1.0);
        clf.fit(&x, &y).unwrap();
        assert!(clf.n_stumps() > 1);
        let proba = clf.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_learning_rate_shrinks_alphas() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![0.0, 1.0, 0.0, 1.0, 1.0, 1.0];

        let mut fast = AdaBoostClassifier::new(5, 0.1);
        let mut slow = AdaBoostClassifier::new(5, 0.001);
        fast.fit(&x, &y).unwrap();
        slow.fit(&x, &y).unwrap();
        assert!(slow.alphas[0] < fast.alphas[0]);
    }

    #[test]
    fn test_rejects_wrong_feature_count() {
        let x = Array2::from_shape_fn((8, 3), |(i, j)| (i * (j + 1)) as f64);
        let y = Array1::from_shape_fn(8, |i| if i >= 4 { 1.0 } else { 0.0 });
        let mut clf = AdaBoostClassifier::new(10, 0.1);
        clf.fit(&x, &y).unwrap();

        let narrow = Array2::zeros((2, 1));
        assert!(matches!(clf.predict(&narrow), Err(PipelineError::ShapeError { .. })));
        let wide = Array2::zeros((2, 4));
        assert!(matches!(clf.predict_proba(&wide), Err(PipelineError::ShapeError { .. })));
        assert_eq!(clf.predict(&x).unwrap().len(), 8);
    }
}
