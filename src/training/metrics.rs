//! Binary classification metrics

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Classification metrics for label 1 as the positive class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Undefined when only one class is present in `y_true`
    pub auc_roc: Option<f64>,
}

impl ClassificationMetrics {
    /// Compute metrics from true labels, predicted labels and predicted
    /// positive-class scores. Zero divisions yield 0.
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>, y_score: &Array1<f64>) -> Self {
        let n = y_true.len();
        let (tp, fp, tn, fn_) = confusion_counts(y_true, y_pred);

        let ratio = |num: usize, den: usize| if den > 0 { num as f64 / den as f64 } else { 0.0 };
        let accuracy = ratio(tp + tn, n);
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            accuracy,
            precision,
            recall,
            f1,
            auc_roc: roc_auc(y_true, y_score),
        }
    }

    /// Flat name → value map, each name prefixed (e.g. `testing_accuracy`)
    pub fn to_named(&self, prefix: &str) -> BTreeMap<String, f64> {
        let mut out = BTreeMap::new();
        out.insert(format!("{}_accuracy", prefix), self.accuracy);
        out.insert(format!("{}_precision", prefix), self.precision);
        out.insert(format!("{}_recall", prefix), self.recall);
        out.insert(format!("{}_f1", prefix), self.f1);
        if let Some(auc) = self.auc_roc {
            out.insert(format!("{}_auc_roc", prefix), auc);
        }
        out
    }
}

/// Fraction of predictions equal to the true label
pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| (*t - *p).abs() < 0.5)
        .count();
    correct as f64 / y_true.len() as f64
}

fn confusion_counts(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> (usize, usize, usize, usize) {
    let mut tp = 0;
    let mut fp = 0;
    let mut tn = 0;
    let mut fn_ = 0;

    for (t, p) in y_true.iter().zip(y_pred.iter()) {
        match (*t > 0.5, *p > 0.5) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (false, false) => tn += 1,
            (true, false) => fn_ += 1,
        }
    }

    (tp, fp, tn, fn_)
}

/// Area under the ROC curve via the rank-sum statistic, averaging tied ranks
fn roc_auc(y_true: &Array1<f64>, y_score: &Array1<f64>) -> Option<f64> {
    let n_pos = y_true.iter().filter(|&&t| t > 0.5).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<(f64, bool)> = y_score
        .iter()
        .zip(y_true.iter())
        .map(|(&s, &t)| (s, t > 0.5))
        .collect();
    order.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let mut pos_rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && order[j + 1].0 == order[i].0 {
            j += 1;
        }
        // ranks are 1-based; tied block i..=j shares the mean rank
        let mean_rank = (i + j) as f64 / 2.0 + 1.0;
        let positives = order[i..=j].iter().filter(|(_, p)| *p).count();
        pos_rank_sum += mean_rank * positives as f64;
        i = j + 1;
    }

    let (p, q) = (n_pos as f64, n_neg as f64);
    Some((pos_rank_sum - p * (p + 1.0) / 2.0) / (p * q))
}
