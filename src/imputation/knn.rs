//! KNN-based imputation

use crate::error::{PipelineError, Result};
use crate::imputation::{is_missing, Imputer};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Distance paired with a training row index. Ordered by distance, then index,
/// so neighbor selection is deterministic under ties.
#[derive(Debug, Clone, Copy)]
struct DistanceIdx(f64, usize);

impl PartialEq for DistanceIdx {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DistanceIdx {}

impl PartialOrd for DistanceIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DistanceIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max heap: the farthest kept neighbor sits on top
        self.0
            .partial_cmp(&other.0)
            .unwrap_or(Ordering::Equal)
            .then(self.1.cmp(&other.1))
    }
}

/// KNN imputer.
///
/// For each missing cell `(i, j)` the `k` training rows nearest to row `i`
/// (NaN-aware euclidean distance) that have feature `j` present are
/// averaged with uniform weights. When no such row exists the training mean of feature `j` is
/// used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNImputer {
    n_neighbors: usize,
    /// Training rows, missing values included
    fit_data: Option<Array2<f64>>,
    /// Per-feature mean over present training values
    feature_means: Option<Array1<f64>>,
}

impl KNNImputer {
    /// Create new KNN imputer
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors: n_neighbors.max(1),
            fit_data: None,
            feature_means: None,
        }
    }

    pub fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    pub fn is_fitted(&self) -> bool {
        self.fit_data.is_some()
    }

    /// Euclidean distance over coordinates present in both rows, scaled up
    /// by `n_features / n_present`. `None` when no coordinate is shared.
    fn nan_euclidean(a: ArrayView1<f64>, b: ArrayView1<f64>) -> Option<f64> {
        let mut present = 0usize;
        let mut accum = 0.0f64;
        for (&ai, &bi) in a.iter().zip(b.iter()) {
            if is_missing(ai) || is_missing(bi) {
                continue;
            }
            present += 1;
            let d = ai - bi;
            accum += d * d;
        }
        if present == 0 {
            return None;
        }
        Some((accum * a.len() as f64 / present as f64).sqrt())
    }

    /// The `k` nearest training rows that have `feature_idx` present
    fn neighbors_for(
        &self,
        data: &Array2<f64>,
        distances: &[Option<f64>],
        feature_idx: usize,
    ) -> Vec<DistanceIdx> {
        let k = self.n_neighbors;
        let mut heap: BinaryHeap<DistanceIdx> = BinaryHeap::with_capacity(k + 1);

        for (i, distance) in distances.iter().enumerate() {
            let Some(dist) = *distance else { continue };
            if is_missing(data[[i, feature_idx]]) {
                continue;
            }
            let candidate = DistanceIdx(dist, i);
            if heap.len() < k {
                heap.push(candidate);
            } else if let Some(top) = heap.peek() {
                if candidate < *top {
                    heap.pop();
                    heap.push(candidate);
                }
            }
        }

        heap.into_sorted_vec()
    }

    fn impute_value(data: &Array2<f64>, means: &Array1<f64>, neighbors: &[DistanceIdx], feature_idx: usize) -> f64 {
        if neighbors.is_empty() {
            return means[feature_idx];
        }
        let sum: f64 = neighbors.iter().map(|n| data[[n.1, feature_idx]]).sum();
        sum / neighbors.len() as f64
    }
}

impl Default for KNNImputer {
    fn default() -> Self {
        Self::new(3)
    }
}

impl Imputer for KNNImputer {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        if x.nrows() == 0 {
            return Err(PipelineError::ValidationError(
                "Cannot fit KNN imputer on an empty matrix".to_string(),
            ));
        }

        let means: Array1<f64> = x
            .axis_iter(Axis(1))
            .map(|col| {
                let (sum, count) = col
                    .iter()
                    .filter(|v| !is_missing(**v))
                    .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
                if count == 0 { 0.0 } else { sum / count as f64 }
            })
            .collect();

        self.fit_data = Some(x.clone());
        self.feature_means = Some(means);
        Ok(())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (data, means) = match (&self.fit_data, &self.feature_means) {
            (Some(d), Some(m)) => (d, m),
            _ => return Err(PipelineError::ModelNotFitted),
        };
        if x.ncols() != data.ncols() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} columns", data.ncols()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        let mut result = x.clone();

        for (row_idx, row) in x.rows().into_iter().enumerate() {
            if !row.iter().any(|&v| is_missing(v)) {
                continue;
            }

            let distances: Vec<Option<f64>> = data
                .rows()
                .into_iter()
                .map(|train_row| Self::nan_euclidean(row, train_row))
                .collect();

            for (j, &value) in row.iter().enumerate() {
                if is_missing(value) {
                    let neighbors = self.neighbors_for(data, &distances, j);
                    result[[row_idx, j]] = Self::impute_value(data, means, &neighbors, j);
                }
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_knn_imputer_basic() {
        let data = Array2::from_shape_vec(
            (6, 2),
            vec![
                1.0, 10.0,
                2.0, 20.0,
                3.0, 30.0,
                4.0, 40.0,
                f64::NAN, 25.0,
                2.5, f64::NAN,
            ],
        ).unwrap();

        let mut imputer = KNNImputer::new(3);
        let result = imputer.fit_transform(&data).unwrap();

        assert!(!result.iter().any(|&v| v.is_nan()));
        // nearest rows by feature 1 are 20, 30 and (10 | 40); average of 2, 3 and 1 or 4
        assert!(result[[4, 0]] >= 2.0 && result[[4, 0]] <= 3.0);
        // nearest rows by feature 0 are 2, 3 and 1 | 4 (ties broken by index)
        assert!((result[[5, 1]] - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_uses_rows_with_other_missing_values() {
        // No complete row exists, yet every cell can still be imputed
        let data = array![
            [1.0, f64::NAN, 5.0],
            [f64::NAN, 2.0, 6.0],
            [1.0, 3.0, f64::NAN],
        ];
        let mut imputer = KNNImputer::new(1);
        let result = imputer.fit_transform(&data).unwrap();
        assert!(!result.iter().any(|&v| v.is_nan()));
    }

    #[test]
    fn test_falls_back_to_mean() {
        let train = array![[1.0, 2.0], [3.0, 4.0]];
        let mut imputer = KNNImputer::new(3);
        imputer.fit(&train).unwrap();

        // no shared present coordinate, so no neighbor is usable
        let test = array![[f64::NAN, f64::NAN]];
        let result = imputer.transform(&test).unwrap();
        assert_eq!(result[[0, 0]], 2.0);
        assert_eq!(result[[0, 1]], 3.0);
    }

    #[test]
    fn test_transform_is_idempotent_and_does_not_refit() {
        let train = array![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
        let mut imputer = KNNImputer::new(2);
        imputer.fit(&train).unwrap();
        let before = imputer.clone();

        let shifted = array![[100.0, f64::NAN], [f64::NAN, -50.0]];
        let first = imputer.transform(&shifted).unwrap();
        let second = imputer.transform(&shifted).unwrap();

        assert_eq!(first, second);
        assert_eq!(imputer.fit_data, before.fit_data);
        // the two closest training rows to x=100 are rows 3 and 2
        assert!((first[[0, 1]] - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_unfitted_and_shape_errors() {
        let imputer = KNNImputer::new(3);
        assert!(matches!(
            imputer.transform(&array![[1.0]]),
            Err(PipelineError::ModelNotFitted)
        ));

        let mut fitted = KNNImputer::new(3);
        fitted.fit(&array![[1.0, 2.0]]).unwrap();
        assert!(matches!(
            fitted.transform(&array![[1.0]]),
            Err(PipelineError::ShapeError { .. })
        ));
    }
}
