//! Drift detection module
//!
//! Compares the per-column distributions of a base dataset and a current
//! dataset with a two-sample Kolmogorov-Smirnov test and produces a
//! [`DriftReport`].

mod data_drift;

pub use data_drift::{KolmogorovSmirnovTest, KsOutcome};

use crate::data::Dataset;
use crate::error::{PipelineError, Result};
use crate::storage::{ArtifactStore, ArtifactStoreExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Default significance threshold for flagging a column as drifted
pub const DEFAULT_DRIFT_THRESHOLD: f64 = 0.05;

/// Drift result for one column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnDrift {
    pub p_value: f64,
    pub drift_status: bool,
}

/// Per-column drift results, keyed by column name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriftReport {
    columns: BTreeMap<String, ColumnDrift>,
}

impl DriftReport {
    /// True if any column drifted
    pub fn drift_found(&self) -> bool {
        self.columns.values().any(|c| c.drift_status)
    }

    pub fn get(&self, column: &str) -> Option<&ColumnDrift> {
        self.columns.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &ColumnDrift)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Names of drifted columns
    pub fn drifted_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|(_, c)| c.drift_status)
            .map(|(k, _)| k.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Column-wise distribution drift detector
#[derive(Debug, Clone, Copy)]
pub struct DriftDetector {
    threshold: f64,
    test: KolmogorovSmirnovTest,
}

impl Default for DriftDetector {
    fn default() -> Self {
        Self::new(DEFAULT_DRIFT_THRESHOLD)
    }
}

impl DriftDetector {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            test: KolmogorovSmirnovTest::new(),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Build the report without persisting it.
    ///
    /// Iterates the columns of `base` only; columns that exist only in
    /// `current` are not compared.
    pub fn compare(&self, base: &Dataset, current: &Dataset) -> Result<DriftReport> {
        let mut columns = BTreeMap::new();

        for name in base.column_names() {
            if !current.has_column(&name) {
                return Err(PipelineError::MissingColumn(format!(
                    "{} (absent from current dataset)",
                    name
                )));
            }
            let reference = base.column_array(&name)?;
            let observed = current.column_array(&name)?;

            let p_value = match self.test.two_sample(
                reference.as_slice().unwrap_or(&[]),
                observed.as_slice().unwrap_or(&[]),
            ) {
                Some(outcome) => {
                    debug!(column = %name, statistic = outcome.statistic, p_value = outcome.p_value, "ks test");
                    outcome.p_value
                }
                None => {
                    warn!(column = %name, "no usable values on one side, treating as undrifted");
                    1.0
                }
            };

            let drift_status = p_value < self.threshold;
            if drift_status {
                warn!(column = %name, p_value, threshold = self.threshold, "drift detected");
            }
            columns.insert(name, ColumnDrift { p_value, drift_status });
        }

        Ok(DriftReport { columns })
    }

    /// Compare `base` against `current` and write the report to `report_path`
    /// before returning `(drift_found, report)`.
    pub fn detect(
        &self,
        base: &Dataset,
        current: &Dataset,
        store: &dyn ArtifactStore,
        report_path: &Path,
    ) -> Result<(bool, DriftReport)> {
        let report = self.compare(base, current)?;
        store.write_yaml(report_path, &report)?;

        let drift_found = report.drift_found();
        info!(
            columns = report.len(),
            drifted = report.drifted_columns().len(),
            drift_found,
            path = %report_path.display(),
            "drift report written"
        );
        Ok((drift_found, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryArtifactStore;
    use polars::prelude::*;

    fn dataset(a: &[f64], b: &[f64]) -> Dataset {
        Dataset::new(df!("a" => a, "b" => b).unwrap())
    }

    #[test]
    fn test_clone_has_no_drift() {
        let values: Vec<f64> = (0..50).map(|i| (i % 5) as f64).collect();
        let base = dataset(&values, &values);
        let store = InMemoryArtifactStore::new();

        let (found, report) = DriftDetector::default()
            .detect(&base, &base.clone(), &store, Path::new("drift/report.yaml"))
            .unwrap();

        assert!(!found);
        assert_eq!(report.len(), 2);
        for (_, column) in report.columns() {
            assert_eq!(column.p_value, 1.0);
            assert!(!column.drift_status);
        }
        assert!(store.exists(Path::new("drift/report.yaml")));
    }

    #[test]
    fn test_single_drifted_column_sets_flag() {
        let low: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let high: Vec<f64> = (0..30).map(|i| 1000.0 + i as f64).collect();
        let base = dataset(&low, &low);
        let current = dataset(&low, &high);

        let report = DriftDetector::default().compare(&base, &current).unwrap();
        assert!(report.drift_found());
        assert_eq!(report.drifted_columns(), vec!["b"]);
        assert!(!report.get("a").unwrap().drift_status);
    }

    #[test]
    fn test_only_base_columns_are_compared() {
        let values: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let base = Dataset::new(df!("a" => &values).unwrap());
        let current = dataset(&values, &values);

        let report = DriftDetector::default().compare(&base, &current).unwrap();
        assert_eq!(report.len(), 1);
        assert!(report.get("b").is_none());

        assert!(matches!(
            DriftDetector::default().compare(&current, &base),
            Err(PipelineError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_detection_is_deterministic() {
        let a: Vec<f64> = (0..40).map(|i| ((i * 7) % 11) as f64).collect();
        let b: Vec<f64> = (0..40).map(|i| ((i * 3) % 13) as f64).collect();
        let base = dataset(&a, &b);
        let current = dataset(&b, &a);
        let detector = DriftDetector::default();

        let first = detector.compare(&base, &current).unwrap();
        let second = detector.compare(&base, &current).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_report_yaml_layout() {
        let values: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let base = dataset(&values, &values);
        let store = InMemoryArtifactStore::new();
        let path = Path::new("report.yaml");

        DriftDetector::default().detect(&base, &base, &store, path).unwrap();

        let text = String::from_utf8(store.read_bytes(path).unwrap()).unwrap();
        assert!(text.contains("a:"));
        assert!(text.contains("p_value: 1.0"));
        assert!(text.contains("drift_status: false"));
    }
}
