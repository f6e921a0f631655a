//! Model selection across the candidate registry

use super::metrics::{accuracy, ClassificationMetrics};
use super::models::{Classifier, Hyperparams, ModelKind};
use super::search::GridSearch;
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// Result of evaluating one candidate family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScore {
    pub kind: ModelKind,
    pub params: Hyperparams,
    pub cv_accuracy: f64,
    pub test_accuracy: f64,
    pub training_time_secs: f64,
}

/// The winning model and its metrics
#[derive(Debug, Clone)]
pub struct SelectedModel {
    pub model: Classifier,
    pub kind: ModelKind,
    pub params: Hyperparams,
    pub train_metrics: ClassificationMetrics,
    pub test_metrics: ClassificationMetrics,
    /// Every candidate in registry order
    pub candidates: Vec<CandidateScore>,
}

/// Index of the highest test accuracy; ties go to the earliest candidate
pub fn pick_best(test_accuracies: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &score) in test_accuracies.iter().enumerate() {
        match best {
            Some((_, current)) if score <= current => {}
            _ => best = Some((idx, score)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Trains every registered candidate and keeps the best on held-out data
#[derive(Debug, Clone)]
pub struct ModelSelector {
    candidates: Vec<ModelKind>,
    search: GridSearch,
    seed: u64,
}

impl Default for ModelSelector {
    fn default() -> Self {
        Self::new(GridSearch::default())
    }
}

impl ModelSelector {
    pub fn new(search: GridSearch) -> Self {
        Self {
            candidates: ModelKind::ALL.to_vec(),
            search,
            seed: 42,
        }
    }

    /// Restrict the registry, keeping the given order
    pub fn with_candidates(mut self, candidates: Vec<ModelKind>) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn candidates(&self) -> &[ModelKind] {
        &self.candidates
    }

    pub fn select_best(
        &self,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
        x_test: &Array2<f64>,
        y_test: &Array1<f64>,
    ) -> Result<SelectedModel> {
        check_labels(y_train)?;
        check_labels(y_test)?;
        if x_train.ncols() != x_test.ncols() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} test features", x_train.ncols()),
                actual: format!("{} test features", x_test.ncols()),
            });
        }

        let mut fitted: Vec<Classifier> = Vec::with_capacity(self.candidates.len());
        let mut scores: Vec<CandidateScore> = Vec::with_capacity(self.candidates.len());

        for &kind in &self.candidates {
            let start = Instant::now();
            let search = self.search.run(kind, x_train, y_train)?;

            let mut model = search.best_params.build(self.seed);
            model.fit(x_train, y_train)?;
            let test_accuracy = accuracy(y_test, &model.predict(x_test)?);

            info!(
                model = kind.name(),
                params = %search.best_params,
                cv_accuracy = search.best_score,
                test_accuracy,
                "candidate evaluated"
            );

            scores.push(CandidateScore {
                kind,
                params: search.best_params,
                cv_accuracy: search.best_score,
                test_accuracy,
                training_time_secs: start.elapsed().as_secs_f64(),
            });
            fitted.push(model);
        }

        let accuracies: Vec<f64> = scores.iter().map(|s| s.test_accuracy).collect();
        let best_idx = pick_best(&accuracies)
            .ok_or_else(|| PipelineError::TrainingError("no candidate models registered".to_string()))?;

        let model = fitted.swap_remove(best_idx);
        let train_metrics = ClassificationMetrics::compute(
            y_train,
            &model.predict(x_train)?,
            &model.predict_proba(x_train)?,
        );
        let test_metrics = ClassificationMetrics::compute(
            y_test,
            &model.predict(x_test)?,
            &model.predict_proba(x_test)?,
        );

        let winner = &scores[best_idx];
        info!(
            model = winner.kind.name(),
            params = %winner.params,
            test_accuracy = winner.test_accuracy,
            "best model selected"
        );

        Ok(SelectedModel {
            model,
            kind: winner.kind,
            params: winner.params,
            train_metrics,
            test_metrics,
            candidates: scores,
        })
    }
}

fn check_labels(y: &Array1<f64>) -> Result<()> {
    if y.is_empty() {
        return Err(PipelineError::TrainingError("no labelled rows".to_string()));
    }
    match y.iter().find(|&&v| v != 0.0 && v != 1.0) {
        Some(bad) => Err(PipelineError::TrainingError(format!(
            "labels must be 0 or 1, found {}",
            bad
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_best_prefers_higher_accuracy() {
        assert_eq!(pick_best(&[0.80, 0.90]), Some(1));
        assert_eq!(pick_best(&[0.90, 0.80]), Some(0));
    }

    #[test]
    fn test_pick_best_tie_goes_to_first() {
        assert_eq!(pick_best(&[0.85, 0.85, 0.85]), Some(0));
        assert_eq!(pick_best(&[0.5, 0.9, 0.9]), Some(1));
        assert_eq!(pick_best(&[]), None);
    }

    #[test]
    fn test_rejects_unmapped_labels() {
        let x = Array2::zeros((4, 2));
        let y = Array1::from_vec(vec![-1.0, 1.0, -1.0, 1.0]);
        let selector = ModelSelector::default();
        assert!(selector.select_best(&x, &y, &x, &y).is_err());
    }
}
