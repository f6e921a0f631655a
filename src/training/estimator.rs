//! Imputer and classifier bound together for inference

use super::models::{Classifier, ModelKind};
use crate::imputation::{Imputer, KNNImputer};
use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// A fitted preprocessor paired with the model trained on its output.
///
/// Raw feature rows go in, labels come out; the same imputation that was
/// applied during training is always applied before prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceModel {
    preprocessor: KNNImputer,
    model: Classifier,
}

impl InferenceModel {
    pub fn new(preprocessor: KNNImputer, model: Classifier) -> Self {
        Self { preprocessor, model }
    }

    pub fn preprocessor(&self) -> &KNNImputer {
        &self.preprocessor
    }

    pub fn model(&self) -> &Classifier {
        &self.model
    }

    pub fn kind(&self) -> ModelKind {
        self.model.kind()
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let features = self.preprocessor.transform(x)?;
        self.model.predict(&features)
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let features = self.preprocessor.transform(x)?;
        self.model.predict_proba(&features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::decision_tree::Criterion;
    use crate::training::models::Hyperparams;
    use ndarray::array;

    #[test]
    fn test_imputes_before_predicting() {
        let x = array![[0.0, 1.0], [1.0, 1.0], [2.0, 1.0], [10.0, 0.0], [11.0, 0.0], [12.0, 0.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut imputer = KNNImputer::new(2);
        let features = imputer.fit_transform(&x).unwrap();
        let mut model = Hyperparams::DecisionTree { criterion: Criterion::Gini }.build(42);
        model.fit(&features, &y).unwrap();

        let bound = InferenceModel::new(imputer, model);
        // first feature missing; neighbors by the second feature decide it
        let raw = array![[f64::NAN, 0.0], [f64::NAN, 1.0]];
        assert_eq!(bound.predict(&raw).unwrap(), array![1.0, 0.0]);
    }
}
