//! Transformation stage: KNN imputation fitted on the train partition

use super::artifacts::{TransformationArtifact, ValidationArtifact};
use super::config::DataTransformationConfig;
use super::RunContext;
use crate::data::Dataset;
use crate::error::{PipelineError, Result, StageName};
use crate::imputation::{Imputer, KNNImputer};
use crate::storage::{ArtifactStore, ArtifactStoreExt};
use ndarray::{concatenate, Array1, Array2, Axis};
use tracing::{info, warn, Span};

pub struct DataTransformation<'a> {
    config: DataTransformationConfig,
    store: &'a dyn ArtifactStore,
    span: Span,
}

impl<'a> DataTransformation<'a> {
    pub fn new(config: DataTransformationConfig, store: &'a dyn ArtifactStore, ctx: &RunContext) -> Self {
        Self {
            config,
            store,
            span: ctx.stage_span(StageName::Transformation),
        }
    }

    pub fn get_data_transformer_object(&self) -> KNNImputer {
        KNNImputer::new(self.config.n_neighbors)
    }

    /// Feature column names: every column except the target, in table order
    pub fn feature_columns(&self, dataset: &Dataset) -> Result<Vec<String>> {
        if !dataset.has_column(&self.config.target_column) {
            return Err(PipelineError::MissingColumn(self.config.target_column.clone()));
        }
        Ok(dataset
            .column_names()
            .into_iter()
            .filter(|name| *name != self.config.target_column)
            .collect())
    }

    /// Target column with the negative label remapped to 0
    pub fn target_labels(&self, dataset: &Dataset) -> Result<Array1<f64>> {
        let negative = self.config.negative_label;
        Ok(dataset
            .column_array(&self.config.target_column)?
            .mapv(|v| if v == negative { 0.0 } else { v }))
    }

    pub fn initiate_data_transformation(&self, validation: &ValidationArtifact) -> Result<TransformationArtifact> {
        let _enter = self.span.enter();
        info!("data transformation started");

        if !validation.validation_status {
            warn!(
                report = %validation.drift_report_file_path.display(),
                "transforming partitions that failed validation"
            );
        }
        let train_path = validation
            .train_file_path()
            .ok_or_else(|| PipelineError::ValidationError("validation produced no train partition".to_string()))?;
        let test_path = validation
            .test_file_path()
            .ok_or_else(|| PipelineError::ValidationError("validation produced no test partition".to_string()))?;

        let train = self.store.read_csv(train_path)?;
        let test = self.store.read_csv(test_path)?;

        let features = self.feature_columns(&train)?;
        if !test.has_column(&self.config.target_column) {
            return Err(PipelineError::MissingColumn(self.config.target_column.clone()));
        }
        let train_x = train.to_matrix(&features)?;
        let test_x = test.to_matrix(&features)?;
        let train_y = self.target_labels(&train)?;
        let test_y = self.target_labels(&test)?;

        let mut imputer = self.get_data_transformer_object();
        let train_x = imputer.fit_transform(&train_x)?;
        let test_x = imputer.transform(&test_x)?;

        let train_array = with_label_column(&train_x, train_y)?;
        let test_array = with_label_column(&test_x, test_y)?;

        self.store.write_array(&self.config.transformed_train_file_path, &train_array)?;
        self.store.write_array(&self.config.transformed_test_file_path, &test_array)?;
        self.store.write_object(&self.config.transformed_object_file_path, &imputer)?;

        info!(
            features = features.len(),
            train_shape = ?train_array.dim(),
            test_shape = ?test_array.dim(),
            n_neighbors = imputer.n_neighbors(),
            "transformed arrays written"
        );

        Ok(TransformationArtifact {
            transformed_object_file_path: self.config.transformed_object_file_path.clone(),
            transformed_train_file_path: self.config.transformed_train_file_path.clone(),
            transformed_test_file_path: self.config.transformed_test_file_path.clone(),
            validated: validation.validation_status,
        })
    }
}

/// Features followed by the label as the last column
fn with_label_column(features: &Array2<f64>, labels: Array1<f64>) -> Result<Array2<f64>> {
    let labels = labels.insert_axis(Axis(1));
    Ok(concatenate(Axis(1), &[features.view(), labels.view()])?)
}
