//! Training stage: model selection, tracking and model export

use super::artifacts::{TrainingArtifact, TransformationArtifact};
use super::config::ModelTrainerConfig;
use super::RunContext;
use crate::error::{PipelineError, Result, StageName};
use crate::imputation::KNNImputer;
use crate::storage::{ArtifactStore, ArtifactStoreExt};
use crate::tracking::{ExperimentSink, Run, RunStatus};
use crate::training::{
    CVStrategy, ClassificationMetrics, GridSearch, InferenceModel, ModelSelector, SelectedModel,
};
use ndarray::{s, Array1, Array2};
use tracing::{info, Span};

pub struct ModelTrainer<'a> {
    config: ModelTrainerConfig,
    store: &'a dyn ArtifactStore,
    sink: &'a dyn ExperimentSink,
    run_id: String,
    pipeline_name: String,
    span: Span,
}

impl<'a> ModelTrainer<'a> {
    pub fn new(
        config: ModelTrainerConfig,
        store: &'a dyn ArtifactStore,
        sink: &'a dyn ExperimentSink,
        ctx: &RunContext,
    ) -> Self {
        Self {
            config,
            store,
            sink,
            run_id: ctx.run_id().to_string(),
            pipeline_name: ctx.pipeline_name().to_string(),
            span: ctx.stage_span(StageName::Training),
        }
    }

    pub fn selector(&self) -> ModelSelector {
        let strategy = CVStrategy::StratifiedKFold {
            n_splits: self.config.cv_folds,
            shuffle: false,
        };
        ModelSelector::new(GridSearch::new(strategy, self.config.seed))
    }

    fn track(&self, selected: &SelectedModel, validated: bool) -> Result<()> {
        let mut run = Run::new(&self.run_id, &self.pipeline_name);
        run.log_param("model", selected.kind.name());
        run.log_param("params", selected.params);
        run.log_param("cv_folds", self.config.cv_folds);
        run.log_metrics(selected.train_metrics.to_named("training"));
        run.log_metrics(selected.test_metrics.to_named("testing"));
        run.set_tag("validated", validated.to_string());
        run.finish(RunStatus::Finished);

        let blob = bincode::serialize(&selected.model)?;
        self.sink.log_run(&run, &blob)
    }

    pub fn initiate_model_trainer(&self, transformation: &TransformationArtifact) -> Result<TrainingArtifact> {
        let _enter = self.span.enter();
        info!("model training started");

        let train = self.store.read_array(&transformation.transformed_train_file_path)?;
        let test = self.store.read_array(&transformation.transformed_test_file_path)?;
        let (x_train, y_train) = split_label_column(&train)?;
        let (x_test, y_test) = split_label_column(&test)?;

        let selected = self.selector().select_best(&x_train, &y_train, &x_test, &y_test)?;
        log_classification_report("train", &selected.train_metrics);
        log_classification_report("test", &selected.test_metrics);

        self.track(&selected, transformation.validated)?;

        let preprocessor: KNNImputer = self.store.read_object(&transformation.transformed_object_file_path)?;
        self.store.write_object(&self.config.final_model_path(), &selected.model)?;
        self.store.write_object(&self.config.final_preprocessor_path(), &preprocessor)?;

        let bound = InferenceModel::new(preprocessor, selected.model);
        self.store.write_object(&self.config.trained_model_file_path, &bound)?;
        info!(
            path = %self.config.trained_model_file_path.display(),
            model = selected.kind.name(),
            "trained model written"
        );

        Ok(TrainingArtifact {
            trained_model_file_path: self.config.trained_model_file_path.clone(),
            final_model_file_path: self.config.final_model_path(),
            model_kind: selected.kind,
            params: selected.params,
            train_metrics: selected.train_metrics,
            test_metrics: selected.test_metrics,
            run_id: self.run_id.clone(),
        })
    }
}

/// Split an array whose last column is the label
pub fn split_label_column(array: &Array2<f64>) -> Result<(Array2<f64>, Array1<f64>)> {
    let n_cols = array.ncols();
    if n_cols < 2 {
        return Err(PipelineError::ShapeError {
            expected: "at least one feature column and a label column".to_string(),
            actual: format!("{} columns", n_cols),
        });
    }
    let features = array.slice(s![.., ..n_cols - 1]).to_owned();
    let labels = array.column(n_cols - 1).to_owned();
    Ok((features, labels))
}

fn log_classification_report(partition: &str, metrics: &ClassificationMetrics) {
    info!(
        partition,
        accuracy = metrics.accuracy,
        precision = metrics.precision,
        recall = metrics.recall,
        f1 = metrics.f1,
        auc_roc = ?metrics.auc_roc,
        "classification report"
    );
}
