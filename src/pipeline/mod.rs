//! Training pipeline orchestration
//!
//! Ingestion → Validation → Transformation → Training, run once, strictly in
//! that order. Each stage receives only the artifact of the stage before it.
//! The first failure stops the run; the artifacts produced until then stay
//! available through [`TrainingPipeline::artifacts`].

pub mod artifacts;
pub mod config;
mod ingestion;
mod trainer;
mod transformation;
mod validation;

pub use artifacts::{
    ArtifactChain, IngestionArtifact, TrainingArtifact, TransformationArtifact, ValidationArtifact,
};
pub use config::{
    DataIngestionConfig, DataTransformationConfig, DataValidationConfig, ModelTrainerConfig, PipelineConfig,
    PipelineSettings,
};
pub use ingestion::DataIngestion;
pub use trainer::{split_label_column, ModelTrainer};
pub use transformation::DataTransformation;
pub use validation::DataValidation;

use crate::data::{JsonLinesCollection, RowSource};
use crate::error::{PipelineError, Result, StageName};
use crate::storage::{ArtifactStore, LocalArtifactStore};
use crate::tracking::{ExperimentSink, LocalTracker};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, info_span, Span};
use uuid::Uuid;

/// Lifecycle of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    Created,
    Ingesting,
    Validating,
    Transforming,
    Training,
    Completed,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Per-run logging context handed to every stage
#[derive(Debug)]
pub struct RunContext {
    run_id: String,
    pipeline_name: String,
    span: Span,
}

impl RunContext {
    pub fn new(config: &PipelineConfig) -> Self {
        let run_id = Uuid::new_v4().simple().to_string();
        let span = info_span!(
            "pipeline_run",
            run_id = %run_id,
            timestamp = %config.timestamp,
        );
        Self {
            run_id,
            pipeline_name: config.pipeline_name.clone(),
            span,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn pipeline_name(&self) -> &str {
        &self.pipeline_name
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Child span of the run for one stage
    pub fn stage_span(&self, stage: StageName) -> Span {
        info_span!(parent: &self.span, "stage", name = %stage)
    }
}

pub struct TrainingPipeline {
    config: PipelineConfig,
    source: Arc<dyn RowSource>,
    store: Arc<dyn ArtifactStore>,
    sink: Arc<dyn ExperimentSink>,
    state: PipelineState,
    artifacts: ArtifactChain,
}

impl TrainingPipeline {
    pub fn new(
        config: PipelineConfig,
        source: Arc<dyn RowSource>,
        store: Arc<dyn ArtifactStore>,
        sink: Arc<dyn ExperimentSink>,
    ) -> Self {
        Self {
            config,
            source,
            store,
            sink,
            state: PipelineState::Created,
            artifacts: ArtifactChain::default(),
        }
    }

    /// JSON-lines source, local artifact store and local tracker, all from `config`
    pub fn local(config: PipelineConfig) -> Self {
        let settings = &config.settings;
        let source = JsonLinesCollection::new(&settings.source_url, &settings.database, &settings.collection);
        let sink = LocalTracker::new(&settings.tracking_dir);
        Self::new(config, Arc::new(source), Arc::new(LocalArtifactStore::new()), Arc::new(sink))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Artifacts produced so far, complete or not
    pub fn artifacts(&self) -> &ArtifactChain {
        &self.artifacts
    }

    pub fn run(&mut self) -> Result<TrainingArtifact> {
        if self.state != PipelineState::Created {
            return Err(PipelineError::ConfigError(format!(
                "pipeline already ran (state {})",
                self.state
            )));
        }

        let ctx = RunContext::new(&self.config);
        let _enter = ctx.span().clone().entered();
        info!(artifact_dir = %self.config.artifact_dir.display(), "training pipeline started");

        self.state = PipelineState::Ingesting;
        let result = DataIngestion::new(self.config.ingestion(), self.source.as_ref(), self.store.as_ref(), &ctx)
            .initiate_data_ingestion();
        let ingestion = self.stage_result(result, StageName::Ingestion)?;
        self.artifacts.ingestion = Some(ingestion.clone());

        self.state = PipelineState::Validating;
        let result = DataValidation::new(self.config.validation(), self.store.as_ref(), &ctx)
            .initiate_data_validation(&ingestion);
        let validation = self.stage_result(result, StageName::Validation)?;
        self.artifacts.validation = Some(validation.clone());

        self.state = PipelineState::Transforming;
        let result = DataTransformation::new(self.config.transformation(), self.store.as_ref(), &ctx)
            .initiate_data_transformation(&validation);
        let transformation = self.stage_result(result, StageName::Transformation)?;
        self.artifacts.transformation = Some(transformation.clone());

        self.state = PipelineState::Training;
        let result = ModelTrainer::new(self.config.trainer(), self.store.as_ref(), self.sink.as_ref(), &ctx)
            .initiate_model_trainer(&transformation);
        let training = self.stage_result(result, StageName::Training)?;
        self.artifacts.training = Some(training.clone());

        self.state = PipelineState::Completed;
        info!(
            model = training.model_kind.name(),
            test_accuracy = training.test_metrics.accuracy,
            validated = validation.validation_status,
            "training pipeline completed"
        );
        Ok(training)
    }

    fn stage_result<T>(&mut self, result: Result<T>, stage: StageName) -> Result<T> {
        result.map_err(|e| {
            self.state = PipelineState::Failed;
            error!(stage = %stage, error = %e, "stage failed");
            e.in_stage(stage)
        })
    }
}
