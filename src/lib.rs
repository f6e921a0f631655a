//! phishnet - batch training pipeline for phishing-site classification
//!
//! Records are pulled from a document store, split into train and test
//! partitions, checked against a schema and for distribution drift,
//! imputed with a KNN imputer and used to select the best of five
//! classifier families.
//!
//! # Modules
//!
//! - [`data`] - Datasets, schemas and document-store row sources
//! - [`storage`] - Path-addressed artifact store
//! - [`drift`] - Kolmogorov–Smirnov drift detection
//! - [`imputation`] - KNN missing-value imputation
//! - [`training`] - Classifiers, grid search and model selection
//! - [`tracking`] - Experiment run tracking
//! - [`pipeline`] - Stage configuration, artifacts and orchestration
//! - [`cli`] - Command-line interface

pub mod error;

pub mod data;
pub mod storage;

pub mod drift;
pub mod imputation;
pub mod training;

pub mod tracking;
pub mod pipeline;

pub mod cli;

pub use error::{PipelineError, Result, StageName};

/// Common imports
pub mod prelude {
    pub use crate::data::{Dataset, JsonLinesCollection, RowSource, Schema, SchemaValidator, SplitRatio};
    pub use crate::drift::{DriftDetector, DriftReport};
    pub use crate::error::{PipelineError, Result, StageName};
    pub use crate::imputation::{Imputer, KNNImputer};
    pub use crate::pipeline::{
        PipelineConfig, PipelineSettings, PipelineState, TrainingArtifact, TrainingPipeline,
    };
    pub use crate::storage::{ArtifactStore, ArtifactStoreExt, LocalArtifactStore};
    pub use crate::tracking::{ExperimentSink, LocalTracker};
    pub use crate::training::{ClassificationMetrics, InferenceModel, ModelKind, ModelSelector};
}
