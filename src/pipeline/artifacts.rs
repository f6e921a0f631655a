//! Stage outputs handed from one stage to the next

use crate::training::{ClassificationMetrics, Hyperparams, ModelKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionArtifact {
    pub feature_store_file_path: PathBuf,
    pub trained_file_path: PathBuf,
    pub test_file_path: PathBuf,
}

/// Exactly one of the valid/invalid path pairs is set, according to
/// `validation_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationArtifact {
    pub validation_status: bool,
    pub valid_train_file_path: Option<PathBuf>,
    pub valid_test_file_path: Option<PathBuf>,
    pub invalid_train_file_path: Option<PathBuf>,
    pub invalid_test_file_path: Option<PathBuf>,
    pub drift_report_file_path: PathBuf,
}

impl ValidationArtifact {
    /// Train partition, wherever validation routed it
    pub fn train_file_path(&self) -> Option<&Path> {
        self.valid_train_file_path
            .as_deref()
            .or(self.invalid_train_file_path.as_deref())
    }

    pub fn test_file_path(&self) -> Option<&Path> {
        self.valid_test_file_path
            .as_deref()
            .or(self.invalid_test_file_path.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationArtifact {
    pub transformed_object_file_path: PathBuf,
    pub transformed_train_file_path: PathBuf,
    pub transformed_test_file_path: PathBuf,
    /// False when the data came from the invalid (drifted) partition
    pub validated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingArtifact {
    pub trained_model_file_path: PathBuf,
    pub final_model_file_path: PathBuf,
    pub model_kind: ModelKind,
    pub params: Hyperparams,
    pub train_metrics: ClassificationMetrics,
    pub test_metrics: ClassificationMetrics,
    pub run_id: String,
}

/// Every artifact produced so far in a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactChain {
    pub ingestion: Option<IngestionArtifact>,
    pub validation: Option<ValidationArtifact>,
    pub transformation: Option<TransformationArtifact>,
    pub training: Option<TrainingArtifact>,
}
