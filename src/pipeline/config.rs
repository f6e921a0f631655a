//! Run-scoped configuration
//!
//! [`PipelineConfig`] fixes one timestamped artifact directory per run; every
//! stage configuration is derived from it.

use crate::data::SplitRatio;
use crate::drift::DEFAULT_DRIFT_THRESHOLD;
use crate::error::{PipelineError, Result};
use chrono::{DateTime, Local};
use std::path::PathBuf;

pub const PIPELINE_NAME: &str = "phishnet";
pub const ARTIFACT_DIR: &str = "Artifacts";
pub const TIMESTAMP_FORMAT: &str = "%m_%d_%Y_%H_%M_%S";
pub const TARGET_COLUMN: &str = "Result";
pub const SCHEMA_FILE_PATH: &str = "data_schema/schema.yaml";
pub const FINAL_MODEL_DIR: &str = "final_model";
pub const TRACKING_DIR: &str = "mlruns";
pub const MISSING_TOKEN: &str = "na";

pub const SOURCE_URL: &str = "data_store";
pub const DATABASE_NAME: &str = "phishnet";
pub const COLLECTION_NAME: &str = "network_data";

pub const FEATURE_STORE_FILE_NAME: &str = "phishing_data.csv";
pub const TRAIN_FILE_NAME: &str = "train.csv";
pub const TEST_FILE_NAME: &str = "test.csv";
pub const TRAIN_ARRAY_FILE_NAME: &str = "train.bin";
pub const TEST_ARRAY_FILE_NAME: &str = "test.bin";
pub const PREPROCESSOR_FILE_NAME: &str = "preprocessor.bin";
pub const MODEL_FILE_NAME: &str = "model.bin";

pub const SPLIT_SEED: u64 = 7;
pub const MODEL_SEED: u64 = 42;
pub const CV_FOLDS: usize = 3;
pub const IMPUTER_NEIGHBORS: usize = 3;
/// Raw label of the negative class, remapped to 0 before training
pub const NEGATIVE_LABEL: f64 = -1.0;

/// Overridable settings, resolved once before a run starts
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Root directory of the document store
    pub source_url: PathBuf,
    pub database: String,
    pub collection: String,
    pub artifact_root: PathBuf,
    pub schema_path: PathBuf,
    pub target_column: String,
    pub split_ratio: SplitRatio,
    pub cv_folds: usize,
    pub final_model_dir: PathBuf,
    pub tracking_dir: PathBuf,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            source_url: PathBuf::from(SOURCE_URL),
            database: DATABASE_NAME.to_string(),
            collection: COLLECTION_NAME.to_string(),
            artifact_root: PathBuf::from(ARTIFACT_DIR),
            schema_path: PathBuf::from(SCHEMA_FILE_PATH),
            target_column: TARGET_COLUMN.to_string(),
            split_ratio: SplitRatio::default(),
            cv_folds: CV_FOLDS,
            final_model_dir: PathBuf::from(FINAL_MODEL_DIR),
            tracking_dir: PathBuf::from(TRACKING_DIR),
        }
    }
}

impl PipelineSettings {
    /// Defaults overridden by `PHISHNET_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `PHISHNET_*` key
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let split_ratio = match lookup("PHISHNET_SPLIT_RATIO") {
            Some(raw) => {
                let value: f64 = raw.trim().parse().map_err(|_| {
                    PipelineError::ConfigError(format!("PHISHNET_SPLIT_RATIO is not a number: {}", raw))
                })?;
                SplitRatio::new(value).map_err(|e| PipelineError::ConfigError(e.to_string()))?
            }
            None => defaults.split_ratio,
        };

        let cv_folds = match lookup("PHISHNET_CV_FOLDS") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                PipelineError::ConfigError(format!("PHISHNET_CV_FOLDS is not an integer: {}", raw))
            })?,
            None => defaults.cv_folds,
        };

        let settings = Self {
            source_url: lookup("PHISHNET_SOURCE_URL").map(PathBuf::from).unwrap_or(defaults.source_url),
            database: lookup("PHISHNET_DATABASE").unwrap_or(defaults.database),
            collection: lookup("PHISHNET_COLLECTION").unwrap_or(defaults.collection),
            artifact_root: lookup("PHISHNET_ARTIFACT_ROOT").map(PathBuf::from).unwrap_or(defaults.artifact_root),
            schema_path: lookup("PHISHNET_SCHEMA").map(PathBuf::from).unwrap_or(defaults.schema_path),
            target_column: lookup("PHISHNET_TARGET").unwrap_or(defaults.target_column),
            split_ratio,
            cv_folds,
            final_model_dir: lookup("PHISHNET_FINAL_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.final_model_dir),
            tracking_dir: lookup("PHISHNET_TRACKING_DIR").map(PathBuf::from).unwrap_or(defaults.tracking_dir),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cv_folds < 2 {
            return Err(PipelineError::ConfigError(format!(
                "cv folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if self.target_column.trim().is_empty() {
            return Err(PipelineError::ConfigError("target column is empty".to_string()));
        }
        Ok(())
    }
}

/// Configuration root of one run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub pipeline_name: String,
    pub timestamp: String,
    /// `<artifact_root>/<timestamp>`
    pub artifact_dir: PathBuf,
    pub settings: PipelineSettings,
}

impl PipelineConfig {
    pub fn new(settings: PipelineSettings) -> Self {
        Self::at(settings, Local::now())
    }

    /// Configuration for a run started at `started`
    pub fn at(settings: PipelineSettings, started: DateTime<Local>) -> Self {
        let timestamp = started.format(TIMESTAMP_FORMAT).to_string();
        Self {
            pipeline_name: PIPELINE_NAME.to_string(),
            artifact_dir: settings.artifact_root.join(&timestamp),
            timestamp,
            settings,
        }
    }

    pub fn ingestion(&self) -> DataIngestionConfig {
        let dir = self.artifact_dir.join("data_ingestion");
        DataIngestionConfig {
            feature_store_file_path: dir.join("feature_store").join(FEATURE_STORE_FILE_NAME),
            training_file_path: dir.join("ingested").join(TRAIN_FILE_NAME),
            testing_file_path: dir.join("ingested").join(TEST_FILE_NAME),
            split_ratio: self.settings.split_ratio,
            split_seed: SPLIT_SEED,
            missing_token: MISSING_TOKEN.to_string(),
        }
    }

    pub fn validation(&self) -> DataValidationConfig {
        let dir = self.artifact_dir.join("data_validation");
        DataValidationConfig {
            valid_train_file_path: dir.join("validated").join(TRAIN_FILE_NAME),
            valid_test_file_path: dir.join("validated").join(TEST_FILE_NAME),
            invalid_train_file_path: dir.join("invalid").join(TRAIN_FILE_NAME),
            invalid_test_file_path: dir.join("invalid").join(TEST_FILE_NAME),
            drift_report_file_path: dir.join("drift_report").join("report.yaml"),
            schema_path: self.settings.schema_path.clone(),
            drift_threshold: DEFAULT_DRIFT_THRESHOLD,
        }
    }

    pub fn transformation(&self) -> DataTransformationConfig {
        let dir = self.artifact_dir.join("data_transformation");
        DataTransformationConfig {
            transformed_train_file_path: dir.join("transformed").join(TRAIN_ARRAY_FILE_NAME),
            transformed_test_file_path: dir.join("transformed").join(TEST_ARRAY_FILE_NAME),
            transformed_object_file_path: dir.join("transformed_object").join(PREPROCESSOR_FILE_NAME),
            target_column: self.settings.target_column.clone(),
            negative_label: NEGATIVE_LABEL,
            n_neighbors: IMPUTER_NEIGHBORS,
        }
    }

    pub fn trainer(&self) -> ModelTrainerConfig {
        let dir = self.artifact_dir.join("model_trainer");
        ModelTrainerConfig {
            trained_model_file_path: dir.join("trained_model").join(MODEL_FILE_NAME),
            final_model_dir: self.settings.final_model_dir.clone(),
            cv_folds: self.settings.cv_folds,
            seed: MODEL_SEED,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DataIngestionConfig {
    pub feature_store_file_path: PathBuf,
    pub training_file_path: PathBuf,
    pub testing_file_path: PathBuf,
    pub split_ratio: SplitRatio,
    pub split_seed: u64,
    pub missing_token: String,
}

#[derive(Debug, Clone)]
pub struct DataValidationConfig {
    pub valid_train_file_path: PathBuf,
    pub valid_test_file_path: PathBuf,
    pub invalid_train_file_path: PathBuf,
    pub invalid_test_file_path: PathBuf,
    pub drift_report_file_path: PathBuf,
    pub schema_path: PathBuf,
    pub drift_threshold: f64,
}

#[derive(Debug, Clone)]
pub struct DataTransformationConfig {
    pub transformed_train_file_path: PathBuf,
    pub transformed_test_file_path: PathBuf,
    pub transformed_object_file_path: PathBuf,
    pub target_column: String,
    pub negative_label: f64,
    pub n_neighbors: usize,
}

#[derive(Debug, Clone)]
pub struct ModelTrainerConfig {
    pub trained_model_file_path: PathBuf,
    pub final_model_dir: PathBuf,
    pub cv_folds: usize,
    pub seed: u64,
}

impl ModelTrainerConfig {
    pub fn final_model_path(&self) -> PathBuf {
        self.final_model_dir.join(MODEL_FILE_NAME)
    }

    pub fn final_preprocessor_path(&self) -> PathBuf {
        self.final_model_dir.join(PREPROCESSOR_FILE_NAME)
    }
}
