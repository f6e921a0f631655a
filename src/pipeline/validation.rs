//! Validation stage: schema checks and train/test drift

use super::artifacts::{IngestionArtifact, ValidationArtifact};
use super::config::DataValidationConfig;
use super::RunContext;
use crate::data::{Dataset, Schema, SchemaValidator};
use crate::drift::DriftDetector;
use crate::error::{Result, StageName};
use crate::storage::{ArtifactStore, ArtifactStoreExt};
use tracing::{info, warn, Span};

pub struct DataValidation<'a> {
    config: DataValidationConfig,
    store: &'a dyn ArtifactStore,
    span: Span,
}

impl<'a> DataValidation<'a> {
    pub fn new(config: DataValidationConfig, store: &'a dyn ArtifactStore, ctx: &RunContext) -> Self {
        Self {
            config,
            store,
            span: ctx.stage_span(StageName::Validation),
        }
    }

    /// Load the schema document and validate against it
    pub fn initiate_data_validation(&self, ingestion: &IngestionArtifact) -> Result<ValidationArtifact> {
        let schema = Schema::from_yaml_file(&self.config.schema_path)?;
        self.validate_with_schema(ingestion, schema)
    }

    pub fn validate_with_schema(&self, ingestion: &IngestionArtifact, schema: Schema) -> Result<ValidationArtifact> {
        let _enter = self.span.enter();
        info!("data validation started");

        let train = self.store.read_csv(&ingestion.trained_file_path)?;
        let test = self.store.read_csv(&ingestion.test_file_path)?;

        let validator = SchemaValidator::new(schema);
        check_schema(&validator, &train, "train");
        check_schema(&validator, &test, "test");

        let detector = DriftDetector::new(self.config.drift_threshold);
        let (drift_found, report) =
            detector.detect(&train, &test, self.store, &self.config.drift_report_file_path)?;

        let (train_path, test_path) = if drift_found {
            warn!(columns = ?report.drifted_columns(), "drift detected; partitions routed to invalid");
            (&self.config.invalid_train_file_path, &self.config.invalid_test_file_path)
        } else {
            (&self.config.valid_train_file_path, &self.config.valid_test_file_path)
        };
        self.store.write_csv(train_path, &train)?;
        self.store.write_csv(test_path, &test)?;

        let valid = !drift_found;
        Ok(ValidationArtifact {
            validation_status: valid,
            valid_train_file_path: valid.then(|| train_path.clone()),
            valid_test_file_path: valid.then(|| test_path.clone()),
            invalid_train_file_path: drift_found.then(|| train_path.clone()),
            invalid_test_file_path: drift_found.then(|| test_path.clone()),
            drift_report_file_path: self.config.drift_report_file_path.clone(),
        })
    }
}

/// Schema mismatches are logged and never stop the run
fn check_schema(validator: &SchemaValidator, dataset: &Dataset, partition: &str) {
    if !validator.column_count_matches(dataset) {
        warn!(partition, "dataframe does not contain all columns declared by the schema");
    }
    if !validator.numerical_columns_match(dataset) {
        warn!(partition, "dataframe does not contain the declared number of numerical columns");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::config::{PipelineConfig, PipelineSettings};
    use crate::storage::InMemoryArtifactStore;
    use polars::prelude::*;
    use crate::data::Schema;

    fn write_partitions(store: &InMemoryArtifactStore, train: Vec<i64>, test: Vec<i64>) -> IngestionArtifact {
        let artifact = IngestionArtifact {
            feature_store_file_path: "fs.csv".into(),
            trained_file_path: "train.csv".into(),
            test_file_path: "test.csv".into(),
        };
        let train = Dataset::new(df!("a" => train).unwrap());
        let test = Dataset::new(df!("a" => test).unwrap());
        store.write_csv(&artifact.trained_file_path, &train).unwrap();
        store.write_csv(&artifact.test_file_path, &test).unwrap();
        artifact
    }

    fn schema() -> Schema {
        Schema::new(vec![("a".to_string(), "int64".to_string())], vec!["a".to_string()]).unwrap()
    }

    #[test]
    fn test_same_distribution_lands_in_valid() {
        let store = InMemoryArtifactStore::new();
        let values: Vec<i64> = (0..40).map(|i| i % 4).collect();
        let ingestion = write_partitions(&store, values.clone(), values);
        let config = PipelineConfig::new(PipelineSettings::default());
        let ctx = RunContext::new(&config);

        let artifact = DataValidation::new(config.validation(), &store, &ctx)
            .validate_with_schema(&ingestion, schema())
            .unwrap();

        assert!(artifact.validation_status);
        assert!(artifact.invalid_train_file_path.is_none());
        assert!(store.exists(artifact.valid_train_file_path.as_ref().unwrap()));
        assert!(store.exists(&artifact.drift_report_file_path));
    }

    #[test]
    fn test_drift_lands_in_invalid() {
        let store = InMemoryArtifactStore::new();
        let ingestion = write_partitions(&store, (0..40).collect(), (100..140).collect());
        let config = PipelineConfig::new(PipelineSettings::default());
        let ctx = RunContext::new(&config);

        let artifact = DataValidation::new(config.validation(), &store, &ctx)
            .validate_with_schema(&ingestion, schema())
            .unwrap();

        assert!(!artifact.validation_status);
        assert!(artifact.valid_test_file_path.is_none());
        assert!(store.exists(artifact.invalid_test_file_path.as_ref().unwrap()));
        assert!(store.exists(&artifact.drift_report_file_path));
    }

    #[test]
    fn test_schema_mismatch_is_not_fatal() {
        let store = InMemoryArtifactStore::new();
        let values: Vec<i64> = (0..20).map(|i| i % 2).collect();
        let ingestion = write_partitions(&store, values.clone(), values);
        let config = PipelineConfig::new(PipelineSettings::default());
        let ctx = RunContext::new(&config);
        let wide = Schema::new(
            vec![("a".to_string(), "int64".to_string()), ("b".to_string(), "int64".to_string())],
            vec!["a".to_string(), "b".to_string()],
        )
        .unwrap();

        let artifact = DataValidation::new(config.validation(), &store, &ctx)
            .validate_with_schema(&ingestion, wide)
            .unwrap();
        assert!(artifact.validation_status);
    }
}
