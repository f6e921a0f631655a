//! Ingestion stage: document store → feature store → train/test partitions

use super::artifacts::IngestionArtifact;
use super::config::DataIngestionConfig;
use super::RunContext;
use crate::data::{Dataset, RowSource};
use crate::error::{PipelineError, Result, StageName};
use crate::storage::{ArtifactStore, ArtifactStoreExt};
use tracing::{info, Span};

pub struct DataIngestion<'a> {
    config: DataIngestionConfig,
    source: &'a dyn RowSource,
    store: &'a dyn ArtifactStore,
    span: Span,
}

impl<'a> DataIngestion<'a> {
    pub fn new(
        config: DataIngestionConfig,
        source: &'a dyn RowSource,
        store: &'a dyn ArtifactStore,
        ctx: &RunContext,
    ) -> Self {
        Self {
            config,
            source,
            store,
            span: ctx.stage_span(StageName::Ingestion),
        }
    }

    /// Every record of the collection, without the store id and with the
    /// missing token mapped to null
    pub fn export_collection_as_dataset(&self) -> Result<Dataset> {
        let records = self.source.fetch_all()?;
        if records.is_empty() {
            return Err(PipelineError::DataError(format!(
                "{} holds no records",
                self.source.describe()
            )));
        }

        let mut dataset = Dataset::from_records(&records)?;
        let id_field = self.source.id_field();
        if dataset.has_column(id_field) {
            dataset = dataset.drop_column(id_field)?;
        }
        let dataset = dataset.replace_with_missing(&self.config.missing_token)?;

        info!(
            source = %self.source.describe(),
            rows = dataset.height(),
            columns = dataset.width(),
            "collection exported"
        );
        Ok(dataset)
    }

    pub fn export_to_feature_store(&self, dataset: &Dataset) -> Result<()> {
        self.store.write_csv(&self.config.feature_store_file_path, dataset)?;
        info!(path = %self.config.feature_store_file_path.display(), "feature store written");
        Ok(())
    }

    /// Partition with the configured ratio and seed, then persist both sides
    pub fn split_data_as_train_test(&self, dataset: &Dataset) -> Result<(Dataset, Dataset)> {
        let (train, test) = dataset.train_test_split(self.config.split_ratio, self.config.split_seed)?;
        self.store.write_csv(&self.config.training_file_path, &train)?;
        self.store.write_csv(&self.config.testing_file_path, &test)?;

        info!(
            train_rows = train.height(),
            test_rows = test.height(),
            ratio = self.config.split_ratio.value(),
            "train/test split written"
        );
        Ok((train, test))
    }

    pub fn initiate_data_ingestion(&self) -> Result<IngestionArtifact> {
        let _enter = self.span.enter();
        info!("data ingestion started");

        let dataset = self.export_collection_as_dataset()?;
        self.export_to_feature_store(&dataset)?;
        self.split_data_as_train_test(&dataset)?;

        Ok(IngestionArtifact {
            feature_store_file_path: self.config.feature_store_file_path.clone(),
            trained_file_path: self.config.training_file_path.clone(),
            test_file_path: self.config.testing_file_path.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{InMemoryCollection, Record};
    use crate::pipeline::config::{PipelineConfig, PipelineSettings};
    use crate::storage::InMemoryArtifactStore;
    use serde_json::json;

    fn record(i: i64) -> Record {
        let value = json!({
            "_id": format!("id{}", i),
            "having_IP_Address": if i % 2 == 0 { json!(1) } else { json!("na") },
            "URL_Length": i % 3,
            "Result": if i % 4 == 0 { -1 } else { 1 },
        });
        match value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn collection(n: i64) -> InMemoryCollection {
        let source = InMemoryCollection::new();
        source.insert_many((0..n).map(record).collect()).unwrap();
        source
    }

    #[test]
    fn test_export_drops_id_and_missing_token() {
        let source = collection(10);
        let store = InMemoryArtifactStore::new();
        let config = PipelineConfig::new(PipelineSettings::default());
        let ctx = RunContext::new(&config);
        let stage = DataIngestion::new(config.ingestion(), &source, &store, &ctx);

        let dataset = stage.export_collection_as_dataset().unwrap();
        assert!(!dataset.has_column("_id"));
        assert_eq!(dataset.width(), 3);
        let ip = dataset.column_values("having_IP_Address").unwrap();
        assert_eq!(ip.iter().filter(|v| v.is_none()).count(), 5);
    }

    #[test]
    fn test_ingestion_writes_all_partitions() {
        let source = collection(50);
        let store = InMemoryArtifactStore::new();
        let config = PipelineConfig::new(PipelineSettings::default());
        let ctx = RunContext::new(&config);

        let artifact = DataIngestion::new(config.ingestion(), &source, &store, &ctx)
            .initiate_data_ingestion()
            .unwrap();

        let full = store.read_csv(&artifact.feature_store_file_path).unwrap();
        let train = store.read_csv(&artifact.trained_file_path).unwrap();
        let test = store.read_csv(&artifact.test_file_path).unwrap();
        assert_eq!(full.height(), 50);
        assert_eq!(test.height(), 10);
        assert_eq!(train.height(), 40);
    }

    #[test]
    fn test_empty_collection_fails() {
        let source = InMemoryCollection::new();
        let store = InMemoryArtifactStore::new();
        let config = PipelineConfig::new(PipelineSettings::default());
        let ctx = RunContext::new(&config);

        let result = DataIngestion::new(config.ingestion(), &source, &store, &ctx).initiate_data_ingestion();
        assert!(matches!(result, Err(PipelineError::DataError(_))));
    }
}
