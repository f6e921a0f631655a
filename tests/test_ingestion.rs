//! Integration test: document store ingestion and the train/test split

use phishnet::data::{Dataset, InMemoryCollection, JsonLinesCollection, RowSource, SplitRatio};
use phishnet::error::PipelineError;
use phishnet::pipeline::{DataIngestion, PipelineConfig, PipelineSettings, RunContext};
use phishnet::storage::{ArtifactStoreExt, InMemoryArtifactStore};
use polars::prelude::*;
use serde_json::json;
use std::collections::BTreeSet;

fn numbered(n: i64) -> Dataset {
    let ids: Vec<i64> = (0..n).collect();
    let values: Vec<f64> = (0..n).map(|i| i as f64 * 0.5).collect();
    Dataset::new(df!("row" => ids, "value" => values).unwrap())
}

fn row_ids(dataset: &Dataset) -> Vec<i64> {
    dataset
        .column_values("row")
        .unwrap()
        .into_iter()
        .map(|v| v.unwrap() as i64)
        .collect()
}

#[test]
fn test_split_partitions_every_row_once() {
    for (n, ratio) in [(100, 0.2), (37, 0.3), (10, 0.5)] {
        let dataset = numbered(n);
        let ratio = SplitRatio::new(ratio).unwrap();
        let (train, test) = dataset.train_test_split(ratio, 7).unwrap();

        assert_eq!(train.height() + test.height(), n as usize);
        assert_eq!(test.height(), ratio.test_rows(n as usize));

        let train_ids: BTreeSet<i64> = row_ids(&train).into_iter().collect();
        let test_ids: BTreeSet<i64> = row_ids(&test).into_iter().collect();
        assert!(train_ids.is_disjoint(&test_ids));
        let union: BTreeSet<i64> = train_ids.union(&test_ids).copied().collect();
        assert_eq!(union, (0..n).collect::<BTreeSet<i64>>());
    }
}

#[test]
fn test_split_is_reproducible() {
    let dataset = numbered(50);
    let ratio = SplitRatio::default();

    let (train_a, test_a) = dataset.train_test_split(ratio, 7).unwrap();
    let (train_b, test_b) = dataset.train_test_split(ratio, 7).unwrap();
    assert_eq!(row_ids(&train_a), row_ids(&train_b));
    assert_eq!(row_ids(&test_a), row_ids(&test_b));

    let (_, test_c) = dataset.train_test_split(ratio, 8).unwrap();
    assert_ne!(row_ids(&test_a), row_ids(&test_c));
}

#[test]
fn test_tiny_dataset_cannot_be_split() {
    let dataset = numbered(1);
    assert!(matches!(
        dataset.train_test_split(SplitRatio::default(), 7),
        Err(PipelineError::DataError(_))
    ));
}

#[test]
fn test_ingestion_stage_from_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let collection = JsonLinesCollection::new(dir.path(), "phishnet", "network_data");
    let records = (0..20)
        .map(|i| {
            let value = json!({ "row": i, "URL_Length": if i % 5 == 0 { json!("na") } else { json!(i % 3) } });
            value.as_object().cloned().unwrap()
        })
        .collect();
    collection.insert_many(records).unwrap();

    let store = InMemoryArtifactStore::new();
    let config = PipelineConfig::new(PipelineSettings::default());
    let ctx = RunContext::new(&config);
    let artifact = DataIngestion::new(config.ingestion(), &collection, &store, &ctx)
        .initiate_data_ingestion()
        .unwrap();

    let full = store.read_csv(&artifact.feature_store_file_path).unwrap();
    assert_eq!(full.height(), 20);
    assert!(!full.has_column("_id"));
    let lengths = full.column_values("URL_Length").unwrap();
    assert_eq!(lengths.iter().filter(|v| v.is_none()).count(), 4);

    let train = store.read_csv(&artifact.trained_file_path).unwrap();
    let test = store.read_csv(&artifact.test_file_path).unwrap();
    assert_eq!((train.height(), test.height()), (16, 4));
}

#[test]
fn test_in_memory_collection_assigns_ids() {
    let collection = InMemoryCollection::new();
    let record = json!({ "a": 1 }).as_object().cloned().unwrap();
    collection.insert_many(vec![record.clone(), record]).unwrap();

    let fetched = collection.fetch_all().unwrap();
    assert_eq!(fetched.len(), 2);
    let ids: BTreeSet<String> = fetched
        .iter()
        .map(|r| r["_id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids.len(), 2);
}
