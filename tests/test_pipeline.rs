//! Integration test: full training pipeline (store → validation → imputation → model selection)

use phishnet::data::{JsonLinesCollection, Record, RowSource};
use phishnet::error::{PipelineError, StageName};
use phishnet::pipeline::{PipelineConfig, PipelineSettings, PipelineState, TrainingPipeline};
use phishnet::storage::{ArtifactStoreExt, LocalArtifactStore};
use phishnet::tracking::LocalTracker;
use phishnet::training::InferenceModel;
use serde_json::{json, Value};
use std::path::Path;

const N_ROWS: usize = 100;
const N_FEATURES: usize = 10;

/// 100 rows, 10 binary features and a `Result` label in {-1, 1}.
///
/// Every column has at most 6 minority values, so no 80/20 partition can
/// push the KS statistic past 0.3 and no column drifts at 0.05.
fn phishing_records() -> Vec<Record> {
    (0..N_ROWS)
        .map(|i| {
            let phishing = i % 17 == 0;
            let mut record = serde_json::Map::new();
            for j in 0..N_FEATURES {
                let minority = if j == 0 { phishing } else { (i * 7 + j * 13) % 100 < 6 };
                record.insert(format!("f{}", j), json!(if minority { 0 } else { 1 }));
            }
            record.insert("Result".to_string(), json!(if phishing { -1 } else { 1 }));
            record
        })
        .collect()
}

fn write_schema(path: &Path) {
    let mut text = String::from("columns:\n");
    for j in 0..N_FEATURES {
        text.push_str(&format!("  - f{}: int64\n", j));
    }
    text.push_str("  - Result: int64\nnumerical_columns:\n");
    for j in 0..N_FEATURES {
        text.push_str(&format!("  - f{}\n", j));
    }
    std::fs::write(path, text).unwrap();
}

fn settings_in(root: &Path) -> PipelineSettings {
    let schema_path = root.join("schema.yaml");
    write_schema(&schema_path);
    PipelineSettings {
        source_url: root.join("store"),
        artifact_root: root.join("Artifacts"),
        schema_path,
        final_model_dir: root.join("final_model"),
        tracking_dir: root.join("mlruns"),
        ..PipelineSettings::default()
    }
}

fn seed_store(settings: &PipelineSettings) {
    std::fs::create_dir_all(&settings.source_url).unwrap();
    let collection = JsonLinesCollection::new(&settings.source_url, &settings.database, &settings.collection);
    assert_eq!(collection.insert_many(phishing_records()).unwrap(), N_ROWS);
}

#[test]
fn test_end_to_end_run() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_in(dir.path());
    seed_store(&settings);

    let mut pipeline = TrainingPipeline::local(PipelineConfig::new(settings.clone()));
    let training = pipeline.run().unwrap();
    assert_eq!(pipeline.state(), PipelineState::Completed);

    let store = LocalArtifactStore::new();
    let chain = pipeline.artifacts();

    let ingestion = chain.ingestion.as_ref().unwrap();
    assert_eq!(store.read_csv(&ingestion.trained_file_path).unwrap().height(), 80);
    assert_eq!(store.read_csv(&ingestion.test_file_path).unwrap().height(), 20);
    let feature_store = store.read_csv(&ingestion.feature_store_file_path).unwrap();
    assert_eq!(feature_store.width(), N_FEATURES + 1);
    assert!(!feature_store.has_column("_id"));

    let validation = chain.validation.as_ref().unwrap();
    assert!(validation.validation_status);
    assert!(validation.valid_train_file_path.as_ref().unwrap().exists());
    assert!(validation.valid_test_file_path.as_ref().unwrap().exists());
    assert!(validation.invalid_train_file_path.is_none());
    assert!(validation.drift_report_file_path.exists());

    let transformation = chain.transformation.as_ref().unwrap();
    let train = store.read_array(&transformation.transformed_train_file_path).unwrap();
    let test = store.read_array(&transformation.transformed_test_file_path).unwrap();
    assert_eq!(train.dim(), (80, 11));
    assert_eq!(test.dim(), (20, 11));
    assert!(train.column(10).iter().all(|&v| v == 0.0 || v == 1.0));

    assert!((0.0..=1.0).contains(&training.test_metrics.accuracy));
    assert!((0.0..=1.0).contains(&training.train_metrics.accuracy));
    assert!(training.trained_model_file_path.exists());
    assert!(settings.final_model_dir.join("model.bin").exists());
    assert!(settings.final_model_dir.join("preprocessor.bin").exists());

    let model: InferenceModel = store.read_object(&training.trained_model_file_path).unwrap();
    assert_eq!(model.kind(), training.model_kind);
    let x_test = test.slice(ndarray::s![.., ..10]).to_owned();
    assert_eq!(model.predict(&x_test).unwrap().len(), 20);

    let tracker = LocalTracker::new(&settings.tracking_dir);
    let run = tracker.load_run(&training.run_id).unwrap();
    assert!(run.metrics.contains_key("testing_accuracy"));
    assert!(run.metrics.contains_key("training_f1"));
}

#[test]
fn test_missing_target_fails_in_transformation() {
    let dir = tempfile::tempdir().unwrap();
    let settings = PipelineSettings {
        target_column: "Label".to_string(),
        ..settings_in(dir.path())
    };
    seed_store(&settings);

    let mut pipeline = TrainingPipeline::local(PipelineConfig::new(settings));
    let err = pipeline.run().unwrap_err();

    assert_eq!(pipeline.state(), PipelineState::Failed);
    assert_eq!(err.stage(), Some(StageName::Transformation));
    match err {
        PipelineError::Stage { source, .. } => {
            assert!(matches!(*source, PipelineError::MissingColumn(ref c) if c == "Label"))
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(pipeline.artifacts().validation.is_some());
    assert!(pipeline.artifacts().transformation.is_none());
}

#[test]
fn test_unreachable_store_fails_in_ingestion() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_in(dir.path());

    let mut pipeline = TrainingPipeline::local(PipelineConfig::new(settings));
    let err = pipeline.run().unwrap_err();

    assert_eq!(err.stage(), Some(StageName::Ingestion));
    assert!(err.to_string().starts_with("ingestion stage failed"));
    assert!(pipeline.artifacts().ingestion.is_none());
}

#[test]
fn test_pipeline_runs_once() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_in(dir.path());
    let mut pipeline = TrainingPipeline::local(PipelineConfig::new(settings));

    assert!(pipeline.run().is_err());
    assert!(matches!(pipeline.run(), Err(PipelineError::ConfigError(_))));
}

#[test]
fn test_records_survive_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_in(dir.path());
    seed_store(&settings);

    let collection = JsonLinesCollection::new(&settings.source_url, &settings.database, &settings.collection);
    let fetched = collection.fetch_all().unwrap();
    assert_eq!(fetched.len(), N_ROWS);
    assert!(fetched.iter().all(|r| matches!(r.get("_id"), Some(Value::String(_)))));
}
