//! phishnet CLI
//!
//! `run` executes the full training pipeline, `push` loads a CSV file into
//! the document store and `predict` scores a CSV file with a trained model.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::data::{Dataset, JsonLinesCollection, RowSource, SplitRatio};
use crate::error::PipelineError;
use crate::pipeline::{PipelineConfig, PipelineSettings, TrainingPipeline};
use crate::storage::{ArtifactStoreExt, LocalArtifactStore};
use crate::training::InferenceModel;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<20} {}", muted(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "phishnet")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Batch training pipeline for phishing-site classification")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run ingestion, validation, transformation and training
    Run {
        /// Document store root directory
        #[arg(long)]
        source_url: Option<PathBuf>,

        /// Directory holding timestamped run artifacts
        #[arg(long)]
        artifact_root: Option<PathBuf>,

        /// Schema document (YAML)
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Target column name
        #[arg(short, long)]
        target: Option<String>,

        /// Fraction of rows held out for testing
        #[arg(long)]
        split_ratio: Option<f64>,

        /// Cross-validation folds used by the grid search
        #[arg(long)]
        cv_folds: Option<usize>,
    },

    /// Load a CSV file into the document store
    Push {
        /// Input CSV file
        #[arg(long)]
        csv: PathBuf,

        /// Document store root directory
        #[arg(long)]
        source_url: Option<PathBuf>,

        #[arg(long)]
        database: Option<String>,

        #[arg(long)]
        collection: Option<String>,
    },

    /// Score a CSV file with a trained model
    Predict {
        /// Trained model file (preprocessor and classifier)
        #[arg(short, long)]
        model: PathBuf,

        /// Input data file
        #[arg(short, long)]
        data: PathBuf,

        /// Output predictions file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Column dropped from the input before scoring, when present
        #[arg(short, long, default_value = crate::pipeline::config::TARGET_COLUMN)]
        target: String,
    },
}

/// Flag values win over environment and defaults
pub struct RunOverrides {
    pub source_url: Option<PathBuf>,
    pub artifact_root: Option<PathBuf>,
    pub schema: Option<PathBuf>,
    pub target: Option<String>,
    pub split_ratio: Option<f64>,
    pub cv_folds: Option<usize>,
}

impl RunOverrides {
    pub fn apply(self, mut settings: PipelineSettings) -> crate::error::Result<PipelineSettings> {
        if let Some(v) = self.source_url { settings.source_url = v; }
        if let Some(v) = self.artifact_root { settings.artifact_root = v; }
        if let Some(v) = self.schema { settings.schema_path = v; }
        if let Some(v) = self.target { settings.target_column = v; }
        if let Some(v) = self.split_ratio {
            settings.split_ratio = SplitRatio::new(v)
                .map_err(|e| PipelineError::ConfigError(e.to_string()))?;
        }
        if let Some(v) = self.cv_folds { settings.cv_folds = v; }
        settings.validate()?;
        Ok(settings)
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_run(settings: PipelineSettings) -> anyhow::Result<()> {
    section("Training pipeline");

    let config = PipelineConfig::new(settings);
    kv("Artifacts", &config.artifact_dir.display().to_string());
    kv("Source", &config.settings.source_url.display().to_string());

    let start = Instant::now();
    let mut pipeline = TrainingPipeline::local(config);
    match pipeline.run() {
        Ok(training) => {
            let validated = pipeline
                .artifacts()
                .validation
                .as_ref()
                .map(|v| v.validation_status)
                .unwrap_or(false);

            println!();
            kv("Best model", &format!("{} ({})", training.model_kind, training.params));
            kv("Train accuracy", &format!("{:.4}", training.train_metrics.accuracy));
            kv("Test accuracy", &format!("{:.4}", training.test_metrics.accuracy));
            kv("Test F1", &format!("{:.4}", training.test_metrics.f1));
            kv("Model", &training.trained_model_file_path.display().to_string());
            kv("Run id", &training.run_id);
            kv("Time", &format!("{:.2?}", start.elapsed()));
            if !validated {
                println!();
                println!("  {}", "drift detected: review the drift report before using this model".yellow());
            }
            println!();
            Ok(())
        }
        Err(err) => {
            println!();
            println!("  {} {}", "✗".red(), err.to_string().red());
            println!("  {}", muted("artifacts produced before the failure:"));
            let partial = serde_yaml::to_string(pipeline.artifacts())?;
            for line in partial.lines() {
                println!("    {}", dim(line));
            }
            println!();
            Err(err.into())
        }
    }
}

pub fn cmd_push(
    csv: &Path,
    source_url: &Path,
    database: &str,
    collection: &str,
) -> anyhow::Result<()> {
    section("Push");

    step_run(&format!("Reading {}", csv.display()));
    let dataset = Dataset::read_csv(csv)?;
    let records = dataset.to_records()?;
    step_done(&format!("{} rows × {} cols", dataset.height(), dataset.width()));

    let target = JsonLinesCollection::new(source_url, database, collection);
    step_run(&format!("Inserting into {}", target.describe()));
    let inserted = target.insert_many(records)?;
    step_done(&format!("{} records", inserted));

    println!();
    Ok(())
}

pub fn cmd_predict(
    model_path: &Path,
    data_path: &Path,
    output: Option<&Path>,
    target: &str,
) -> anyhow::Result<()> {
    section("Predict");
    let store = LocalArtifactStore::new();

    step_run("Loading model");
    let model: InferenceModel = store.read_object(model_path)?;
    step_done(model.kind().name());

    step_run("Loading data");
    let mut dataset = Dataset::read_csv(data_path)?;
    step_done(&format!("{} rows × {} cols", dataset.height(), dataset.width()));

    let input = if dataset.has_column(target) {
        dataset.drop_column(target)?
    } else {
        dataset.clone()
    };

    step_run("Scoring");
    let start = Instant::now();
    let predictions = model.predict(&input.to_full_matrix()?)?;
    step_done(&format!("{:?}", start.elapsed()));

    let labels: Vec<i64> = predictions.iter().map(|&p| p as i64).collect();
    dataset = dataset.with_column(Series::new("predicted_column".into(), labels).into())?;

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("prediction_output").join("output.csv"));
    store.write_csv(&output, &dataset)?;

    let positives = predictions.iter().filter(|&&p| p == 1.0).count();
    kv("Rows scored", &predictions.len().to_string());
    kv("Label 0", &(predictions.len() - positives).to_string());
    kv("Label 1", &positives.to_string());
    kv("Output", &output.display().to_string());
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_flags_parse() {
        let cli = Cli::try_parse_from(["phishnet", "run", "--split-ratio", "0.3", "--target", "label"]).unwrap();
        match cli.command {
            Commands::Run { split_ratio, target, cv_folds, .. } => {
                assert_eq!(split_ratio, Some(0.3));
                assert_eq!(target.as_deref(), Some("label"));
                assert_eq!(cv_folds, None);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_overrides_win_over_settings() {
        let overrides = RunOverrides {
            source_url: None,
            artifact_root: Some(PathBuf::from("out")),
            schema: None,
            target: None,
            split_ratio: Some(0.25),
            cv_folds: Some(4),
        };
        let settings = overrides.apply(PipelineSettings::default()).unwrap();
        assert_eq!(settings.artifact_root, PathBuf::from("out"));
        assert_eq!(settings.split_ratio.value(), 0.25);
        assert_eq!(settings.cv_folds, 4);
    }

    #[test]
    fn test_bad_override_is_rejected() {
        let overrides = RunOverrides {
            source_url: None,
            artifact_root: None,
            schema: None,
            target: None,
            split_ratio: Some(2.0),
            cv_folds: None,
        };
        assert!(overrides.apply(PipelineSettings::default()).is_err());
    }
}
