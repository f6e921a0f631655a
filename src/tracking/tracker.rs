//! Run records and the local run tracker

use super::ExperimentSink;
use crate::error::{PipelineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

/// One tracked training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub run_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
    pub tags: BTreeMap<String, String>,
    pub status: RunStatus,
}

impl Run {
    pub fn new(run_id: impl Into<String>, run_name: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            run_name: run_name.into(),
            start_time: Utc::now(),
            end_time: None,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            tags: BTreeMap::new(),
            status: RunStatus::Running,
        }
    }

    pub fn log_param(&mut self, key: impl Into<String>, value: impl ToString) {
        self.params.insert(key.into(), value.to_string());
    }

    pub fn log_metrics(&mut self, metrics: BTreeMap<String, f64>) {
        self.metrics.extend(metrics);
    }

    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(key.into(), value.into());
    }

    pub fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.end_time = Some(Utc::now());
    }

    pub fn duration_secs(&self) -> f64 {
        let end = self.end_time.unwrap_or_else(Utc::now);
        (end - self.start_time).num_milliseconds() as f64 / 1000.0
    }
}

/// Tracker writing `<root>/<run_id>/run.json` and `<root>/<run_id>/model.bin`
#[derive(Debug, Clone)]
pub struct LocalTracker {
    root: PathBuf,
}

impl LocalTracker {
    pub const RUN_FILE: &'static str = "run.json";
    pub const MODEL_FILE: &'static str = "model.bin";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join(run_id)
    }

    pub fn load_run(&self, run_id: &str) -> Result<Run> {
        let path = self.run_dir(run_id).join(Self::RUN_FILE);
        let file = File::open(&path).map_err(|e| {
            PipelineError::IoError(std::io::Error::new(e.kind(), format!("{}: {}", path.display(), e)))
        })?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn load_model_blob(&self, run_id: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.run_dir(run_id).join(Self::MODEL_FILE))?)
    }

    /// Ids of every recorded run, sorted
    pub fn list_runs(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.path().join(Self::RUN_FILE).is_file() {
                ids.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl ExperimentSink for LocalTracker {
    fn log_run(&self, run: &Run, model_blob: &[u8]) -> Result<()> {
        let dir = self.run_dir(&run.run_id);
        fs::create_dir_all(&dir)?;

        let mut writer = BufWriter::new(File::create(dir.join(Self::RUN_FILE))?);
        serde_json::to_writer_pretty(&mut writer, run)?;
        writer.flush()?;

        fs::write(dir.join(Self::MODEL_FILE), model_blob)?;

        info!(
            run_id = %run.run_id,
            metrics = run.metrics.len(),
            model_bytes = model_blob.len(),
            "run tracked"
        );
        Ok(())
    }
}
