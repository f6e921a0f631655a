//! Experiment tracking
//!
//! A sink receives one [`Run`] (params, metrics, tags, status) plus the
//! serialized winning model per training run.

mod tracker;

pub use tracker::{LocalTracker, Run, RunStatus};

use crate::error::Result;

/// Destination for tracked runs
pub trait ExperimentSink: Send + Sync {
    fn log_run(&self, run: &Run, model_blob: &[u8]) -> Result<()>;
}
