//! Experiment tracking: a record of each training run's parameters, metrics
//! and model, kept outside the local artifact files.

pub mod file;
pub mod mlflow;

pub use file::{FileRunRecord, FileTracker};
pub use mlflow::MlflowTracker;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::{TrackerBackend, TrackingConfig};

/// Relative artifact path the serialized model is stored under.
pub const MODEL_ARTIFACT_PATH: &str = "model/model.json";

/// Everything a tracker records for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedRun {
    pub run_name: String,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
    /// Serialized model stored at [`MODEL_ARTIFACT_PATH`].
    #[serde(skip)]
    pub model_json: String,
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("tracking request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("tracking server returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("tracking IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("tracking payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("unsupported artifact URI: {0}")]
    UnsupportedArtifactUri(String),
}

/// A sink for run records. Returns the tracker-assigned run id.
pub trait ExperimentTracker: Send + Sync {
    fn name(&self) -> &str;

    fn log_run(&self, run: &TrackedRun) -> Result<String, TrackerError>;
}

/// Build the configured tracker, or `None` when tracking is disabled.
pub fn build_tracker(
    config: &TrackingConfig,
) -> Result<Option<Box<dyn ExperimentTracker>>, TrackerError> {
    Ok(match &config.backend {
        TrackerBackend::Mlflow => Some(Box::new(MlflowTracker::new(
            &config.tracking_uri,
            &config.experiment_name,
        )?)),
        TrackerBackend::File { dir } => Some(Box::new(FileTracker::new(
            dir.clone(),
            &config.experiment_name,
        ))),
        TrackerBackend::Disabled => None,
    })
}
