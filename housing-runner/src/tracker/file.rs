//! Local-directory tracker.
//!
//! Layout under the root:
//! - `<experiment>/runs.jsonl`: one JSON record per run, append-only
//! - `<experiment>/<run_id>/model/model.json`: the run's model

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{ExperimentTracker, TrackedRun, TrackerError, MODEL_ARTIFACT_PATH};

/// One line of `runs.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRunRecord {
    pub run_id: String,
    pub run_name: String,
    pub experiment: String,
    /// RFC 3339 UTC timestamp.
    pub logged_at: String,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
    pub artifacts: Vec<String>,
}

pub struct FileTracker {
    root: PathBuf,
    experiment: String,
}

impl FileTracker {
    pub fn new(root: PathBuf, experiment: &str) -> Self {
        Self {
            root,
            experiment: experiment.to_string(),
        }
    }

    pub fn experiment_dir(&self) -> PathBuf {
        self.root.join(&self.experiment)
    }

    pub fn runs_file(&self) -> PathBuf {
        self.experiment_dir().join("runs.jsonl")
    }

    /// Read every record. Malformed lines are skipped with a warning.
    pub fn read_runs(&self) -> Result<Vec<FileRunRecord>, TrackerError> {
        let path = self.runs_file();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(&path).map_err(|e| io_err(&path, e))?;
        let mut records = Vec::new();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| io_err(&path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(line = line_no + 1, error = %e, "skipping malformed run record"),
            }
        }
        Ok(records)
    }

    fn run_id(&self, run: &TrackedRun, logged_at: &str) -> Result<String, TrackerError> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.experiment.as_bytes());
        hasher.update(run.run_name.as_bytes());
        hasher.update(logged_at.as_bytes());
        hasher.update(serde_json::to_string(&run.params)?.as_bytes());
        hasher.update(serde_json::to_string(&run.metrics)?.as_bytes());
        hasher.update(run.model_json.as_bytes());
        let hex = hasher.finalize().to_hex();
        Ok(hex[..32].to_string())
    }
}

impl ExperimentTracker for FileTracker {
    fn name(&self) -> &str {
        "file"
    }

    fn log_run(&self, run: &TrackedRun) -> Result<String, TrackerError> {
        let logged_at = chrono::Utc::now().to_rfc3339();
        let run_id = self.run_id(run, &logged_at)?;

        let model_path = self.experiment_dir().join(&run_id).join(MODEL_ARTIFACT_PATH);
        if let Some(parent) = model_path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        fs::write(&model_path, run.model_json.as_bytes()).map_err(|e| io_err(&model_path, e))?;

        let record = FileRunRecord {
            run_id: run_id.clone(),
            run_name: run.run_name.clone(),
            experiment: self.experiment.clone(),
            logged_at,
            params: run.params.clone(),
            metrics: run.metrics.clone(),
            artifacts: vec![MODEL_ARTIFACT_PATH.to_string()],
        };
        let line = serde_json::to_string(&record)?;

        let runs_path = self.runs_file();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&runs_path)
            .map_err(|e| io_err(&runs_path, e))?;
        writeln!(file, "{line}").map_err(|e| io_err(&runs_path, e))?;
        file.flush().map_err(|e| io_err(&runs_path, e))?;

        info!(run_id = %run_id, path = %runs_path.display(), "run recorded");
        Ok(run_id)
    }
}

fn io_err(path: &Path, source: std::io::Error) -> TrackerError {
    TrackerError::Io {
        path: path.to_path_buf(),
        source,
    }
}
