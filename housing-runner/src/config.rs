//! Pipeline configuration: file locations, tracking, forest and CV settings.
//!
//! Every section has defaults, so an empty TOML document is a valid config.
//! Tracking settings are overlaid from `MLFLOW_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use housing_core::model::ForestParams;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub tracking: TrackingConfig,
    pub forest: ForestParams,
    pub cv: CvConfig,
    /// Rebuild the unified dataset even if the file already exists.
    pub rebuild_dataset: bool,
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.forest.n_estimators == 0 {
            return Err(ConfigError::Invalid("forest.n_estimators must be >= 1".into()));
        }
        if self.cv.n_splits < 2 {
            return Err(ConfigError::Invalid("cv.n_splits must be >= 2".into()));
        }
        Ok(())
    }

    /// Re-root every relative path under `root`.
    pub fn rooted_at(mut self, root: &Path) -> Self {
        self.paths = self.paths.rooted_at(root);
        if let TrackerBackend::File { dir } = &self.tracking.backend {
            self.tracking.backend = TrackerBackend::File {
                dir: root.join(dir),
            };
        }
        self
    }
}

/// Input and output file locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub prices: PathBuf,
    pub macro_series: PathBuf,
    pub dataset: PathBuf,
    pub model: PathBuf,
    pub metrics: PathBuf,
    pub published_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            prices: PathBuf::from("data/raw/prices_powiat_q.csv"),
            macro_series: PathBuf::from("data/raw/inflacja_kwartalna_model.csv"),
            dataset: PathBuf::from("data/processed/dataset_powiat_q.csv"),
            model: PathBuf::from("models/model.json"),
            metrics: PathBuf::from("reports/metrics.json"),
            published_dir: PathBuf::from("data/published"),
        }
    }
}

impl PathsConfig {
    pub fn rooted_at(self, root: &Path) -> Self {
        Self {
            prices: root.join(self.prices),
            macro_series: root.join(self.macro_series),
            dataset: root.join(self.dataset),
            model: root.join(self.model),
            metrics: root.join(self.metrics),
            published_dir: root.join(self.published_dir),
        }
    }
}

/// Where run parameters, metrics and the model are recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackerBackend {
    /// MLflow tracking server over its REST API.
    Mlflow,
    /// Local directory of JSONL run records.
    File { dir: PathBuf },
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub backend: TrackerBackend,
    pub tracking_uri: String,
    pub experiment_name: String,
    pub run_name: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            backend: TrackerBackend::Mlflow,
            tracking_uri: "http://mlflow:5000".to_string(),
            experiment_name: "housing-pl".to_string(),
            run_name: "rf_powiat_q".to_string(),
        }
    }
}

impl TrackingConfig {
    /// Overlay `MLFLOW_TRACKING_URI` and `MLFLOW_EXPERIMENT_NAME`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(uri) = std::env::var("MLFLOW_TRACKING_URI") {
            if !uri.is_empty() {
                self.tracking_uri = uri;
            }
        }
        if let Ok(name) = std::env::var("MLFLOW_EXPERIMENT_NAME") {
            if !name.is_empty() {
                self.experiment_name = name;
            }
        }
        self
    }

    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }
}

/// Time-ordered cross-validation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CvConfig {
    pub n_splits: usize,
}

impl Default for CvConfig {
    fn default() -> Self {
        Self { n_splits: 5 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.forest.n_estimators, 400);
        assert_eq!(config.forest.random_state, 42);
        assert_eq!(config.cv.n_splits, 5);
        assert_eq!(config.tracking.run_name, "rf_powiat_q");
        assert_eq!(
            config.paths.dataset,
            PathBuf::from("data/processed/dataset_powiat_q.csv")
        );
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = PipelineConfig::from_toml(
            r#"
[forest]
n_estimators = 10

[paths]
published_dir = "out/published"

[tracking.backend]
type = "file"
dir = "mlruns"
"#,
        )
        .unwrap();

        assert_eq!(config.forest.n_estimators, 10);
        assert_eq!(config.forest.random_state, 42);
        assert_eq!(config.paths.published_dir, PathBuf::from("out/published"));
        assert_eq!(config.paths.model, PathBuf::from("models/model.json"));
        assert_eq!(
            config.tracking.backend,
            TrackerBackend::File {
                dir: PathBuf::from("mlruns")
            }
        );
    }

    #[test]
    fn disabled_backend_parses() {
        let config = PipelineConfig::from_toml(
            r#"
[tracking.backend]
type = "disabled"
"#,
        )
        .unwrap();
        assert_eq!(config.tracking.backend, TrackerBackend::Disabled);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            PipelineConfig::from_toml("[cv]\nn_splits = 1\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PipelineConfig::from_toml("[forest]\nn_estimators = 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PipelineConfig::from_toml("[cv\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn rooting_prefixes_every_path() {
        let root = Path::new("/tmp/run");
        let paths = PathsConfig::default().rooted_at(root);
        assert_eq!(paths.prices, root.join("data/raw/prices_powiat_q.csv"));
        assert_eq!(paths.published_dir, root.join("data/published"));
    }

    #[test]
    fn from_file_reports_missing_path() {
        let err = PipelineConfig::from_file(Path::new("/nonexistent/housing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
