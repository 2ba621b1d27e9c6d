//! Housing runner: training orchestration, evaluation and publication.
//!
//! This crate builds on `housing-core` to provide:
//! - TOML pipeline configuration with environment overrides
//! - Time-ordered cross-validation and regression metrics
//! - Experiment trackers (MLflow REST, local directory)
//! - Atomic model/metrics artifacts and the prediction publisher
//! - The end-to-end training pipeline

pub mod artifacts;
pub mod config;
pub mod metrics;
pub mod pipeline;
pub mod publish;
pub mod tracker;
pub mod walk_forward;

pub use config::{ConfigError, CvConfig, PathsConfig, PipelineConfig, TrackerBackend, TrackingConfig};
pub use metrics::{AggregateMetrics, FoldMetrics};
pub use pipeline::{train, PipelineError, TrainingOutcome};
pub use publish::{prepare_publication, publish, Publication, PublishError, PublishedArtifact};
pub use tracker::{build_tracker, ExperimentTracker, FileTracker, MlflowTracker, TrackedRun, TrackerError};
pub use walk_forward::{create_folds, run_walk_forward, FoldSpec, WalkForwardError, WalkForwardResult};
