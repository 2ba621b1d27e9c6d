//! Training pipeline: dataset → CV → final fit → tracking, artifacts and
//! publication.
//!
//! Everything that can fail on the data or the model runs before the first
//! sink is written. The write phase records the tracker run, then stages the
//! model, metrics and prediction files and commits them together: a failure
//! while staging leaves all three previous files in place.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

use housing_core::data::{ensure_dataset, load_dataset, DataError, DatasetStatus, TrainingWindow};
use housing_core::model::{targets, FeatureMatrix, ModelError, RandomForest, FEATURE_COLUMNS};

use crate::artifacts::{self, StagedFile};
use crate::config::PipelineConfig;
use crate::metrics::{AggregateMetrics, FoldMetrics};
use crate::publish::{prepare_publication, Publication, PublishError, PublishedArtifact};
use crate::tracker::{ExperimentTracker, TrackedRun, TrackerError};
use crate::walk_forward::{run_walk_forward, WalkForwardError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Data(#[from] DataError),
    #[error("training window {from_year}..={to_year} contains no rows")]
    EmptyWindow { from_year: i32, to_year: i32 },
    #[error("cross-validation failed: {0}")]
    WalkForward(#[from] WalkForwardError),
    #[error("final fit failed: {0}")]
    Model(#[from] ModelError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error("experiment tracking failed: {0}")]
    Tracker(#[from] TrackerError),
    #[error(transparent)]
    Artifact(#[from] anyhow::Error),
}

/// What one successful run produced.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingOutcome {
    #[serde(skip)]
    pub dataset_status: DatasetStatus,
    pub dataset_hash: String,
    pub window: TrainingWindow,
    pub rows: usize,
    pub folds: Vec<FoldMetrics>,
    pub metrics: AggregateMetrics,
    pub published: PublishedArtifact,
    pub model_path: PathBuf,
    pub metrics_path: PathBuf,
    pub tracker_run_id: Option<String>,
}

/// Run the full training pipeline for `window`.
///
/// `tracker` is optional; `None` skips experiment logging. The local model
/// file is written either way.
pub fn train(
    config: &PipelineConfig,
    window: TrainingWindow,
    tracker: Option<&dyn ExperimentTracker>,
) -> Result<TrainingOutcome, PipelineError> {
    let paths = &config.paths;

    let dataset_status = ensure_dataset(
        &paths.prices,
        &paths.macro_series,
        &paths.dataset,
        config.rebuild_dataset,
    )?;
    let loaded = load_dataset(&paths.dataset)?;
    let dataset_hash = loaded.dataset_hash;

    let rows = window.apply(loaded.rows);
    if rows.is_empty() {
        return Err(PipelineError::EmptyWindow {
            from_year: window.from_year,
            to_year: window.to_year,
        });
    }
    info!(
        rows = rows.len(),
        from_year = window.from_year,
        to_year = window.to_year,
        "training window selected"
    );

    let x = FeatureMatrix::from_dataset(&rows);
    let y = targets(&rows);

    let cv = run_walk_forward(&x, &y, config.cv.n_splits, &config.forest)?;
    info!(
        folds = cv.folds.len(),
        rmse_mean = cv.aggregate.rmse_mean,
        mae_mean = cv.aggregate.mae_mean,
        r2_mean = cv.aggregate.r2_mean,
        "cross-validation complete"
    );

    let model = RandomForest::fit(&config.forest, &x, &y)?;
    info!(trees = model.n_trees(), "final model fitted");

    let publication = prepare_publication(&model, &rows)?;
    let model_json = model.to_json()?;

    // Write phase.
    let tracker_run_id = match tracker {
        Some(tracker) => {
            let run = TrackedRun {
                run_name: config.tracking.run_name.clone(),
                params: run_params(config, window, &dataset_hash),
                metrics: run_metrics(&cv.aggregate),
                model_json: model_json.clone(),
            };
            let run_id = tracker.log_run(&run)?;
            info!(tracker = tracker.name(), run_id = %run_id, "run tracked");
            Some(run_id)
        }
        None => None,
    };

    let staged = stage_outputs(config, &model_json, &cv.aggregate, &publication)?;
    artifacts::commit_all(staged)?;
    let published = publication.artifact(&paths.published_dir);
    info!(
        period = %published.time_key,
        rows = published.row_count,
        path = %published.path.display(),
        "predictions published"
    );

    Ok(TrainingOutcome {
        dataset_status,
        dataset_hash,
        window,
        rows: rows.len(),
        folds: cv.folds,
        metrics: cv.aggregate,
        published,
        model_path: paths.model.clone(),
        metrics_path: paths.metrics.clone(),
        tracker_run_id,
    })
}

/// Stage the model, metrics and prediction files. On failure nothing staged
/// so far is left behind.
fn stage_outputs(
    config: &PipelineConfig,
    model_json: &str,
    aggregate: &AggregateMetrics,
    publication: &Publication,
) -> Result<Vec<StagedFile>, PipelineError> {
    let paths = &config.paths;

    let model = artifacts::stage_bytes(&paths.model, model_json.as_bytes())?;
    let metrics = match artifacts::stage_metrics(&paths.metrics, aggregate) {
        Ok(file) => file,
        Err(err) => {
            model.discard();
            return Err(err.into());
        }
    };
    let predictions = match publication.stage(&paths.published_dir) {
        Ok(file) => file,
        Err(err) => {
            artifacts::discard_all(vec![model, metrics]);
            return Err(err.into());
        }
    };
    Ok(vec![model, metrics, predictions])
}

/// Parameters recorded with every tracked run.
pub fn run_params(
    config: &PipelineConfig,
    window: TrainingWindow,
    dataset_hash: &str,
) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("model".to_string(), RandomForest::NAME.to_string()),
        ("features".to_string(), FEATURE_COLUMNS.join(",")),
        ("from_year".to_string(), window.from_year.to_string()),
        ("to_year".to_string(), window.to_year.to_string()),
        (
            "n_estimators".to_string(),
            config.forest.n_estimators.to_string(),
        ),
        (
            "random_state".to_string(),
            config.forest.random_state.to_string(),
        ),
        ("n_splits".to_string(), config.cv.n_splits.to_string()),
        ("dataset_hash".to_string(), dataset_hash.to_string()),
    ])
}

fn run_metrics(aggregate: &AggregateMetrics) -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("rmse_mean".to_string(), aggregate.rmse_mean),
        ("mae_mean".to_string(), aggregate.mae_mean),
        ("r2_mean".to_string(), aggregate.r2_mean),
    ])
}
