//! Time-ordered cross-validation.
//!
//! Rows are split by position into an expanding training prefix and a
//! fixed-size test block that follows it:
//! - `test_size = n / (n_splits + 1)`
//! - test blocks tile the last `n_splits * test_size` rows
//! - each fold trains on every row before its test block
//!
//! Rows must already be in canonical (time) order. Fold boundaries are row
//! positions, so one period may straddle two folds.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use housing_core::model::{FeatureMatrix, ForestParams, ModelError, RandomForest, Regressor};

use crate::metrics::{AggregateMetrics, FoldMetrics};

/// Row ranges of one fold. Ranges are half-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldSpec {
    pub fold_index: usize,
    pub train_end: usize,
    pub test_start: usize,
    pub test_end: usize,
}

impl FoldSpec {
    pub fn train_rows(&self) -> usize {
        self.train_end
    }

    pub fn test_rows(&self) -> usize {
        self.test_end - self.test_start
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardResult {
    pub folds: Vec<FoldMetrics>,
    pub aggregate: AggregateMetrics,
}

#[derive(Debug, Error)]
pub enum WalkForwardError {
    #[error("cannot make {n_splits} splits from {n_samples} rows: need at least {}", .n_splits + 1)]
    TooFewSamples { n_samples: usize, n_splits: usize },
    #[error("n_splits must be at least 1")]
    InvalidSplitCount,
    #[error("feature matrix has {rows} rows but {targets} targets were given")]
    LengthMismatch { rows: usize, targets: usize },
    #[error("fold {fold} failed: {source}")]
    FoldFailed {
        fold: usize,
        #[source]
        source: ModelError,
    },
}

/// Fold boundaries for `n_samples` rows.
pub fn create_folds(n_samples: usize, n_splits: usize) -> Result<Vec<FoldSpec>, WalkForwardError> {
    if n_splits == 0 {
        return Err(WalkForwardError::InvalidSplitCount);
    }
    if n_samples < n_splits + 1 {
        return Err(WalkForwardError::TooFewSamples {
            n_samples,
            n_splits,
        });
    }

    let test_size = n_samples / (n_splits + 1);
    let first_test_start = n_samples - n_splits * test_size;

    Ok((0..n_splits)
        .map(|i| {
            let test_start = first_test_start + i * test_size;
            FoldSpec {
                fold_index: i,
                train_end: test_start,
                test_start,
                test_end: test_start + test_size,
            }
        })
        .collect())
}

/// Fit a fresh forest per fold and score it on the fold's test block.
///
/// Any fold failure aborts the whole evaluation.
pub fn run_walk_forward(
    x: &FeatureMatrix,
    y: &[f64],
    n_splits: usize,
    params: &ForestParams,
) -> Result<WalkForwardResult, WalkForwardError> {
    if y.len() != x.n_rows() {
        return Err(WalkForwardError::LengthMismatch {
            rows: x.n_rows(),
            targets: y.len(),
        });
    }
    let specs = create_folds(x.n_rows(), n_splits)?;
    let mut folds = Vec::with_capacity(specs.len());

    for spec in &specs {
        let fold_failed = |source| WalkForwardError::FoldFailed {
            fold: spec.fold_index,
            source,
        };

        let x_train = x.slice_rows(0, spec.train_end);
        let y_train = &y[..spec.train_end];
        let x_test = x.slice_rows(spec.test_start, spec.test_end);
        let y_test = &y[spec.test_start..spec.test_end];

        let model = RandomForest::fit(params, &x_train, y_train).map_err(fold_failed)?;
        let predicted = model.predict(&x_test).map_err(fold_failed)?;
        let metrics = FoldMetrics::compute(spec.fold_index, spec.train_rows(), y_test, &predicted);

        debug!(
            fold = spec.fold_index,
            train_rows = metrics.train_rows,
            test_rows = metrics.test_rows,
            rmse = metrics.rmse,
            mae = metrics.mae,
            r2 = metrics.r2,
            "fold evaluated"
        );
        folds.push(metrics);
    }

    let aggregate = AggregateMetrics::mean_of(&folds).ok_or(WalkForwardError::InvalidSplitCount)?;
    Ok(WalkForwardResult { folds, aggregate })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_arithmetic_for_twenty_rows() {
        // test_size = 20 / 6 = 3; tests cover rows 5..20
        let folds = create_folds(20, 5).unwrap();
        let bounds: Vec<(usize, usize, usize)> = folds
            .iter()
            .map(|f| (f.train_end, f.test_start, f.test_end))
            .collect();
        assert_eq!(
            bounds,
            vec![(5, 5, 8), (8, 8, 11), (11, 11, 14), (14, 14, 17), (17, 17, 20)]
        );
    }

    #[test]
    fn minimum_rows_gives_single_row_blocks() {
        let folds = create_folds(6, 5).unwrap();
        assert_eq!(folds.len(), 5);
        assert_eq!(folds[0].train_end, 1);
        assert!(folds.iter().all(|f| f.test_rows() == 1));
        assert_eq!(folds[4].test_end, 6);
    }

    #[test]
    fn too_few_rows_is_an_error() {
        let err = create_folds(5, 5).unwrap_err();
        assert!(matches!(
            err,
            WalkForwardError::TooFewSamples {
                n_samples: 5,
                n_splits: 5
            }
        ));
        assert!(err.to_string().contains("need at least 6"));
    }

    #[test]
    fn zero_splits_is_an_error() {
        assert!(matches!(
            create_folds(10, 0),
            Err(WalkForwardError::InvalidSplitCount)
        ));
    }

    #[test]
    fn aggregate_is_mean_of_folds() {
        let rows: Vec<Vec<f64>> = (0..24).map(|i| vec![i as f64]).collect();
        let x = FeatureMatrix::from_rows(1, &rows).unwrap();
        let y: Vec<f64> = (0..24).map(|i| 10.0 + i as f64).collect();
        let params = ForestParams {
            n_estimators: 3,
            ..ForestParams::default()
        };

        let result = run_walk_forward(&x, &y, 3, &params).unwrap();
        assert_eq!(result.folds.len(), 3);
        let mean_rmse = result.folds.iter().map(|f| f.rmse).sum::<f64>() / 3.0;
        assert_eq!(result.aggregate.rmse_mean, mean_rmse);
        assert_eq!(result.folds[0].train_rows, 6);
        assert_eq!(result.folds[2].test_rows, 6);
    }

    #[test]
    fn short_target_vector_is_rejected() {
        let rows: Vec<Vec<f64>> = (0..12).map(|i| vec![i as f64]).collect();
        let x = FeatureMatrix::from_rows(1, &rows).unwrap();
        let y = vec![1.0; 11];

        let err = run_walk_forward(&x, &y, 3, &ForestParams::default()).unwrap_err();
        assert!(matches!(
            err,
            WalkForwardError::LengthMismatch {
                rows: 12,
                targets: 11
            }
        ));
    }
}
