//! Regression metrics: per-fold scores and their across-fold means.

use serde::{Deserialize, Serialize};

/// Scores for one cross-validation fold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FoldMetrics {
    pub fold_index: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

impl FoldMetrics {
    pub fn compute(
        fold_index: usize,
        train_rows: usize,
        actual: &[f64],
        predicted: &[f64],
    ) -> Self {
        Self {
            fold_index,
            train_rows,
            test_rows: actual.len(),
            rmse: rmse(actual, predicted),
            mae: mae(actual, predicted),
            r2: r2(actual, predicted),
        }
    }
}

/// Arithmetic means of the fold metrics. This is the metrics artifact body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub rmse_mean: f64,
    pub mae_mean: f64,
    pub r2_mean: f64,
}

impl AggregateMetrics {
    /// `None` when there are no folds.
    pub fn mean_of(folds: &[FoldMetrics]) -> Option<Self> {
        if folds.is_empty() {
            return None;
        }
        let n = folds.len() as f64;
        Some(Self {
            rmse_mean: folds.iter().map(|f| f.rmse).sum::<f64>() / n,
            mae_mean: folds.iter().map(|f| f.mae).sum::<f64>() / n,
            r2_mean: folds.iter().map(|f| f.r2).sum::<f64>() / n,
        })
    }
}

pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let mse = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / actual.len() as f64;
    mse.sqrt()
}

pub fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / actual.len() as f64
}

/// Coefficient of determination.
///
/// A constant target has no variance to explain: a perfect fit scores 1.0,
/// anything else 0.0.
pub fn r2(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}
