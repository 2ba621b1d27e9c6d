//! Feature matrix and target extraction.

use serde::{Deserialize, Serialize};

use crate::domain::DatasetRow;

/// Model inputs, in column order. Year and quarter enter as ordinal features.
pub const FEATURE_COLUMNS: [&str; 3] = ["inflation_core_q", "year", "quarter"];

/// Name of the regression target column.
pub const TARGET_COLUMN: &str = "price_per_sqm";

/// Dense row-major feature matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    n_features: usize,
    values: Vec<f64>,
}

impl FeatureMatrix {
    /// Build from row slices. All rows must have `n_features` values.
    pub fn from_rows(n_features: usize, rows: &[Vec<f64>]) -> Option<Self> {
        if rows.iter().any(|r| r.len() != n_features) {
            return None;
        }
        Some(Self {
            n_features,
            values: rows.iter().flatten().copied().collect(),
        })
    }

    /// Features for dataset rows. Missing inflation becomes NaN.
    pub fn from_dataset(rows: &[DatasetRow]) -> Self {
        let mut values = Vec::with_capacity(rows.len() * FEATURE_COLUMNS.len());
        for row in rows {
            values.push(row.inflation_core_q.unwrap_or(f64::NAN));
            values.push(f64::from(row.year()));
            values.push(f64::from(row.quarter()));
        }
        Self {
            n_features: FEATURE_COLUMNS.len(),
            values,
        }
    }

    pub fn n_rows(&self) -> usize {
        if self.n_features == 0 {
            0
        } else {
            self.values.len() / self.n_features
        }
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.n_features..(i + 1) * self.n_features]
    }

    pub fn get(&self, i: usize, feature: usize) -> f64 {
        self.values[i * self.n_features + feature]
    }

    /// Copy out the rows in `[start, end)`.
    pub fn slice_rows(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.n_rows());
        let start = start.min(end);
        Self {
            n_features: self.n_features,
            values: self.values[start * self.n_features..end * self.n_features].to_vec(),
        }
    }
}

/// Target vector for dataset rows.
pub fn targets(rows: &[DatasetRow]) -> Vec<f64> {
    rows.iter().map(|r| r.price_per_sqm).collect()
}
