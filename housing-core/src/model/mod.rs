//! Regression model: features, CART trees and the random forest.

pub mod features;
pub mod forest;
pub mod tree;

pub use features::{targets, FeatureMatrix, FEATURE_COLUMNS, TARGET_COLUMN};
pub use forest::{ForestParams, RandomForest};
pub use tree::{RegressionTree, TreeParams};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model has not been fitted")]
    NotFitted,

    #[error("cannot fit on an empty training set")]
    EmptyTrainingSet,

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    FeatureMismatch { expected: usize, actual: usize },

    #[error("invalid model parameters: {0}")]
    InvalidParams(String),

    #[error("model serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to read model {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A fitted model that maps a feature matrix to one prediction per row.
pub trait Regressor: Send + Sync {
    fn name(&self) -> &str;

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>, ModelError>;
}
