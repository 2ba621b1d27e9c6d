//! Structured error type for the data layer.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading, joining or validating tabular data.
///
/// Every variant is fatal to a pipeline run; nothing here is retried.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("required input file is missing: {}", .path.display())]
    MissingSource { path: PathBuf },

    #[error("dataset is missing required columns: {}", .missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("invalid value in column '{column}' at row {row}")]
    InvalidValue { row: usize, column: String },

    #[error("data frame error: {0}")]
    Frame(#[from] polars::error::PolarsError),

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DataError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
