//! Unified dataset cache and typed loading.
//!
//! The processed dataset is memoized by existence: if the file is present it
//! is reused as-is, otherwise it is built from the raw sources. There is no
//! staleness check.

use polars::prelude::*;
use std::fs;
use std::path::Path;
use tracing::info;

use super::builder::build_dataset;
use super::error::DataError;
use super::schema::check_required_columns;
use super::sources::read_text_csv;
use crate::domain::{DatasetRow, TimeKey};

/// How the dataset file was obtained for this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetStatus {
    /// An existing file was reused.
    Cached,
    /// The file was (re)built from the raw sources.
    Built { rows: usize },
}

/// Make sure the unified dataset exists at `dataset_path`.
///
/// Builds it from `prices_path` and `macro_path` when absent, or always when
/// `rebuild` is set.
pub fn ensure_dataset(
    prices_path: &Path,
    macro_path: &Path,
    dataset_path: &Path,
    rebuild: bool,
) -> Result<DatasetStatus, DataError> {
    if dataset_path.exists() && !rebuild {
        info!(path = %dataset_path.display(), "reusing existing dataset");
        return Ok(DatasetStatus::Cached);
    }
    let table = build_dataset(prices_path, macro_path, dataset_path)?;
    Ok(DatasetStatus::Built {
        rows: table.row_count(),
    })
}

/// Typed rows plus a content hash of the file they came from.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub rows: Vec<DatasetRow>,
    /// BLAKE3 hex digest of the dataset file bytes.
    pub dataset_hash: String,
}

/// Read the unified dataset, gate it on required columns, and convert it to
/// typed rows (in file order).
pub fn load_dataset(path: &Path) -> Result<LoadedDataset, DataError> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DataError::MissingSource {
            path: path.to_path_buf(),
        },
        _ => DataError::io(path, e),
    })?;
    let dataset_hash = blake3::hash(&bytes).to_hex().to_string();

    let df = read_text_csv(path)?;
    check_required_columns(&df)?;
    let rows = frame_to_rows(&df)?;

    info!(rows = rows.len(), hash = %dataset_hash, "dataset loaded");
    Ok(LoadedDataset { rows, dataset_hash })
}

/// Convert a text frame holding the required columns into typed rows.
pub fn frame_to_rows(df: &DataFrame) -> Result<Vec<DatasetRow>, DataError> {
    let codes = df.column("district_code")?.str()?;
    let years = df.column("year")?.str()?;
    let quarters = df.column("quarter")?.str()?;
    let prices = df.column("price_per_sqm")?.str()?;
    let inflation = df.column("inflation_core_q")?.str()?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let invalid = |column: &str| DataError::InvalidValue {
            row: i,
            column: column.to_string(),
        };

        let district_code = codes
            .get(i)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid("district_code"))?;
        let year: i32 = parse_cell(years.get(i)).ok_or_else(|| invalid("year"))?;
        let quarter: u8 = parse_cell(quarters.get(i)).ok_or_else(|| invalid("quarter"))?;
        let time_key = TimeKey::new(year, quarter).ok_or_else(|| invalid("quarter"))?;
        let price_per_sqm: f64 =
            parse_cell(prices.get(i)).ok_or_else(|| invalid("price_per_sqm"))?;

        let inflation_core_q = match inflation.get(i).map(str::trim) {
            None | Some("") => None,
            Some(text) => Some(text.parse().map_err(|_| invalid("inflation_core_q"))?),
        };

        rows.push(DatasetRow {
            district_code: district_code.to_string(),
            time_key,
            price_per_sqm,
            inflation_core_q,
        });
    }
    Ok(rows)
}

fn parse_cell<T: std::str::FromStr>(cell: Option<&str>) -> Option<T> {
    cell.map(str::trim).and_then(|s| s.parse().ok())
}
