//! Required-column gate for the unified dataset.

use polars::prelude::*;

use super::error::DataError;

/// Columns the training pipeline cannot run without.
pub const REQUIRED_COLUMNS: [&str; 5] = [
    "district_code",
    "year",
    "quarter",
    "price_per_sqm",
    "inflation_core_q",
];

/// Fail with [`DataError::Schema`] listing every required column absent from
/// `df`, in the order of [`REQUIRED_COLUMNS`].
pub fn check_required_columns(df: &DataFrame) -> Result<(), DataError> {
    let schema = df.schema();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|name| !schema.contains(name))
        .map(|name| name.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(DataError::Schema { missing })
    }
}
