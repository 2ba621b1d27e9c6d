//! Dataset builder: joins the price series with the macro series.
//!
//! The join is a left outer join on `(year, quarter)`. Every price row is kept;
//! periods missing from the macro source get empty macro cells. Duplicate macro
//! periods fan the join out; that is logged, not repaired.

use polars::prelude::*;
use std::path::Path;
use tracing::{info, warn};

use super::error::DataError;
use super::sources::{read_text_csv, write_csv_atomic};

const JOIN_KEYS: [&str; 2] = ["year", "quarter"];
const ROW_INDEX: &str = "__price_row";

/// The joined table as written to disk.
#[derive(Debug, Clone)]
pub struct UnifiedTable {
    pub frame: DataFrame,
}

impl UnifiedTable {
    pub fn row_count(&self) -> usize {
        self.frame.height()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect()
    }
}

/// Join `prices_path` onto `macro_path` and write the result to `out_path`.
pub fn build_dataset(
    prices_path: &Path,
    macro_path: &Path,
    out_path: &Path,
) -> Result<UnifiedTable, DataError> {
    let prices = read_text_csv(prices_path)?;
    let macro_series = read_text_csv(macro_path)?;
    let price_rows = prices.height();

    let mut joined = join_on_time_key(prices, macro_series)?;

    if joined.height() > price_rows {
        warn!(
            price_rows,
            joined_rows = joined.height(),
            "macro source has duplicate (year, quarter) keys; join fanned out"
        );
    }

    write_csv_atomic(&mut joined, out_path)?;
    info!(
        rows = joined.height(),
        path = %out_path.display(),
        "unified dataset written"
    );

    Ok(UnifiedTable { frame: joined })
}

/// Left-join two text frames on the integer-cast time key.
pub fn join_on_time_key(prices: DataFrame, macro_series: DataFrame) -> Result<DataFrame, DataError> {
    let keys = || {
        JOIN_KEYS
            .iter()
            .map(|k| col(*k).cast(DataType::Int64))
            .collect::<Vec<_>>()
    };

    // Output follows price-source row order.
    let joined = prices
        .lazy()
        .with_row_index(ROW_INDEX, None)
        .with_columns(keys())
        .join(
            macro_series.lazy().with_columns(keys()),
            [col("year"), col("quarter")],
            [col("year"), col("quarter")],
            JoinArgs::new(JoinType::Left),
        )
        .sort(
            [ROW_INDEX],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .drop([ROW_INDEX])
        .collect()?;
    Ok(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    const PRICES: &str = "district_code,year,quarter,price_per_sqm\n\
        0201,2023,4,6500\n\
        0201,2024,1,6600\n\
        1465,2023,4,14000\n\
        1465,2024,1,14200\n\
        1465,2024,2,14300\n";

    const MACRO: &str = "year,quarter,inflation_core_q\n\
        2023,4,1.2\n\
        2024,1,0.9\n";

    #[test]
    fn output_rows_equal_price_rows() {
        let dir = tempfile::tempdir().unwrap();
        let prices = write(dir.path(), "prices.csv", PRICES);
        let macro_path = write(dir.path(), "macro.csv", MACRO);
        let out = dir.path().join("processed/dataset.csv");

        let table = build_dataset(&prices, &macro_path, &out).unwrap();

        assert_eq!(table.row_count(), 5);
        assert!(out.exists());
        let names = table.column_names();
        for expected in ["district_code", "year", "quarter", "price_per_sqm", "inflation_core_q"] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
    }

    #[test]
    fn unmatched_periods_keep_the_price_row_with_empty_macro() {
        let dir = tempfile::tempdir().unwrap();
        let prices = write(dir.path(), "prices.csv", PRICES);
        let macro_path = write(dir.path(), "macro.csv", MACRO);
        let out = dir.path().join("dataset.csv");

        let table = build_dataset(&prices, &macro_path, &out).unwrap();
        let frame = &table.frame;

        let years = frame.column("year").unwrap().i64().unwrap();
        let quarters = frame.column("quarter").unwrap().i64().unwrap();
        let inflation = frame.column("inflation_core_q").unwrap().str().unwrap();

        let mut saw_unmatched = false;
        for i in 0..frame.height() {
            if years.get(i) == Some(2024) && quarters.get(i) == Some(2) {
                assert_eq!(inflation.get(i), None);
                saw_unmatched = true;
            }
        }
        assert!(saw_unmatched);
    }

    #[test]
    fn duplicate_macro_keys_fan_out() {
        let dir = tempfile::tempdir().unwrap();
        let prices = write(dir.path(), "prices.csv", PRICES);
        let macro_path = write(
            dir.path(),
            "macro.csv",
            "year,quarter,inflation_core_q\n2023,4,1.2\n2023,4,1.3\n2024,1,0.9\n",
        );
        let out = dir.path().join("dataset.csv");

        let table = build_dataset(&prices, &macro_path, &out).unwrap();

        // Two price rows in 2023-Q4, each matched twice.
        assert_eq!(table.row_count(), 7);
    }

    #[test]
    fn existing_output_directory_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let prices = write(dir.path(), "prices.csv", PRICES);
        let macro_path = write(dir.path(), "macro.csv", MACRO);
        let out_dir = dir.path().join("processed");
        fs::create_dir_all(&out_dir).unwrap();

        build_dataset(&prices, &macro_path, &out_dir.join("dataset.csv")).unwrap();
        build_dataset(&prices, &macro_path, &out_dir.join("dataset.csv")).unwrap();
    }

    #[test]
    fn missing_macro_source_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let prices = write(dir.path(), "prices.csv", PRICES);
        let out = dir.path().join("dataset.csv");

        let err = build_dataset(&prices, &dir.path().join("macro.csv"), &out).unwrap_err();

        assert!(matches!(err, DataError::MissingSource { .. }));
        assert!(!out.exists());
    }
}
