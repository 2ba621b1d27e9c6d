//! CSV source I/O shared by the builder and the loader.
//!
//! Sources are read with every column as text. Codes like `0201` keep their
//! leading zeros and numeric parsing happens in one place (the loader), so a
//! bad cell is reported with its row and column instead of becoming a silent
//! null.

use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

use super::error::DataError;
use crate::domain::{MacroRecord, PriceRecord};

/// Read a headered CSV file with all columns as text.
pub fn read_text_csv(path: &Path) -> Result<DataFrame, DataError> {
    if !path.exists() {
        return Err(DataError::MissingSource {
            path: path.to_path_buf(),
        });
    }
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

/// Write a frame as CSV, creating the parent directory if needed.
///
/// Writes are atomic: write to `.tmp` then rename over the destination.
pub fn write_csv_atomic(df: &mut DataFrame, path: &Path) -> Result<(), DataError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| DataError::io(parent, e))?;
    }

    let tmp_path = tmp_sibling(path);
    let mut file = fs::File::create(&tmp_path).map_err(|e| DataError::io(&tmp_path, e))?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    drop(file);

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        DataError::io(path, e)
    })
}

/// Staging path next to `path`: same directory, `.tmp` appended to the name.
pub fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Convert price records to a frame with the raw price-source columns.
pub fn prices_to_dataframe(records: &[PriceRecord]) -> Result<DataFrame, DataError> {
    let codes: Vec<&str> = records.iter().map(|r| r.district_code.as_str()).collect();
    let years: Vec<i32> = records.iter().map(|r| r.time_key.year).collect();
    let quarters: Vec<i32> = records.iter().map(|r| i32::from(r.time_key.quarter)).collect();
    let prices: Vec<f64> = records.iter().map(|r| r.price_per_sqm).collect();

    Ok(DataFrame::new(vec![
        Column::new("district_code".into(), codes),
        Column::new("year".into(), years),
        Column::new("quarter".into(), quarters),
        Column::new("price_per_sqm".into(), prices),
    ])?)
}

/// Convert macro records to a frame with the raw macro-source columns.
pub fn macro_to_dataframe(records: &[MacroRecord]) -> Result<DataFrame, DataError> {
    let years: Vec<i32> = records.iter().map(|r| r.time_key.year).collect();
    let quarters: Vec<i32> = records.iter().map(|r| i32::from(r.time_key.quarter)).collect();
    let inflation: Vec<f64> = records.iter().map(|r| r.inflation_core_q).collect();

    Ok(DataFrame::new(vec![
        Column::new("year".into(), years),
        Column::new("quarter".into(), quarters),
        Column::new("inflation_core_q".into(), inflation),
    ])?)
}

/// Write a price source file from typed records.
pub fn write_price_source(path: &Path, records: &[PriceRecord]) -> Result<(), DataError> {
    let mut df = prices_to_dataframe(records)?;
    write_csv_atomic(&mut df, path)
}

/// Write a macro source file from typed records.
pub fn write_macro_source(path: &Path, records: &[MacroRecord]) -> Result<(), DataError> {
    let mut df = macro_to_dataframe(records)?;
    write_csv_atomic(&mut df, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TimeKey;

    #[test]
    fn missing_file_is_reported_as_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_text_csv(&dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, DataError::MissingSource { .. }));
        assert!(err.to_string().contains("nope.csv"));
    }

    #[test]
    fn text_read_keeps_leading_zeros() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        fs::write(
            &path,
            "district_code,year,quarter,price_per_sqm\n0201,2024,1,7000.5\n",
        )
        .unwrap();

        let df = read_text_csv(&path).unwrap();
        let codes = df.column("district_code").unwrap().str().unwrap();
        assert_eq!(codes.get(0), Some("0201"));
    }

    #[test]
    fn atomic_write_leaves_no_tmp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/prices.csv");
        let records = vec![PriceRecord {
            district_code: "0201".into(),
            time_key: TimeKey::new(2024, 1).unwrap(),
            price_per_sqm: 7000.0,
        }];

        write_price_source(&path, &records).unwrap();

        assert!(path.exists());
        assert!(!tmp_sibling(&path).exists());
        let df = read_text_csv(&path).unwrap();
        assert_eq!(df.height(), 1);
    }
}
