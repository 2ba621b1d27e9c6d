//! Published artifact directory, read through tokio's filesystem API.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use housing_core::domain::{PredictionRow, TimeKey};
use tracing::debug;

use crate::error::LookupError;

/// Handle on the directory the publisher writes into.
#[derive(Debug, Clone)]
pub struct PublishedStore {
    dir: PathBuf,
}

impl PublishedStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Every well-formed artifact, ordered by period.
    ///
    /// A missing directory is treated as empty. Staging files and anything
    /// else not named `pred_powiat_{year}_Q{quarter}.csv` are skipped.
    pub async fn list(&self) -> Result<Vec<(TimeKey, String)>, LookupError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(self.read_error(&self.dir, err)),
        };

        let mut found = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| self.read_error(&self.dir, err))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if let Some(key) = TimeKey::from_artifact_file_name(&name) {
                found.push((key, name));
            }
        }
        found.sort();
        Ok(found)
    }

    /// File name of the artifact with the greatest period, if any.
    pub async fn latest(&self) -> Result<Option<String>, LookupError> {
        Ok(self.list().await?.pop().map(|(_, name)| name))
    }

    /// Rows of the latest artifact.
    pub async fn latest_rows(&self) -> Result<Vec<PredictionRow>, LookupError> {
        match self.latest().await? {
            Some(name) => self.read(&name).await,
            None => Err(self.nothing_published()),
        }
    }

    /// Rows of the artifact for exactly `year` and `quarter`.
    ///
    /// Values that cannot name a period are answered like any absent period.
    pub async fn rows_for(&self, year: i64, quarter: i64) -> Result<Vec<PredictionRow>, LookupError> {
        let key = match (i32::try_from(year), u8::try_from(quarter)) {
            (Ok(year), Ok(quarter)) => TimeKey::new(year, quarter),
            _ => None,
        };
        let name = match key {
            Some(key) => key.artifact_file_name(),
            None => format!("pred_powiat_{year}_Q{quarter}.csv"),
        };
        self.read(&name).await
    }

    async fn read(&self, name: &str) -> Result<Vec<PredictionRow>, LookupError> {
        let path = self.dir.join(name);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(LookupError::NotFound(format!("not found: {name}")));
            }
            Err(err) => return Err(self.read_error(&path, err)),
        };

        let rows = parse_rows(&bytes)
            .map_err(|err| LookupError::Read(format!("cannot parse {name}: {err}")))?;
        debug!(file = name, rows = rows.len(), "served prediction artifact");
        Ok(rows)
    }

    pub fn nothing_published(&self) -> LookupError {
        LookupError::NotFound(format!(
            "no published predictions in {}; run training first",
            self.dir.display()
        ))
    }

    fn read_error(&self, path: &Path, err: std::io::Error) -> LookupError {
        LookupError::Read(format!("cannot read {}: {err}", path.display()))
    }
}

fn parse_rows(bytes: &[u8]) -> Result<Vec<PredictionRow>, csv::Error> {
    csv::Reader::from_reader(bytes).deserialize().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const HEADER: &str = "district_code,year,quarter,predicted_price_per_sqm\n";

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), format!("{HEADER}{body}")).unwrap();
    }

    #[tokio::test]
    async fn missing_directory_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = PublishedStore::new(dir.path().join("absent"));
        assert!(store.list().await.unwrap().is_empty());
        assert!(store.latest().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn latest_is_chosen_by_period_not_by_name() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "pred_powiat_999_Q4.csv", "");
        write(dir.path(), "pred_powiat_2024_Q1.csv", "");
        write(dir.path(), "pred_powiat_2023_Q4.csv", "");

        let store = PublishedStore::new(dir.path());
        assert_eq!(
            store.latest().await.unwrap().as_deref(),
            Some("pred_powiat_2024_Q1.csv")
        );
    }

    #[tokio::test]
    async fn staging_and_foreign_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "pred_powiat_2023_Q4.csv", "");
        write(dir.path(), "pred_powiat_2024_Q1.csv.tmp", "");
        write(dir.path(), "notes.csv", "");

        let store = PublishedStore::new(dir.path());
        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].1, "pred_powiat_2023_Q4.csv");
    }

    #[tokio::test]
    async fn rows_are_parsed_as_records() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "pred_powiat_2024_Q1.csv",
            "0201,2024,1,7012.5\n0202,2024,1,6899.0\n",
        );

        let rows = PublishedStore::new(dir.path()).rows_for(2024, 1).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].district_code, "0201");
        assert_eq!(rows[0].predicted_price_per_sqm, 7012.5);
    }

    #[tokio::test]
    async fn district_codes_keep_leading_zeros() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "pred_powiat_2024_Q1.csv", "0201,2024,1,1.0\n");

        let rows = PublishedStore::new(dir.path()).latest_rows().await.unwrap();
        assert_eq!(rows[0].district_code, "0201");
    }

    #[tokio::test]
    async fn invalid_quarter_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = PublishedStore::new(dir.path())
            .rows_for(2024, 7)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "not found: pred_powiat_2024_Q7.csv");
    }

    #[tokio::test]
    async fn quarter_beyond_u8_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = PublishedStore::new(dir.path());
        for quarter in [300, -1] {
            let err = store.rows_for(2024, quarter).await.unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("not found: pred_powiat_2024_Q{quarter}.csv")
            );
        }
    }

    #[tokio::test]
    async fn malformed_artifact_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "pred_powiat_2024_Q1.csv", "0201,2024,one,abc\n");

        let err = PublishedStore::new(dir.path())
            .rows_for(2024, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::Read(_)));
    }
}
