//! Publisher: predictions for the most recent period, as a versioned CSV.
//!
//! The artifact is named after its period (`pred_powiat_{year}_Q{quarter}.csv`)
//! and holds one row per district present in that period.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use housing_core::data::tmp_sibling;
use housing_core::domain::{DatasetRow, PredictionRow, TimeKey};
use housing_core::model::{FeatureMatrix, ModelError, Regressor};

use crate::artifacts::StagedFile;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("nothing to publish: dataset window is empty")]
    EmptyDataset,
    #[error("prediction failed: {0}")]
    Model(#[from] ModelError),
    #[error("failed to write prediction CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("publish IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A prediction file that has been written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedArtifact {
    pub time_key: TimeKey,
    pub path: PathBuf,
    pub row_count: usize,
}

/// Predictions computed in memory, not yet written.
#[derive(Debug, Clone, PartialEq)]
pub struct Publication {
    pub time_key: TimeKey,
    pub rows: Vec<PredictionRow>,
}

/// Maximum period present in `rows`.
pub fn latest_time_key(rows: &[DatasetRow]) -> Option<TimeKey> {
    rows.iter().map(|r| r.time_key).max()
}

/// Predict every row of the latest period. Row order follows `rows`.
pub fn prepare_publication(
    model: &dyn Regressor,
    rows: &[DatasetRow],
) -> Result<Publication, PublishError> {
    let time_key = latest_time_key(rows).ok_or(PublishError::EmptyDataset)?;
    let bucket: Vec<DatasetRow> = rows
        .iter()
        .filter(|r| r.time_key == time_key)
        .cloned()
        .collect();

    let predicted = model.predict(&FeatureMatrix::from_dataset(&bucket))?;
    if predicted.len() != bucket.len() {
        return Err(ModelError::FeatureMismatch {
            expected: bucket.len(),
            actual: predicted.len(),
        }
        .into());
    }

    let rows = bucket
        .into_iter()
        .zip(predicted)
        .map(|(row, predicted_price_per_sqm)| PredictionRow {
            district_code: row.district_code,
            year: time_key.year,
            quarter: time_key.quarter,
            predicted_price_per_sqm,
        })
        .collect();

    Ok(Publication { time_key, rows })
}

impl Publication {
    pub fn file_name(&self) -> String {
        self.time_key.artifact_file_name()
    }

    /// Write under `published_dir`, replacing any file for the same period.
    pub fn write(&self, published_dir: &Path) -> Result<PublishedArtifact, PublishError> {
        let staged = self.stage(published_dir)?;
        let path = staged.target().to_path_buf();
        staged
            .commit()
            .map_err(|source| PublishError::Io { path, source })?;

        let artifact = self.artifact(published_dir);
        info!(
            period = %self.time_key,
            rows = artifact.row_count,
            path = %artifact.path.display(),
            "predictions published"
        );
        Ok(artifact)
    }

    /// Write the CSV to its staging path under `published_dir` without
    /// replacing the published file.
    pub fn stage(&self, published_dir: &Path) -> Result<StagedFile, PublishError> {
        fs::create_dir_all(published_dir).map_err(|source| PublishError::Io {
            path: published_dir.to_path_buf(),
            source,
        })?;

        let path = published_dir.join(self.file_name());
        let tmp = tmp_sibling(&path);
        if let Err(err) = self.write_csv(&tmp) {
            let _ = fs::remove_file(&tmp);
            return Err(err);
        }
        Ok(StagedFile::new(tmp, path))
    }

    /// Description of this publication once it sits in `published_dir`.
    pub fn artifact(&self, published_dir: &Path) -> PublishedArtifact {
        PublishedArtifact {
            time_key: self.time_key,
            path: published_dir.join(self.file_name()),
            row_count: self.rows.len(),
        }
    }

    fn write_csv(&self, path: &Path) -> Result<(), PublishError> {
        let mut writer = csv::Writer::from_path(path)?;
        if self.rows.is_empty() {
            writer.write_record(PREDICTION_COLUMNS)?;
        }
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush().map_err(|source| PublishError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Header of every prediction artifact.
pub const PREDICTION_COLUMNS: [&str; 4] =
    ["district_code", "year", "quarter", "predicted_price_per_sqm"];

/// Predict the latest period of `rows` and write it under `published_dir`.
pub fn publish(
    model: &dyn Regressor,
    rows: &[DatasetRow],
    published_dir: &Path,
) -> Result<PublishedArtifact, PublishError> {
    prepare_publication(model, rows)?.write(published_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Predicts `inflation * 1000 + quarter`.
    struct Echo;

    impl Regressor for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
            Ok((0..x.n_rows())
                .map(|i| x.get(i, 0) * 1000.0 + x.get(i, 2))
                .collect())
        }
    }

    fn row(code: &str, year: i32, quarter: u8, inflation: f64) -> DatasetRow {
        DatasetRow {
            district_code: code.into(),
            time_key: TimeKey::new(year, quarter).unwrap(),
            price_per_sqm: 5000.0,
            inflation_core_q: Some(inflation),
        }
    }

    fn panel() -> Vec<DatasetRow> {
        vec![
            row("0201", 2023, 4, 1.0),
            row("0202", 2023, 4, 1.0),
            row("0201", 2024, 1, 2.0),
            row("0202", 2024, 1, 2.0),
        ]
    }

    #[test]
    fn publishes_only_the_latest_period() {
        let publication = prepare_publication(&Echo, &panel()).unwrap();
        assert_eq!(publication.time_key, TimeKey::new(2024, 1).unwrap());
        assert_eq!(publication.rows.len(), 2);
        assert!(publication.rows.iter().all(|r| r.year == 2024 && r.quarter == 1));
        assert_eq!(publication.rows[0].district_code, "0201");
        assert_eq!(publication.rows[0].predicted_price_per_sqm, 2001.0);
    }

    #[test]
    fn latest_is_max_regardless_of_order() {
        let mut rows = panel();
        rows.reverse();
        assert_eq!(latest_time_key(&rows), TimeKey::new(2024, 1));
    }

    #[test]
    fn writes_named_csv_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let published = dir.path().join("data/published");

        let artifact = publish(&Echo, &panel(), &published).unwrap();

        assert_eq!(artifact.path, published.join("pred_powiat_2024_Q1.csv"));
        assert_eq!(artifact.row_count, 2);
        let content = fs::read_to_string(&artifact.path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next(),
            Some("district_code,year,quarter,predicted_price_per_sqm")
        );
        assert_eq!(lines.next(), Some("0201,2024,1,2001.0"));
        assert_eq!(lines.count(), 1);
        assert!(!tmp_sibling(&artifact.path).exists());
    }

    #[test]
    fn republishing_replaces_the_file() {
        let dir = tempfile::tempdir().unwrap();
        publish(&Echo, &panel(), dir.path()).unwrap();

        let fewer = vec![row("0201", 2024, 1, 3.0)];
        let artifact = publish(&Echo, &fewer, dir.path()).unwrap();

        let content = fs::read_to_string(&artifact.path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("3001.0"));
    }

    #[test]
    fn staging_does_not_replace_the_published_file() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = publish(&Echo, &panel(), dir.path()).unwrap();
        let before = fs::read(&artifact.path).unwrap();

        let fewer = vec![row("0201", 2024, 1, 3.0)];
        let staged = prepare_publication(&Echo, &fewer)
            .unwrap()
            .stage(dir.path())
            .unwrap();
        assert_eq!(fs::read(&artifact.path).unwrap(), before);

        staged.discard();
        assert_eq!(fs::read(&artifact.path).unwrap(), before);
        assert!(!tmp_sibling(&artifact.path).exists());
    }

    #[test]
    fn empty_rows_is_an_error() {
        let err = prepare_publication(&Echo, &[]).unwrap_err();
        assert!(matches!(err, PublishError::EmptyDataset));
    }
}
