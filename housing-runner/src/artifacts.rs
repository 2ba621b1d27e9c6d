//! Local model and metrics artifacts.
//!
//! Files are first staged as `<name>.tmp` next to their target. A staged file
//! is either committed (renamed into place) or discarded, so a reader sees the
//! previous file or the complete new one.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use housing_core::data::tmp_sibling;

use crate::metrics::AggregateMetrics;

/// A fully written file waiting at its staging path.
#[derive(Debug)]
#[must_use = "a staged file must be committed or discarded"]
pub struct StagedFile {
    staged: PathBuf,
    target: PathBuf,
}

impl StagedFile {
    pub fn new(staged: PathBuf, target: PathBuf) -> Self {
        Self { staged, target }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Rename over the target. The staging file is removed on failure.
    pub fn commit(self) -> std::io::Result<()> {
        fs::rename(&self.staged, &self.target).inspect_err(|_| {
            let _ = fs::remove_file(&self.staged);
        })
    }

    pub fn discard(self) {
        let _ = fs::remove_file(&self.staged);
    }
}

/// Write `bytes` to the staging sibling of `path`, creating parent
/// directories as needed.
pub fn stage_bytes(path: &Path, bytes: &[u8]) -> Result<StagedFile> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let tmp = tmp_sibling(path);
    let staged = fs::File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .with_context(|| format!("failed to write {}", tmp.display()));
    if let Err(err) = staged {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    Ok(StagedFile::new(tmp, path.to_path_buf()))
}

/// Metrics artifact: `{rmse_mean, mae_mean, r2_mean}` as pretty JSON.
pub fn stage_metrics(path: &Path, metrics: &AggregateMetrics) -> Result<StagedFile> {
    let json = serde_json::to_string_pretty(metrics).context("failed to serialize metrics")?;
    stage_bytes(path, json.as_bytes())
}

/// Move every staged file into place, in order.
///
/// If a rename fails the remaining files are discarded. Renames within one
/// filesystem do not fail in practice once staging has succeeded.
pub fn commit_all(files: Vec<StagedFile>) -> Result<()> {
    let mut files = files.into_iter();
    while let Some(file) = files.next() {
        let target = file.target().to_path_buf();
        if let Err(err) = file.commit() {
            files.by_ref().for_each(StagedFile::discard);
            return Err(err).with_context(|| format!("failed to move {} into place", target.display()));
        }
    }
    Ok(())
}

/// Drop every staged file without touching the targets.
pub fn discard_all(files: Vec<StagedFile>) {
    files.into_iter().for_each(StagedFile::discard);
}
