//! Reporting period key: (year, quarter).

use serde::{Deserialize, Serialize};
use std::fmt;

const ARTIFACT_PREFIX: &str = "pred_powiat_";
const ARTIFACT_SUFFIX: &str = ".csv";

/// A (year, quarter) reporting period.
///
/// Ordering compares year first, then quarter (field order matters for the
/// derived `Ord`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeKey {
    pub year: i32,
    pub quarter: u8,
}

impl TimeKey {
    /// Build a key, returning `None` when the quarter is outside 1..=4.
    pub fn new(year: i32, quarter: u8) -> Option<Self> {
        (1..=4).contains(&quarter).then_some(Self { year, quarter })
    }

    /// File name of the prediction artifact published for this period.
    pub fn artifact_file_name(&self) -> String {
        format!(
            "{ARTIFACT_PREFIX}{}_Q{}{ARTIFACT_SUFFIX}",
            self.year, self.quarter
        )
    }

    /// Parse a key back out of a published artifact file name.
    ///
    /// Anything that does not match `pred_powiat_{year}_Q{quarter}.csv` exactly
    /// (staging `.tmp` files included) yields `None`. Years with a leading
    /// zero are rejected so each period has exactly one file name.
    pub fn from_artifact_file_name(name: &str) -> Option<Self> {
        let stem = name
            .strip_prefix(ARTIFACT_PREFIX)?
            .strip_suffix(ARTIFACT_SUFFIX)?;
        let (year, quarter) = stem.split_once("_Q")?;
        if year.is_empty() || year.starts_with('0') || !year.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if quarter.len() != 1 {
            return None;
        }
        Self::new(year.parse().ok()?, quarter.parse().ok()?)
    }
}

impl fmt::Display for TimeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-Q{}", self.year, self.quarter)
    }
}
