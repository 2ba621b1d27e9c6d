//! Row types flowing through the pipeline.

use serde::{Deserialize, Serialize};

use super::TimeKey;

/// One observed price for a district in a reporting period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub district_code: String,
    pub time_key: TimeKey,
    pub price_per_sqm: f64,
}

/// One macroeconomic observation, shared by all districts in a period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacroRecord {
    pub time_key: TimeKey,
    pub inflation_core_q: f64,
}

/// A row of the unified (joined) dataset.
///
/// `inflation_core_q` is `None` when the macro source had no match for the
/// period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRow {
    pub district_code: String,
    pub time_key: TimeKey,
    pub price_per_sqm: f64,
    pub inflation_core_q: Option<f64>,
}

impl DatasetRow {
    pub fn year(&self) -> i32 {
        self.time_key.year
    }

    pub fn quarter(&self) -> u8 {
        self.time_key.quarter
    }
}

/// One row of a published prediction artifact.
///
/// Field order is the artifact's column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    pub district_code: String,
    pub year: i32,
    pub quarter: u8,
    pub predicted_price_per_sqm: f64,
}
