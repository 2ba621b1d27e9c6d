//! Domain types: reporting periods and the rows keyed by them.

pub mod records;
pub mod time_key;

pub use records::{DatasetRow, MacroRecord, PredictionRow, PriceRecord};
pub use time_key::TimeKey;
