//! Data layer: raw sources, the dataset builder, loading and windowing.

pub mod builder;
pub mod dataset;
pub mod error;
pub mod schema;
pub mod sources;
pub mod window;

pub use builder::{build_dataset, UnifiedTable};
pub use dataset::{ensure_dataset, load_dataset, DatasetStatus, LoadedDataset};
pub use error::DataError;
pub use schema::{check_required_columns, REQUIRED_COLUMNS};
pub use sources::tmp_sibling;
pub use window::{canonical_sort, TrainingWindow};
