//! Read-only lookup service over published prediction artifacts.
//!
//! The service never writes. It lists the published directory on every
//! request, so a freshly published quarter is visible without a restart.

pub mod error;
pub mod routes;
pub mod store;

pub use error::LookupError;
pub use routes::{router, AppState, PriceQuery};
pub use store::PublishedStore;
