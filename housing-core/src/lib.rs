//! Housing core: domain types, dataset assembly and the regression model.
//!
//! - Domain types (time keys, price and macro records, prediction rows)
//! - Raw source IO and the left-join dataset builder
//! - Schema gate, year windowing and canonical ordering
//! - CART regression trees and a bagged random forest
//! - Shared logging setup

pub mod data;
pub mod domain;
pub mod logging;
pub mod model;
pub mod rng;
