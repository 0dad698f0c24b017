//! Output module for run and store reports
//!
//! This module handles:
//! - Counting what a harvest run did
//! - Summarizing the contents of a record store

pub mod stats;

pub use stats::{load_statistics, print_statistics, HarvestStats, StoreStatistics};
