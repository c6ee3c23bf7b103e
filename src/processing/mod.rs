//! Location estimate processing

pub mod estimates;

pub use estimates::{EstimatePolicy, EstimateStore, SharedEstimateStore};
