//! Core types and constants for geo-anchored annotations

pub mod types;
pub mod constants;

pub use types::*;
pub use constants::*;
