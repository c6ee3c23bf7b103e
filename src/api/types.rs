//! Common API types and error definitions

use thiserror::Error;

use crate::scene::NodeId;
use crate::utils::config::ConfigError;

/// Result type for fallible crate operations
pub type GeoArResult<T> = Result<T, GeoArError>;

/// Errors surfaced by the placement core.
///
/// Missing data during a tick is not an error; ticks report it as skipped.
#[derive(Debug, Error)]
pub enum GeoArError {
    /// Location sample that cannot be projected
    #[error("invalid location: {reason}")]
    InvalidLocation { reason: String },

    /// No node with this id is managed by the session
    #[error("unknown location node {0}")]
    UnknownNode(NodeId),

    /// Operation needs a device scene position and tracking has none
    #[error("device scene position unavailable")]
    PoseUnavailable,

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Failure reported by the external AR session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("AR session failed: {description}")]
pub struct SessionError {
    pub description: String,
}

impl SessionError {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

/// Summary of one session tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Nodes whose transform was committed this tick
    pub updated: usize,
    /// Nodes left untouched because data was unavailable
    pub skipped: usize,
    /// Nodes whose location was confirmed this tick
    pub confirmed: usize,
}
