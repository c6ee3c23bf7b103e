//! Device pose interface

use serde::{Deserialize, Serialize};

use crate::core::SceneVector;

/// Why tracking quality is reduced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LimitedReason {
    Initializing,
    ExcessiveMotion,
    InsufficientFeatures,
    Relocalizing,
}

/// Camera tracking quality reported by the AR session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingState {
    NotAvailable,
    Limited(LimitedReason),
    Normal,
}

impl TrackingState {
    /// Whether a pose is reported at all
    pub fn has_pose(&self) -> bool {
        !matches!(self, TrackingState::NotAvailable)
    }
}

/// Source of the device's position in scene space.
///
/// Polled once per tick; implementations must be cheap to query.
pub trait PoseSource: Send + Sync {
    /// Device position, `None` while the session has no pose
    fn current_scene_position(&self) -> Option<SceneVector>;

    /// Point billboards turn towards
    fn camera_position(&self) -> Option<SceneVector> {
        self.current_scene_position()
    }

    fn tracking_state(&self) -> TrackingState;
}
