//! Device pose tracking
//!
//! The AR session is an external collaborator; the core only polls it for the
//! device position and tracking quality.

pub mod mock;
pub mod pose;

pub use mock::MockPoseSource;
pub use pose::{LimitedReason, PoseSource, TrackingState};
