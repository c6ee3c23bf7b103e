//! Scripted pose source for tests and demos

use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::SceneVector;
use crate::tracking::pose::{PoseSource, TrackingState};

#[derive(Debug)]
struct MockPose {
    position: Option<SceneVector>,
    camera: Option<SceneVector>,
    state: TrackingState,
    queries: u64,
}

/// Pose source driven by hand. Clones share state, so a test can keep one
/// handle while the session owns another.
#[derive(Debug, Clone)]
pub struct MockPoseSource {
    inner: Arc<Mutex<MockPose>>,
}

impl Default for MockPoseSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPoseSource {
    /// Tracking normally at the scene origin
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockPose {
                position: Some(SceneVector::zeros()),
                camera: None,
                state: TrackingState::Normal,
                queries: 0,
            })),
        }
    }

    /// Source that has not produced a pose yet
    pub fn unavailable() -> Self {
        let source = Self::new();
        source.lose_tracking();
        source
    }

    pub fn move_to(&self, position: SceneVector) {
        let mut pose = self.inner.lock();
        pose.position = Some(position);
        if pose.state == TrackingState::NotAvailable {
            pose.state = TrackingState::Normal;
        }
    }

    /// Move by `delta`; no-op without a pose
    pub fn walk(&self, delta: SceneVector) {
        let mut pose = self.inner.lock();
        if let Some(position) = pose.position.as_mut() {
            *position += delta;
        }
    }

    /// Separate camera position; `None` follows the device position
    pub fn set_camera(&self, camera: Option<SceneVector>) {
        self.inner.lock().camera = camera;
    }

    pub fn set_tracking_state(&self, state: TrackingState) {
        self.inner.lock().state = state;
    }

    pub fn lose_tracking(&self) {
        let mut pose = self.inner.lock();
        pose.position = None;
        pose.state = TrackingState::NotAvailable;
    }

    /// Number of position queries served
    pub fn query_count(&self) -> u64 {
        self.inner.lock().queries
    }
}

impl PoseSource for MockPoseSource {
    fn current_scene_position(&self) -> Option<SceneVector> {
        let mut pose = self.inner.lock();
        pose.queries += 1;
        pose.position
    }

    fn camera_position(&self) -> Option<SceneVector> {
        let pose = self.inner.lock();
        pose.camera.or(pose.position)
    }

    fn tracking_state(&self) -> TrackingState {
        self.inner.lock().state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let source = MockPoseSource::new();
        let handle = source.clone();

        handle.move_to(SceneVector::new(1.0, 0.0, -2.0));
        handle.walk(SceneVector::new(1.0, 0.0, 0.0));
        assert_eq!(source.current_scene_position(), Some(SceneVector::new(2.0, 0.0, -2.0)));
        assert_eq!(handle.query_count(), 1);
    }

    #[test]
    fn test_lose_and_regain_tracking() {
        let source = MockPoseSource::unavailable();
        assert!(source.current_scene_position().is_none());
        assert_eq!(source.tracking_state(), TrackingState::NotAvailable);

        source.walk(SceneVector::new(5.0, 0.0, 0.0));
        assert!(source.current_scene_position().is_none());

        source.move_to(SceneVector::zeros());
        assert_eq!(source.tracking_state(), TrackingState::Normal);
    }

    #[test]
    fn test_camera_override() {
        let source = MockPoseSource::new();
        source.set_camera(Some(SceneVector::new(0.0, 1.5, 0.0)));
        assert_eq!(source.camera_position(), Some(SceneVector::new(0.0, 1.5, 0.0)));

        source.set_camera(None);
        assert_eq!(source.camera_position(), Some(SceneVector::zeros()));
    }
}
