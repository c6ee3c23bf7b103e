//! Observer interfaces for estimate, node and session events
//!
//! Every method has a no-op default so observers implement only the events
//! they care about. Return values are never consumed by the core.

use crate::api::types::SessionError;
use crate::core::{GeoLocation, SceneVector};
use crate::scene::{LocationNode, SceneNode};
use crate::tracking::TrackingState;

/// Notified whenever the estimate store gains or loses a sample
pub trait SceneLocationEstimateDelegate: Send + Sync {
    fn did_add_estimate(&self, _position: &SceneVector, _location: &GeoLocation) {}

    fn did_remove_estimate(&self, _position: &SceneVector, _location: &GeoLocation) {}
}

/// Notified about the lifecycle of location nodes
pub trait SceneLocationDelegate: Send + Sync {
    /// A node's location was locked in from the estimates gathered since it was placed
    fn did_confirm_location_of_node(&self, _node: &LocationNode) {}

    fn did_setup_scene_node(&self, _scene_node: &SceneNode) {}

    fn did_update_location_and_scale(&self, _node: &LocationNode) {}
}

/// Subset of AR session callbacks, forwarded untouched
pub trait SceneTrackingDelegate: Send + Sync {
    fn session_was_interrupted(&self) {}

    fn session_interruption_ended(&self) {}

    fn session_did_fail(&self, _error: &SessionError) {}

    fn camera_did_change_tracking_state(&self, _state: TrackingState) {}
}

#[cfg(test)]
pub(crate) mod recording {
    //! Delegates that record what they were told, for tests

    use parking_lot::Mutex;

    use super::*;
    use crate::scene::NodeId;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Event {
        AddedEstimate(GeoLocation),
        RemovedEstimate(GeoLocation),
        Confirmed(NodeId),
        SetupSceneNode(String),
        Updated(NodeId),
        Interrupted,
        InterruptionEnded,
        Failed(String),
        TrackingChanged(TrackingState),
    }

    #[derive(Default)]
    pub struct RecordingDelegate {
        events: Mutex<Vec<Event>>,
    }

    impl RecordingDelegate {
        pub fn events(&self) -> Vec<Event> {
            self.events.lock().clone()
        }

        pub fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
            self.events.lock().iter().filter(|e| predicate(e)).count()
        }

        fn push(&self, event: Event) {
            self.events.lock().push(event);
        }
    }

    impl SceneLocationEstimateDelegate for RecordingDelegate {
        fn did_add_estimate(&self, _position: &SceneVector, location: &GeoLocation) {
            self.push(Event::AddedEstimate(*location));
        }

        fn did_remove_estimate(&self, _position: &SceneVector, location: &GeoLocation) {
            self.push(Event::RemovedEstimate(*location));
        }
    }

    impl SceneLocationDelegate for RecordingDelegate {
        fn did_confirm_location_of_node(&self, node: &LocationNode) {
            self.push(Event::Confirmed(node.id()));
        }

        fn did_setup_scene_node(&self, scene_node: &SceneNode) {
            self.push(Event::SetupSceneNode(scene_node.name().to_string()));
        }

        fn did_update_location_and_scale(&self, node: &LocationNode) {
            self.push(Event::Updated(node.id()));
        }
    }

    impl SceneTrackingDelegate for RecordingDelegate {
        fn session_was_interrupted(&self) {
            self.push(Event::Interrupted);
        }

        fn session_interruption_ended(&self) {
            self.push(Event::InterruptionEnded);
        }

        fn session_did_fail(&self, error: &SessionError) {
            self.push(Event::Failed(error.description.clone()));
        }

        fn camera_did_change_tracking_state(&self, state: TrackingState) {
            self.push(Event::TrackingChanged(state));
        }
    }
}
