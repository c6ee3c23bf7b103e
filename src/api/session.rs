//! Frame-driven session owning the location nodes
//!
//! The host calls `tick()` once per rendered frame and feeds location samples
//! through `ingest_location` (or the shared estimate store directly, possibly
//! from another thread).

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::algorithms::projection::validate_location;
use crate::algorithms::GeoProjector;
use crate::api::delegate::{SceneLocationDelegate, SceneLocationEstimateDelegate, SceneTrackingDelegate};
use crate::api::types::{GeoArError, GeoArResult, SessionError, TickReport};
use crate::core::{GeoLocation, SceneVector};
use crate::processing::{EstimateStore, SharedEstimateStore};
use crate::scene::{ContentSurface, LocationNode, NodeId, NodeOptions, NodeState, SceneNode, TickOutcome};
use crate::tracking::{PoseSource, TrackingState};
use crate::utils::config::{ConfigurationManager, ConfirmationConfig, NodeDefaults, SceneConfig};

/// Owns location nodes and drives their per-frame updates
pub struct SceneLocationSession {
    pose: Box<dyn PoseSource>,
    estimates: SharedEstimateStore,
    projector: GeoProjector,
    node_defaults: NodeDefaults,
    confirmation: ConfirmationConfig,
    nodes: Vec<LocationNode>,
    root: Option<SceneNode>,
    location_delegate: Option<Arc<dyn SceneLocationDelegate>>,
    tracking_delegate: Option<Arc<dyn SceneTrackingDelegate>>,
    last_tracking_state: Option<TrackingState>,
    interrupted: bool,
}

impl SceneLocationSession {
    /// Session with default configuration
    pub fn new(pose: Box<dyn PoseSource>) -> Self {
        Self::with_config(pose, &SceneConfig::default())
    }

    pub fn with_config(pose: Box<dyn PoseSource>, config: &SceneConfig) -> Self {
        Self {
            pose,
            estimates: EstimateStore::shared(config.estimates),
            projector: config.projection,
            node_defaults: config.node_defaults.clone(),
            confirmation: config.confirmation,
            nodes: Vec::new(),
            root: None,
            location_delegate: None,
            tracking_delegate: None,
            last_tracking_state: None,
            interrupted: false,
        }
    }

    /// Apply a new configuration; existing nodes keep their options
    pub fn apply_config(&mut self, config: &SceneConfig) {
        self.estimates.set_policy(config.estimates);
        self.projector = config.projection;
        self.node_defaults = config.node_defaults.clone();
        self.confirmation = config.confirmation;
    }

    /// Load, validate and apply a JSON configuration file
    pub fn load_config<P: AsRef<Path>>(&mut self, path: P) -> GeoArResult<()> {
        let manager = ConfigurationManager::from_file(path)?;
        self.apply_config(manager.scene_config());
        Ok(())
    }

    /// Options for new nodes under the session's configured defaults
    pub fn default_node_options(&self) -> NodeOptions {
        self.node_defaults.node_options(self.projector.ignore_altitude)
    }

    /// Plain node carrying the configured defaults.
    /// `add_location_node` keeps whatever options a node already has.
    pub fn new_node(&self, location: Option<GeoLocation>) -> LocationNode {
        LocationNode::new(location).with_options(self.default_node_options())
    }

    /// Annotation node carrying the configured defaults
    pub fn new_annotation_node(&self, location: Option<GeoLocation>, content: Arc<dyn ContentSurface>) -> LocationNode {
        LocationNode::with_annotation(location, content).with_options(self.default_node_options())
    }

    /// Handle for feeding samples from another thread
    pub fn estimates(&self) -> SharedEstimateStore {
        Arc::clone(&self.estimates)
    }

    pub fn projector(&self) -> &GeoProjector {
        &self.projector
    }

    pub fn set_location_delegate(&mut self, delegate: Option<Arc<dyn SceneLocationDelegate>>) {
        self.location_delegate = delegate;
    }

    pub fn set_tracking_delegate(&mut self, delegate: Option<Arc<dyn SceneTrackingDelegate>>) {
        self.tracking_delegate = delegate;
    }

    pub fn set_estimate_delegate(&mut self, delegate: Option<Arc<dyn SceneLocationEstimateDelegate>>) {
        self.estimates.set_delegate(delegate);
    }

    /// Set up the scene root. Calling it again keeps the existing root.
    pub fn run(&mut self) {
        if self.root.is_some() {
            debug!("session already running");
            return;
        }

        let root = SceneNode::new("scene root");
        info!("scene location session started");
        if let Some(delegate) = &self.location_delegate {
            delegate.did_setup_scene_node(&root);
        }
        self.root = Some(root);
    }

    pub fn is_running(&self) -> bool {
        self.root.is_some()
    }

    pub fn root_node(&self) -> Option<&SceneNode> {
        self.root.as_ref()
    }

    /// Pair a location sample with the current device position.
    /// Returns whether the sample was stored.
    pub fn ingest_location(&self, location: GeoLocation) -> GeoArResult<bool> {
        validate_location(&location)?;
        let position = self.pose.current_scene_position().ok_or(GeoArError::PoseUnavailable)?;
        Ok(self.estimates.add_location(position, location))
    }

    /// Device location implied by the best estimate
    pub fn current_location(&self) -> Option<GeoLocation> {
        let position = self.pose.current_scene_position()?;
        let best = self.estimates.best_estimate()?;
        Some(best.translated_location(&position))
    }

    /// Add a node and position it immediately (without animation)
    pub fn add_location_node(&mut self, mut node: LocationNode) -> NodeId {
        let id = node.id();
        let position = self.pose.current_scene_position();
        let delegate = self.location_delegate.clone();

        let outcome = node.update_position_and_scale(true, position, &self.estimates, &self.projector, |n| {
            if let Some(delegate) = &delegate {
                delegate.did_update_location_and_scale(n);
            }
        });
        debug!(node = %id, ?outcome, "added location node");

        self.nodes.push(node);
        id
    }

    /// Add a node at the device's current scene position; its location is
    /// derived from the best estimate until confirmed
    pub fn add_location_node_for_current_position(&mut self, mut node: LocationNode) -> GeoArResult<NodeId> {
        let position = self.pose.current_scene_position().ok_or(GeoArError::PoseUnavailable)?;
        node.place_at(position);
        Ok(self.add_location_node(node))
    }

    /// Add a node whose own location is trusted as-is
    pub fn add_location_node_with_confirmed_location(&mut self, mut node: LocationNode) -> GeoArResult<NodeId> {
        let location = node.location().ok_or_else(|| GeoArError::InvalidLocation {
            reason: "node has no location to confirm".to_string(),
        })?;
        validate_location(&location)?;

        node.confirm_with(location);
        Ok(self.add_location_node(node))
    }

    pub fn remove_location_node(&mut self, id: NodeId) -> GeoArResult<LocationNode> {
        let index = self
            .nodes
            .iter()
            .position(|n| n.id() == id)
            .ok_or(GeoArError::UnknownNode(id))?;
        debug!(node = %id, "removed location node");
        Ok(self.nodes.remove(index))
    }

    /// Returns the number of nodes removed
    pub fn remove_all_location_nodes(&mut self) -> usize {
        let count = self.nodes.len();
        self.nodes.clear();
        count
    }

    pub fn nodes(&self) -> &[LocationNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&LocationNode> {
        self.nodes.iter().find(|n| n.id() == id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut LocationNode> {
        self.nodes.iter_mut().find(|n| n.id() == id)
    }

    /// Location the node is currently drawn at
    pub fn location_of_node(&self, id: NodeId) -> GeoArResult<Option<GeoLocation>> {
        let node = self.node(id).ok_or(GeoArError::UnknownNode(id))?;
        Ok(node.effective_location(self.estimates.best_estimate().as_ref()))
    }

    /// One frame: refresh tracking state, drop stale estimates, confirm
    /// distant nodes and reposition every node
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        self.observe_tracking_state();

        let position = self.pose.current_scene_position();
        let camera = self.pose.camera_position().filter(|camera| Some(*camera) != position);
        if let Some(position) = &position {
            self.estimates.evict_out_of_range(position);
        }

        if self.confirmation.enabled {
            report.confirmed = self.confirm_distant_nodes();
        }

        let delegate = self.location_delegate.clone();
        for node in self.nodes.iter_mut() {
            if !node.options().continually_update_position_and_scale && node.has_been_positioned() {
                continue;
            }

            let outcome = node.update_facing(false, position, camera, &self.estimates, &self.projector, |n| {
                if let Some(delegate) = &delegate {
                    delegate.did_update_location_and_scale(n);
                }
            });

            match outcome {
                TickOutcome::Committed => report.updated += 1,
                TickOutcome::Skipped(_) => report.skipped += 1,
            }
        }

        report
    }

    /// Lock in the location of unconfirmed nodes that are either far from the
    /// device or corroborated by enough nearby estimates. Returns how many
    /// nodes were confirmed.
    pub fn confirm_distant_nodes(&mut self) -> usize {
        let Some(position) = self.pose.current_scene_position() else {
            return 0;
        };
        let Some(best) = self.estimates.best_estimate() else {
            return 0;
        };
        let current = best.translated_location(&position);
        let rules = self.confirmation;

        let mut confirmed = 0;
        for node in self.nodes.iter_mut() {
            if node.is_location_confirmed() || node.state() == NodeState::Uninitialized {
                continue;
            }
            let Some(location) = node.effective_location(Some(&best)) else {
                continue;
            };

            let distant = location.distance_to(&current) > rules.distance_threshold;
            let corroborated = rules.confirmation_estimate_count > 0
                && node.has_been_positioned()
                && self.estimates.estimates_near(&node.position(), rules.confirmation_radius)
                    >= rules.confirmation_estimate_count;

            if !(distant || corroborated) {
                continue;
            }

            if let Some(location) = node.confirm_location(Some(&best)) {
                info!(node = %node.id(), %location, distant, "confirmed node location");
                confirmed += 1;
                if let Some(delegate) = &self.location_delegate {
                    delegate.did_confirm_location_of_node(node);
                }
            }
        }

        confirmed
    }

    fn observe_tracking_state(&mut self) {
        let state = self.pose.tracking_state();
        if self.last_tracking_state == Some(state) {
            return;
        }

        debug!(?state, "camera tracking state changed");
        self.last_tracking_state = Some(state);
        if let Some(delegate) = &self.tracking_delegate {
            delegate.camera_did_change_tracking_state(state);
        }
    }

    // AR session events, forwarded to the tracking delegate

    pub fn session_was_interrupted(&mut self) {
        info!("AR session interrupted");
        self.interrupted = true;
        if let Some(delegate) = &self.tracking_delegate {
            delegate.session_was_interrupted();
        }
    }

    pub fn session_interruption_ended(&mut self) {
        info!("AR session interruption ended");
        self.interrupted = false;
        if let Some(delegate) = &self.tracking_delegate {
            delegate.session_interruption_ended();
        }
    }

    pub fn session_did_fail(&mut self, error: &SessionError) {
        warn!(%error, "AR session failed");
        if let Some(delegate) = &self.tracking_delegate {
            delegate.session_did_fail(error);
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted
    }

    /// Device position as reported by the pose source
    pub fn current_scene_position(&self) -> Option<SceneVector> {
        self.pose.current_scene_position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::LocationTranslation;
    use crate::api::delegate::recording::{Event, RecordingDelegate};
    use crate::scene::StaticContent;
    use crate::tracking::{LimitedReason, MockPoseSource};
    use crate::utils::config::ConfigError;

    fn origin() -> GeoLocation {
        GeoLocation::new(51.5, -0.12).with_accuracy(5.0, 5.0).with_timestamp(1.0)
    }

    fn north_of_origin(meters: f64) -> GeoLocation {
        origin()
            .translated_by(&LocationTranslation {
                latitude_translation: meters,
                longitude_translation: 0.0,
                altitude_translation: 0.0,
            })
            .with_accuracy(0.0, 0.0)
    }

    fn session() -> (SceneLocationSession, MockPoseSource, Arc<RecordingDelegate>) {
        let pose = MockPoseSource::new();
        let mut session = SceneLocationSession::new(Box::new(pose.clone()));
        let delegate = Arc::new(RecordingDelegate::default());
        session.set_location_delegate(Some(delegate.clone()));
        session.set_tracking_delegate(Some(delegate.clone()));
        (session, pose, delegate)
    }

    fn label() -> Arc<StaticContent> {
        Arc::new(StaticContent::solid(120, 40, [255; 4]))
    }

    #[test]
    fn test_run_sets_up_root_once() {
        let (mut session, _pose, delegate) = session();
        session.run();
        session.run();

        assert!(session.is_running());
        assert_eq!(delegate.events(), vec![Event::SetupSceneNode("scene root".to_string())]);
    }

    #[test]
    fn test_ingest_requires_pose_and_valid_location() {
        let (session, pose, _) = session();
        assert!(session.ingest_location(origin()).unwrap());
        assert!(matches!(
            session.ingest_location(GeoLocation::new(120.0, 0.0)),
            Err(GeoArError::InvalidLocation { .. })
        ));

        pose.lose_tracking();
        assert!(matches!(session.ingest_location(origin()), Err(GeoArError::PoseUnavailable)));
        assert_eq!(session.estimates().len(), 1);
    }

    #[test]
    fn test_add_node_positions_immediately() {
        let (mut session, _pose, delegate) = session();
        session.ingest_location(origin()).unwrap();

        let id = session.add_location_node(LocationNode::with_annotation(Some(north_of_origin(20.0)), label()));
        let node = session.node(id).unwrap();

        assert_eq!(node.state(), NodeState::Tracking);
        assert_eq!(node.last_animation().unwrap().duration_secs, 0.0);
        assert!((node.position().z + 20.0).abs() < 1e-3);
        assert_eq!(delegate.count(|e| *e == Event::Updated(id)), 1);
    }

    #[test]
    fn test_tick_reports_updates_and_skips() {
        let (mut session, pose, delegate) = session();
        let id = session.add_location_node(LocationNode::new(Some(north_of_origin(10.0))));

        // No estimates yet
        let report = session.tick();
        assert_eq!(report, TickReport { updated: 0, skipped: 1, confirmed: 0 });
        assert_eq!(session.node(id).unwrap().state(), NodeState::Placed);

        session.ingest_location(origin()).unwrap();
        assert_eq!(session.tick().updated, 1);

        pose.lose_tracking();
        assert_eq!(session.tick().skipped, 1);
        assert_eq!(delegate.count(|e| *e == Event::Updated(id)), 1);
    }

    #[test]
    fn test_add_for_current_position() {
        let (mut session, pose, _) = session();
        pose.move_to(SceneVector::new(4.0, 0.0, -3.0));
        session.ingest_location(origin()).unwrap();

        let id = session
            .add_location_node_for_current_position(LocationNode::with_annotation(None, label()))
            .unwrap();
        let node = session.node(id).unwrap();
        assert_eq!(node.anchor_position(), Some(SceneVector::new(4.0, 0.0, -3.0)));
        assert!(session.location_of_node(id).unwrap().is_some());

        pose.lose_tracking();
        assert!(matches!(
            session.add_location_node_for_current_position(LocationNode::new(None)),
            Err(GeoArError::PoseUnavailable)
        ));
    }

    #[test]
    fn test_add_with_confirmed_location() {
        let (mut session, _pose, _) = session();
        let id = session
            .add_location_node_with_confirmed_location(LocationNode::new(Some(north_of_origin(5.0))))
            .unwrap();
        assert_eq!(session.node(id).unwrap().state(), NodeState::Confirmed);

        assert!(session
            .add_location_node_with_confirmed_location(LocationNode::new(None))
            .is_err());
    }

    #[test]
    fn test_remove_nodes() {
        let (mut session, _pose, _) = session();
        let a = session.add_location_node(LocationNode::new(Some(origin())));
        session.add_location_node(LocationNode::new(Some(origin())));

        assert_eq!(session.remove_location_node(a).unwrap().id(), a);
        assert!(matches!(session.remove_location_node(a), Err(GeoArError::UnknownNode(id)) if id == a));
        assert!(session.location_of_node(a).is_err());
        assert_eq!(session.remove_all_location_nodes(), 1);
        assert!(session.nodes().is_empty());
    }

    #[test]
    fn test_distant_nodes_are_confirmed() {
        let (mut session, _pose, delegate) = session();
        session.ingest_location(origin()).unwrap();

        let near = session.add_location_node(LocationNode::new(Some(north_of_origin(30.0))));
        let far = session.add_location_node(LocationNode::new(Some(north_of_origin(250.0))));

        let report = session.tick();
        assert_eq!(report.confirmed, 1);
        assert!(session.node(far).unwrap().is_location_confirmed());
        assert!(!session.node(near).unwrap().is_location_confirmed());
        assert_eq!(delegate.count(|e| *e == Event::Confirmed(far)), 1);

        // Already confirmed nodes are not confirmed again
        assert_eq!(session.tick().confirmed, 0);
    }

    #[test]
    fn test_corroborated_node_is_confirmed() {
        let (mut session, _pose, _) = session();
        session.ingest_location(origin()).unwrap();
        let id = session
            .add_location_node_for_current_position(LocationNode::new(None))
            .unwrap();

        // Samples around the node, far enough apart not to supersede each other
        let around = [(6.0, 0.0), (-6.0, 0.0), (0.0, 6.0), (0.0, -6.0)];
        for (i, (x, z)) in around.iter().enumerate() {
            let sample = origin()
                .translated_by(&LocationTranslation {
                    latitude_translation: -z,
                    longitude_translation: *x,
                    altitude_translation: 0.0,
                })
                .with_timestamp(2.0 + i as f64);
            session
                .estimates()
                .add_estimate(SceneVector::new(*x as f32, 0.0, *z as f32), sample, 0.1);
        }
        assert_eq!(session.estimates().len(), 5);

        assert_eq!(session.tick().confirmed, 1);
        assert!(session.node(id).unwrap().is_location_confirmed());
    }

    #[test]
    fn test_confirmation_can_be_disabled() {
        let pose = MockPoseSource::new();
        let mut config = SceneConfig::default();
        config.confirmation.enabled = false;
        let mut session = SceneLocationSession::with_config(Box::new(pose), &config);
        session.ingest_location(origin()).unwrap();

        let far = session.add_location_node(LocationNode::new(Some(north_of_origin(500.0))));
        assert_eq!(session.tick().confirmed, 0);
        assert!(!session.node(far).unwrap().is_location_confirmed());

        assert_eq!(session.confirm_distant_nodes(), 1);
    }

    #[test]
    fn test_out_of_range_estimates_evicted_on_tick() {
        let (mut session, pose, _) = session();
        session.ingest_location(origin()).unwrap();
        pose.move_to(SceneVector::new(0.0, 0.0, -150.0));

        session.tick();
        assert!(session.estimates().is_empty());
        assert!(session.current_location().is_none());
    }

    #[test]
    fn test_setup_only_nodes_stop_updating() {
        let (mut session, _pose, _) = session();
        session.ingest_location(origin()).unwrap();

        let mut node = LocationNode::new(Some(north_of_origin(10.0)));
        node.options_mut().continually_update_position_and_scale = false;
        let id = session.add_location_node(node);
        assert!(session.node(id).unwrap().has_been_positioned());

        assert_eq!(session.tick(), TickReport::default());
    }

    #[test]
    fn test_camera_override_turns_billboards() {
        let (mut session, pose, _) = session();
        session.ingest_location(origin()).unwrap();
        let id = session.add_location_node(LocationNode::with_annotation(Some(north_of_origin(10.0)), label()));

        pose.set_camera(Some(SceneVector::new(10.0, 0.0, -10.0)));
        session.tick();

        let node = session.node(id).unwrap();
        let facing = node.scene_node().transform.orientation * nalgebra::Vector3::z();
        assert!((facing.x - 1.0).abs() < 1e-4);
        assert_eq!(node.last_animation().unwrap().to.orientation, node.scene_node().transform.orientation);
    }

    #[test]
    fn test_session_events_forwarded() {
        let (mut session, pose, delegate) = session();

        session.session_was_interrupted();
        assert!(session.is_interrupted());
        session.session_interruption_ended();
        session.session_did_fail(&SessionError::new("camera unavailable"));

        session.tick();
        pose.set_tracking_state(TrackingState::Limited(LimitedReason::ExcessiveMotion));
        session.tick();
        session.tick();

        assert_eq!(
            delegate.events(),
            vec![
                Event::Interrupted,
                Event::InterruptionEnded,
                Event::Failed("camera unavailable".to_string()),
                Event::TrackingChanged(TrackingState::Normal),
                Event::TrackingChanged(TrackingState::Limited(LimitedReason::ExcessiveMotion)),
            ]
        );
    }

    #[test]
    fn test_apply_config_changes_defaults() {
        let (mut session, _pose, _) = session();
        let mut config = SceneConfig::default();
        config.node_defaults.height_adjustment_factor = 0.0;
        config.projection.ignore_altitude = true;

        session.apply_config(&config);
        let options = session.default_node_options();
        assert_eq!(options.height_adjustment_factor, 0.0);
        assert!(options.ignore_altitude);
        assert!(session.projector().ignore_altitude);
    }

    #[test]
    fn test_node_constructors_carry_defaults() {
        let (mut session, _pose, _) = session();
        let mut config = SceneConfig::default();
        config.node_defaults.height_adjustment_factor = 0.3;
        config.node_defaults.continually_update_position_and_scale = false;
        session.apply_config(&config);

        let plain = session.new_node(Some(origin()));
        assert_eq!(plain.options().height_adjustment_factor, 0.3);
        assert!(!plain.options().continually_update_position_and_scale);

        let annotated = session.new_annotation_node(Some(origin()), label());
        assert!(annotated.annotation().is_some());
        assert_eq!(annotated.options().height_adjustment_factor, 0.3);

        // Nodes built directly keep their own options
        let id = session.add_location_node(LocationNode::new(Some(origin())));
        let factor = session.node(id).unwrap().options().height_adjustment_factor;
        assert_eq!(factor, NodeOptions::default().height_adjustment_factor);
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.json");
        let mut config = SceneConfig::default();
        config.node_defaults.height_adjustment_factor = 0.25;
        config.projection.ignore_altitude = true;
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let (mut session, _pose, _) = session();
        session.load_config(&path).unwrap();
        assert!(session.projector().ignore_altitude);
        assert_eq!(session.default_node_options().height_adjustment_factor, 0.25);

        let missing = session.load_config(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(GeoArError::Config(ConfigError::Io { .. }))));
    }
}
