//! Geo-anchored scene nodes and the per-tick position/scale update
//!
//! A `LocationNode` places itself relative to the best location estimate on
//! every tick. Nodes carrying an `AnnotationNode` are billboarded: the parent
//! keeps identity scale and the computed scale is pushed onto the annotation
//! and its children.

use std::sync::Arc;

use nalgebra::{Matrix4, Vector3};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::algorithms::{DistanceClamp, GeoProjector, Placement, RenderOrderPolicy, ScalingScheme, ScalingSchemeConfig};
use crate::core::{
    GeoLocation, LocationEstimate, SceneVector, DEFAULT_ANIMATION_DURATION_SECS, DEFAULT_HEIGHT_ADJUSTMENT_FACTOR,
};
use crate::processing::EstimateStore;
use crate::scene::annotation::AnnotationNode;
use crate::scene::content::ContentSurface;
use crate::scene::node::{BillboardConstraint, CommittedAnimation, SceneNode, SceneTransaction};
use crate::scene::NodeId;

/// Lifecycle of a location node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    /// No location and no scene placement yet
    Uninitialized,
    /// Has a location or placement, waiting for its first projection
    Placed,
    /// Refreshed every tick
    Tracking,
    /// Location locked in
    Confirmed,
}

/// Where the node's notion of "current location" comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LocationEstimateMethod {
    /// Latest raw location sample only
    CoreLocationDataOnly,
    /// Best scene/location estimate, translated to the device position
    #[default]
    MostRelevantEstimate,
}

/// Per-node tuning
#[derive(Debug, Clone)]
pub struct NodeOptions {
    /// Label offset in multiples of its scale; 0 puts it on the true location,
    /// negative values below it
    pub height_adjustment_factor: f64,
    pub scaling_scheme: ScalingScheme,
    /// Use the externally applied scale instead of the scaling scheme
    pub scale_relative_to_distance: bool,
    pub distance_clamp: DistanceClamp,
    pub render_order: RenderOrderPolicy,
    /// Seconds; setup ticks always use 0
    pub animation_duration: f64,
    pub ignore_altitude: bool,
    /// When false the session only positions the node on setup
    pub continually_update_position_and_scale: bool,
    pub estimate_method: LocationEstimateMethod,
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            height_adjustment_factor: DEFAULT_HEIGHT_ADJUSTMENT_FACTOR,
            scaling_scheme: ScalingScheme::default(),
            scale_relative_to_distance: false,
            distance_clamp: DistanceClamp::default(),
            render_order: RenderOrderPolicy::default(),
            animation_duration: DEFAULT_ANIMATION_DURATION_SECS,
            ignore_altitude: false,
            continually_update_position_and_scale: true,
            estimate_method: LocationEstimateMethod::default(),
        }
    }
}

/// Why a tick left the node untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoScenePosition,
    NoBestEstimate,
    NoLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Committed,
    Skipped(SkipReason),
}

impl TickOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, TickOutcome::Committed)
    }
}

/// Quantities computed once per tick and shared by both scale resolutions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickMetrics {
    /// Great-circle distance between the node and the current location
    pub distance: f64,
    /// Clamped distance, used for scale only
    pub adjusted_distance: f64,
    pub rendering_order: i64,
    pub placement: Placement,
    /// Point billboards turn towards; the device position unless a separate
    /// camera position is supplied
    pub camera_position: SceneVector,
}

/// A node anchored to a real-world location
pub struct LocationNode {
    id: NodeId,
    location: Option<GeoLocation>,
    anchor_position: Option<SceneVector>,
    confirmed: bool,
    state: NodeState,
    node: SceneNode,
    applied_scale: SceneVector,
    annotation: Option<AnnotationNode>,
    options: NodeOptions,
    last_animation: Option<CommittedAnimation>,
}

impl std::fmt::Debug for LocationNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationNode")
            .field("id", &self.id)
            .field("location", &self.location)
            .field("state", &self.state)
            .field("transform", &self.node.transform)
            .field("annotated", &self.annotation.is_some())
            .finish()
    }
}

impl LocationNode {
    /// Plain node; without a location it waits for `place_at`
    pub fn new(location: Option<GeoLocation>) -> Self {
        let state = if location.is_some() {
            NodeState::Placed
        } else {
            NodeState::Uninitialized
        };

        Self {
            id: NodeId::next(),
            location,
            anchor_position: None,
            confirmed: false,
            state,
            node: SceneNode::new("location"),
            applied_scale: SceneVector::repeat(1.0),
            annotation: None,
            options: NodeOptions::default(),
            last_animation: None,
        }
    }

    /// Node showing `content` as a Y-axis billboard
    pub fn with_annotation(location: Option<GeoLocation>, content: Arc<dyn ContentSurface>) -> Self {
        let mut node = Self::new(location);
        node.node.constraint = Some(BillboardConstraint::default());
        node.annotation = Some(AnnotationNode::new(content));
        node
    }

    pub fn with_options(mut self, options: NodeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn location(&self) -> Option<GeoLocation> {
        self.location
    }

    pub fn is_location_confirmed(&self) -> bool {
        self.confirmed
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn scene_node(&self) -> &SceneNode {
        &self.node
    }

    pub fn position(&self) -> SceneVector {
        self.node.transform.position
    }

    /// Scene position the node was placed at without a known location
    pub fn anchor_position(&self) -> Option<SceneVector> {
        self.anchor_position
    }

    pub fn rendering_order(&self) -> i64 {
        self.node.rendering_order
    }

    pub fn pivot_y(&self) -> f32 {
        self.node.transform.pivot_translation().y
    }

    pub fn annotation(&self) -> Option<&AnnotationNode> {
        self.annotation.as_ref()
    }

    pub fn annotation_mut(&mut self) -> Option<&mut AnnotationNode> {
        self.annotation.as_mut()
    }

    pub fn options(&self) -> &NodeOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut NodeOptions {
        &mut self.options
    }

    /// Takes effect on the next tick
    pub fn set_scaling_scheme(&mut self, scheme: ScalingScheme) {
        self.options.scaling_scheme = scheme;
    }

    pub fn set_height_adjustment_factor(&mut self, factor: f64) {
        self.options.height_adjustment_factor = factor;
    }

    pub fn set_scale_relative_to_distance(&mut self, enabled: bool) {
        self.options.scale_relative_to_distance = enabled;
    }

    /// Externally applied scale, read by viewer-relative scaling
    pub fn set_applied_scale(&mut self, scale: SceneVector) {
        self.applied_scale = scale;
    }

    pub fn applied_scale(&self) -> SceneVector {
        self.applied_scale
    }

    pub fn last_animation(&self) -> Option<&CommittedAnimation> {
        self.last_animation.as_ref()
    }

    /// Put a location-less node at a scene position; its location is then
    /// derived from estimates until confirmed
    pub fn place_at(&mut self, scene_position: SceneVector) {
        self.anchor_position = Some(scene_position);
        self.node.transform.position = scene_position;
        if self.state == NodeState::Uninitialized {
            self.state = NodeState::Placed;
        }
    }

    /// Location the node should be drawn at given the current best estimate.
    ///
    /// Confirmed nodes (and `CoreLocationDataOnly` nodes) use their own
    /// location. Otherwise a more accurate best estimate, translated to the
    /// node's anchor, wins over the node's own location.
    pub fn effective_location(&self, best: Option<&LocationEstimate>) -> Option<GeoLocation> {
        let derived = match (best, self.anchor_position) {
            (Some(best), Some(anchor)) => Some((best, best.translated_location(&anchor))),
            _ => None,
        };

        if self.confirmed || self.options.estimate_method == LocationEstimateMethod::CoreLocationDataOnly {
            return self.location.or(derived.map(|(_, location)| location));
        }

        match (self.location, derived) {
            (None, derived) => derived.map(|(_, location)| location),
            (Some(own), Some((best, derived)))
                if best.location.horizontal_accuracy() < own.horizontal_accuracy() =>
            {
                Some(derived)
            }
            (Some(own), _) => Some(own),
        }
    }

    /// Lock in the node's location. Returns the confirmed location, or `None`
    /// if none can be derived yet.
    pub fn confirm_location(&mut self, best: Option<&LocationEstimate>) -> Option<GeoLocation> {
        if self.confirmed {
            return self.location;
        }
        let location = self.effective_location(best)?;
        self.confirm_with(location);
        Some(location)
    }

    /// Lock in an explicit location
    pub fn confirm_with(&mut self, location: GeoLocation) {
        self.location = Some(location);
        self.confirmed = true;
        self.state = NodeState::Confirmed;
    }

    /// Reposition, rescale and re-order the node for this tick.
    ///
    /// Skips without touching anything (and without calling `on_completion`)
    /// when the scene position, the best estimate or the node's location is
    /// unavailable. Otherwise every change is committed in one transaction,
    /// instantly on `setup` and animated afterwards.
    pub fn update_position_and_scale<F>(
        &mut self,
        setup: bool,
        scene_position: Option<SceneVector>,
        estimates: &EstimateStore,
        projector: &GeoProjector,
        on_completion: F,
    ) -> TickOutcome
    where
        F: FnOnce(&LocationNode),
    {
        self.update_facing(setup, scene_position, None, estimates, projector, on_completion)
    }

    /// Same as `update_position_and_scale`, with billboards turned towards
    /// `camera_position` when it is given. The orientation is staged in the
    /// same transaction as the rest of the update.
    pub fn update_facing<F>(
        &mut self,
        setup: bool,
        scene_position: Option<SceneVector>,
        camera_position: Option<SceneVector>,
        estimates: &EstimateStore,
        projector: &GeoProjector,
        on_completion: F,
    ) -> TickOutcome
    where
        F: FnOnce(&LocationNode),
    {
        let metrics = match self.tick_metrics(scene_position, camera_position, estimates, projector) {
            Ok(metrics) => metrics,
            Err(reason) => {
                trace!(node = %self.id, ?reason, "skipping location node update");
                return TickOutcome::Skipped(reason);
            }
        };

        if self.annotation.is_some() {
            self.commit_update(setup, &metrics, Self::resolve_annotation_scale);
        } else {
            self.commit_update(setup, &metrics, Self::resolve_placement_scale);
        }

        on_completion(self);
        TickOutcome::Committed
    }

    fn tick_metrics(
        &self,
        scene_position: Option<SceneVector>,
        camera_position: Option<SceneVector>,
        estimates: &EstimateStore,
        projector: &GeoProjector,
    ) -> Result<TickMetrics, SkipReason> {
        let position = scene_position.ok_or(SkipReason::NoScenePosition)?;
        let best = estimates.best_estimate().ok_or(SkipReason::NoBestEstimate)?;

        let current_location = match self.options.estimate_method {
            LocationEstimateMethod::CoreLocationDataOnly => estimates
                .latest_location()
                .ok_or(SkipReason::NoBestEstimate)?,
            LocationEstimateMethod::MostRelevantEstimate => best.translated_location(&position),
        };

        let location = self.effective_location(Some(&best)).ok_or(SkipReason::NoLocation)?;
        let distance = location.distance_to(&current_location);

        let projector = projector.with_ignore_altitude(projector.ignore_altitude || self.options.ignore_altitude);

        Ok(TickMetrics {
            distance,
            adjusted_distance: self.options.distance_clamp.apply(distance),
            rendering_order: self.options.render_order.order(distance),
            placement: projector.place(&location, &best),
            camera_position: camera_position.unwrap_or(position),
        })
    }

    /// Shared commit path. `resolve_scale` stages the scale (and anything that
    /// depends on it) into the transaction before it is applied.
    fn commit_update<R>(&mut self, setup: bool, metrics: &TickMetrics, resolve_scale: R)
    where
        R: FnOnce(&Self, &TickMetrics, &mut SceneTransaction),
    {
        let duration = if setup { 0.0 } else { self.options.animation_duration };
        let mut tx = SceneTransaction::begin(duration);

        tx.own_mut().position = Some(metrics.placement.position);
        tx.own_mut().rendering_order = Some(metrics.rendering_order);
        tx.content_mut().rendering_order = Some(metrics.rendering_order);

        if let Some(constraint) = self.node.constraint {
            tx.own_mut().orientation =
                Some(constraint.orientation(&metrics.placement.position, &metrics.camera_position));
        }

        resolve_scale(&*self, metrics, &mut tx);

        let content = self.annotation.as_mut().map(|a| a.node_mut());
        let animation = tx.commit(&mut self.node, content);
        self.last_animation = Some(animation);

        if matches!(self.state, NodeState::Placed | NodeState::Uninitialized) {
            self.state = NodeState::Tracking;
        }

        trace!(
            node = %self.id,
            distance = metrics.distance,
            adjusted = metrics.adjusted_distance,
            order = metrics.rendering_order,
            setup,
            "committed location node update"
        );
    }

    /// Plain nodes carry the placement pull-in scale themselves
    fn resolve_placement_scale(&self, metrics: &TickMetrics, tx: &mut SceneTransaction) {
        tx.own_mut().scale = Some(SceneVector::repeat(metrics.placement.placement_scale));
    }

    /// Billboarded nodes ignore their own scale, so it is cleared and the
    /// resolved scale goes to the annotation and each of its children
    fn resolve_annotation_scale(&self, metrics: &TickMetrics, tx: &mut SceneTransaction) {
        tx.clear_own_scale();

        let relative = self.options.scale_relative_to_distance || self.options.scaling_scheme.is_relative_to_viewer();
        let scale = if relative {
            tx.set_child_scale(self.applied_scale);
            self.applied_scale.y
        } else {
            let scale = self
                .options
                .scaling_scheme
                .scale(metrics.distance, metrics.adjusted_distance);
            tx.set_child_scale(SceneVector::repeat(scale));
            scale
        };

        let pivot_y = pivot_offset(self.options.height_adjustment_factor, scale);
        tx.own_mut().pivot = Some(Matrix4::new_translation(&Vector3::new(0.0, pivot_y, 0.0)));
    }

    /// Whether at least one update has been committed
    pub fn has_been_positioned(&self) -> bool {
        self.last_animation.is_some()
    }

    /// Persistable description of this node
    pub fn to_record(&self) -> NodeRecord {
        NodeRecord {
            location: self.location,
            confirmed: self.confirmed,
            anchor_position: self.anchor_position.map(|p| [p.x, p.y, p.z]),
            annotated: self.annotation.is_some(),
            height_adjustment_factor: self.options.height_adjustment_factor,
            scaling_scheme: self.options.scaling_scheme.to_config(),
            scale_relative_to_distance: self.options.scale_relative_to_distance,
            distance_clamp: self.options.distance_clamp,
            ignore_altitude: self.options.ignore_altitude,
            estimate_method: self.options.estimate_method,
        }
    }
}

/// Vertical pivot offset placing a label `factor` scaled units above its anchor
pub fn pivot_offset(height_adjustment_factor: f64, scale: f32) -> f32 {
    (-height_adjustment_factor * scale as f64) as f32
}

/// Serializable description of a location node.
///
/// Annotation content is live and never persisted: restoring an annotated
/// record yields a `PendingAnnotation` that needs the content to finish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub location: Option<GeoLocation>,
    pub confirmed: bool,
    pub anchor_position: Option<[f32; 3]>,
    pub annotated: bool,
    pub height_adjustment_factor: f64,
    /// `None` for custom scaling functions, which restore as the default scheme
    pub scaling_scheme: Option<ScalingSchemeConfig>,
    pub scale_relative_to_distance: bool,
    pub distance_clamp: DistanceClamp,
    pub ignore_altitude: bool,
    pub estimate_method: LocationEstimateMethod,
}

/// Result of restoring a record
#[derive(Debug)]
pub enum RestoredNode {
    Plain(LocationNode),
    NeedsContent(PendingAnnotation),
}

/// Annotated record waiting for its live content
#[derive(Debug)]
pub struct PendingAnnotation {
    record: NodeRecord,
}

impl PendingAnnotation {
    pub fn with_content(self, content: Arc<dyn ContentSurface>) -> LocationNode {
        let node = LocationNode::with_annotation(None, content);
        self.record.apply_to(node)
    }
}

impl NodeRecord {
    pub fn restore(self) -> RestoredNode {
        if self.annotated {
            RestoredNode::NeedsContent(PendingAnnotation { record: self })
        } else {
            let node = LocationNode::new(None);
            RestoredNode::Plain(self.apply_to(node))
        }
    }

    fn apply_to(self, mut node: LocationNode) -> LocationNode {
        let options = node.options_mut();
        options.height_adjustment_factor = self.height_adjustment_factor;
        options.scaling_scheme = self.scaling_scheme.map(ScalingScheme::from).unwrap_or_default();
        options.scale_relative_to_distance = self.scale_relative_to_distance;
        options.distance_clamp = self.distance_clamp;
        options.ignore_altitude = self.ignore_altitude;
        options.estimate_method = self.estimate_method;

        node.location = self.location;
        if node.location.is_some() {
            node.state = NodeState::Placed;
        }
        if let Some([x, y, z]) = self.anchor_position {
            node.place_at(SceneVector::new(x, y, z));
        }
        if self.confirmed {
            if let Some(location) = self.location {
                node.confirm_with(location);
            }
        }
        node
    }
}
