//! Geo-anchored AR annotations
//!
//! Places scene nodes at real-world coordinates inside an AR scene. Location
//! samples are paired with the device's scene position, the most trustworthy
//! pairing is used to project each node's location into scene space, and
//! annotation nodes are scaled and ordered by distance every frame.

pub mod core;
pub mod algorithms;
pub mod processing;
pub mod scene;
pub mod tracking;
pub mod utils;
pub mod api;

// Re-export commonly used types
pub use core::{GeoLocation, LocationEstimate, SceneVector, SCENE_LIMIT};
pub use algorithms::{DistanceClamp, GeoProjector, LocationTranslation, Placement, RenderOrderPolicy, ScalingScheme};
pub use processing::{EstimatePolicy, EstimateStore, SharedEstimateStore};
pub use scene::{
    AnnotationNode, ContentSurface, LocationEstimateMethod, LocationNode, NodeId, NodeOptions, NodeState,
    SceneNode, StaticContent, TickOutcome,
};
pub use tracking::{MockPoseSource, PoseSource, TrackingState};
pub use utils::{init_logging, ConfigError, ConfigurationManager, SceneConfig};
pub use api::{
    GeoArError, GeoArResult, SceneLocationDelegate, SceneLocationEstimateDelegate, SceneLocationSession,
    SceneTrackingDelegate, SessionError, TickReport,
};
