//! Scene graph, annotation content and geo-anchored location nodes

pub mod annotation;
pub mod content;
pub mod location_node;
pub mod node;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

pub use annotation::AnnotationNode;
pub use content::{ContentBounds, ContentSurface, RenderedContent, StaticContent};
pub use location_node::{
    pivot_offset, LocationEstimateMethod, LocationNode, NodeOptions, NodeRecord, NodeState, PendingAnnotation,
    RestoredNode, SkipReason, TickMetrics, TickOutcome,
};
pub use node::{
    BillboardAxes, BillboardConstraint, CommittedAnimation, Material, NodeChanges, PlaneGeometry, SceneNode,
    SceneTransaction, Transform,
};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique handle of a location node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    pub(crate) fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
