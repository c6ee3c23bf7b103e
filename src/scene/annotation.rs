//! Billboard surface showing externally supplied 2D content
//!
//! An `AnnotationNode` can only be built from a live `ContentSurface`; there
//! is no way to create one from persisted state alone.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::core::PIXELS_PER_SCENE_UNIT;
use crate::scene::content::ContentSurface;
use crate::scene::node::{Material, PlaneGeometry, SceneNode};

/// Content-carrying child of a location node. Scale is applied here, never on
/// the billboard-constrained parent.
pub struct AnnotationNode {
    node: SceneNode,
    content: Arc<dyn ContentSurface>,
    flicker_removed: bool,
}

impl fmt::Debug for AnnotationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotationNode")
            .field("node", &self.node)
            .field("flicker_removed", &self.flicker_removed)
            .finish_non_exhaustive()
    }
}

impl AnnotationNode {
    /// Render `content` once and build a plane matching its natural size
    pub fn new(content: Arc<dyn ContentSurface>) -> Self {
        let mut node = SceneNode::new("annotation");
        node.geometry = Some(Self::build_plane(content.as_ref()));

        let mut annotation = Self {
            node,
            content,
            flicker_removed: false,
        };
        annotation.remove_flicker();
        annotation
    }

    fn build_plane(content: &dyn ContentSurface) -> PlaneGeometry {
        let bounds = content.bounds();
        PlaneGeometry {
            width: bounds.width / PIXELS_PER_SCENE_UNIT,
            height: bounds.height / PIXELS_PER_SCENE_UNIT,
            material: Material {
                texture: Some(content.render()),
                ..Material::default()
            },
        }
    }

    /// One-time setup that stops the flat plane from z-fighting or showing
    /// its back face while the camera orbits it
    pub fn remove_flicker(&mut self) {
        if self.flicker_removed {
            return;
        }
        if let Some(geometry) = self.node.geometry.as_mut() {
            geometry.material.reads_from_depth_buffer = false;
            geometry.material.double_sided = false;
        }
        self.flicker_removed = true;
    }

    pub fn is_flicker_removed(&self) -> bool {
        self.flicker_removed
    }

    /// Re-render after the content reported a change; resizes the plane too
    pub fn content_did_change(&mut self) {
        let plane = Self::build_plane(self.content.as_ref());
        trace!(width = plane.width, height = plane.height, "re-rendered annotation content");

        let material = match self.node.geometry.take() {
            Some(old) => Material {
                texture: plane.material.texture,
                ..old.material
            },
            None => plane.material,
        };
        self.node.geometry = Some(PlaneGeometry { material, ..plane });
    }

    pub fn content(&self) -> &Arc<dyn ContentSurface> {
        &self.content
    }

    /// Plane size in scene units
    pub fn plane_size(&self) -> (f32, f32) {
        self.node
            .geometry
            .as_ref()
            .map(|g| (g.width, g.height))
            .unwrap_or((0.0, 0.0))
    }

    pub fn add_child(&mut self, child: SceneNode) {
        self.node.add_child(child);
    }

    pub fn children(&self) -> &[SceneNode] {
        self.node.children()
    }

    pub fn node(&self) -> &SceneNode {
        &self.node
    }

    pub fn node_mut(&mut self) -> &mut SceneNode {
        &mut self.node
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::content::StaticContent;

    #[test]
    fn test_plane_sized_from_pixels() {
        let annotation = AnnotationNode::new(Arc::new(StaticContent::solid(300, 120, [255; 4])));
        assert_eq!(annotation.plane_size(), (3.0, 1.2));

        let material = &annotation.node().geometry.as_ref().unwrap().material;
        assert_eq!(material.texture.as_ref().unwrap().width, 300);
    }

    #[test]
    fn test_flicker_removed_at_construction() {
        let mut annotation = AnnotationNode::new(Arc::new(StaticContent::solid(10, 10, [0; 4])));
        assert!(annotation.is_flicker_removed());

        let material = annotation.node().geometry.as_ref().unwrap().material.clone();
        assert!(!material.reads_from_depth_buffer);
        assert!(!material.double_sided);
        assert!(material.writes_to_depth_buffer);

        annotation.remove_flicker();
        assert_eq!(annotation.node().geometry.as_ref().unwrap().material, material);
    }

    #[test]
    fn test_content_change_rerenders() {
        let content = Arc::new(StaticContent::solid(100, 100, [0; 4]));
        let mut annotation = AnnotationNode::new(content.clone());

        content.replace(200, 50, vec![7; 200 * 50 * 4]);
        // Not picked up until notified
        assert_eq!(annotation.plane_size(), (1.0, 1.0));

        annotation.content_did_change();
        assert_eq!(annotation.plane_size(), (2.0, 0.5));
        let material = &annotation.node().geometry.as_ref().unwrap().material;
        assert_eq!(material.texture.as_ref().unwrap().revision, 1);
        assert!(!material.reads_from_depth_buffer);
    }
}
