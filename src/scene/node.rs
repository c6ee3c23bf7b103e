//! Minimal scene-graph abstraction: transforms, billboard constraints,
//! plane geometry and atomic animated transactions

use nalgebra::{Matrix4, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::core::SceneVector;
use crate::scene::content::RenderedContent;

/// Local transform of a scene node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: SceneVector,
    pub scale: SceneVector,
    /// Pivot applied before scale and rotation
    pub pivot: Matrix4<f32>,
    pub orientation: UnitQuaternion<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: SceneVector::zeros(),
            scale: SceneVector::repeat(1.0),
            pivot: Matrix4::identity(),
            orientation: UnitQuaternion::identity(),
        }
    }
}

impl Transform {
    /// Translation part of the pivot
    pub fn pivot_translation(&self) -> SceneVector {
        SceneVector::new(self.pivot[(0, 3)], self.pivot[(1, 3)], self.pivot[(2, 3)])
    }
}

/// Axes a billboard may rotate around to face the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillboardAxes {
    pub x: bool,
    pub y: bool,
    pub z: bool,
}

impl BillboardAxes {
    pub const Y: BillboardAxes = BillboardAxes { x: false, y: true, z: false };
    pub const ALL: BillboardAxes = BillboardAxes { x: true, y: true, z: true };
}

/// Keeps a node facing the camera around its free axes.
/// A constrained node's own scale is ignored when rendered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BillboardConstraint {
    pub free_axes: BillboardAxes,
}

impl Default for BillboardConstraint {
    fn default() -> Self {
        Self {
            free_axes: BillboardAxes::Y,
        }
    }
}

impl BillboardConstraint {
    /// Rotation turning the node's +Z towards `camera_position`.
    /// Roll (Z) is never applied.
    pub fn orientation(&self, node_position: &SceneVector, camera_position: &SceneVector) -> UnitQuaternion<f32> {
        let d = camera_position - node_position;

        let (yaw, horizontal) = if self.free_axes.y {
            (d.x.atan2(d.z), d.x.hypot(d.z))
        } else {
            (0.0, d.z)
        };
        let pitch = if self.free_axes.x { (-d.y).atan2(horizontal) } else { 0.0 };

        UnitQuaternion::from_axis_angle(&Vector3::y_axis(), yaw)
            * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), pitch)
    }
}

/// Surface material for a plane
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub texture: Option<RenderedContent>,
    pub double_sided: bool,
    pub reads_from_depth_buffer: bool,
    pub writes_to_depth_buffer: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            texture: None,
            double_sided: true,
            reads_from_depth_buffer: true,
            writes_to_depth_buffer: true,
        }
    }
}

/// Flat rectangle in scene units
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneGeometry {
    pub width: f32,
    pub height: f32,
    pub material: Material,
}

/// A node in the scene graph
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    name: String,
    pub transform: Transform,
    pub rendering_order: i64,
    pub constraint: Option<BillboardConstraint>,
    pub geometry: Option<PlaneGeometry>,
    children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            rendering_order: 0,
            constraint: None,
            geometry: None,
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_child(&mut self, child: SceneNode) {
        self.children.push(child);
    }

    pub fn children(&self) -> &[SceneNode] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [SceneNode] {
        &mut self.children
    }
}

/// Staged changes for one node; `None` leaves the field untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeChanges {
    pub position: Option<SceneVector>,
    pub scale: Option<SceneVector>,
    pub pivot: Option<Matrix4<f32>>,
    pub orientation: Option<UnitQuaternion<f32>>,
    pub rendering_order: Option<i64>,
}

impl NodeChanges {
    pub fn apply_to(&self, node: &mut SceneNode) {
        if let Some(position) = self.position {
            node.transform.position = position;
        }
        if let Some(scale) = self.scale {
            node.transform.scale = scale;
        }
        if let Some(pivot) = self.pivot {
            node.transform.pivot = pivot;
        }
        if let Some(orientation) = self.orientation {
            node.transform.orientation = orientation;
        }
        if let Some(order) = self.rendering_order {
            node.rendering_order = order;
        }
    }
}

/// Record of the last committed animation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommittedAnimation {
    pub duration_secs: f64,
    pub from: Transform,
    pub to: Transform,
}

/// Changes to a node and its content subtree, applied together on `commit`.
///
/// Nothing is written before `commit`, so a transaction that is dropped
/// leaves the scene untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneTransaction {
    animation_duration: f64,
    own: NodeChanges,
    content: NodeChanges,
    content_children_scale: Option<SceneVector>,
}

impl SceneTransaction {
    pub fn begin(animation_duration: f64) -> Self {
        Self {
            animation_duration: animation_duration.max(0.0),
            ..Default::default()
        }
    }

    pub fn animation_duration(&self) -> f64 {
        self.animation_duration
    }

    pub fn own_mut(&mut self) -> &mut NodeChanges {
        &mut self.own
    }

    pub fn content_mut(&mut self) -> &mut NodeChanges {
        &mut self.content
    }

    /// First half of pushing scale down: the constrained node keeps identity scale
    pub fn clear_own_scale(&mut self) {
        self.own.scale = Some(SceneVector::repeat(1.0));
    }

    /// Second half: the content node and every child carry the scale.
    /// Clears the own scale if that has not happened yet.
    pub fn set_child_scale(&mut self, scale: SceneVector) {
        if self.own.scale != Some(SceneVector::repeat(1.0)) {
            self.clear_own_scale();
        }
        self.content.scale = Some(scale);
        self.content_children_scale = Some(scale);
    }

    pub fn staged_child_scale(&self) -> Option<SceneVector> {
        self.content_children_scale
    }

    /// Apply every staged change at once
    pub fn commit(self, own: &mut SceneNode, content: Option<&mut SceneNode>) -> CommittedAnimation {
        let from = own.transform;

        self.own.apply_to(own);
        if let Some(content) = content {
            self.content.apply_to(content);
            if let Some(scale) = self.content_children_scale {
                for child in content.children_mut() {
                    child.transform.scale = scale;
                }
            }
        }

        CommittedAnimation {
            duration_secs: self.animation_duration,
            from,
            to: own.transform,
        }
    }
}
