use crate::geometry::{Hit, TriMesh};
use crate::render::{NodeId, NodeKind, Visual};
use glam::{Mat4, Quat, Vec3};
use std::sync::Arc;

pub const HOVER_RADIUS: f32 = 0.1;
/// Lift along the surface normal so the disc does not z-fight the ground.
pub const HOVER_OFFSET: f32 = 0.001;
const HOVER_SEGMENTS: u32 = 32;

/// Disc that marks where an add or erase click would land.
#[derive(Debug, Clone)]
pub struct HoverIndicator {
    node: NodeId,
    visual: Visual,
}

impl HoverIndicator {
    pub fn new(node: NodeId) -> Self {
        let mesh = Arc::new(TriMesh::circle(HOVER_RADIUS, HOVER_SEGMENTS));
        let mut visual = Visual::new(NodeKind::HoverIndicator, Some(mesh), Mat4::IDENTITY)
            .with_color([1.0, 1.0, 1.0, 0.6]);
        visual.visible = false;
        Self { node, visual }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn visual(&self) -> &Visual {
        &self.visual
    }

    pub fn is_visible(&self) -> bool {
        self.visual.visible
    }

    pub fn position(&self) -> Vec3 {
        self.visual.translation()
    }

    /// Places the disc on `hit`, front face along the surface normal.
    pub fn show_at(&mut self, hit: &Hit) {
        let orientation = Quat::from_rotation_arc(Vec3::Z, hit.normal);
        let position = hit.point + hit.normal * HOVER_OFFSET;
        self.visual.transform = Mat4::from_rotation_translation(orientation, position);
        self.visual.visible = true;
    }

    pub fn hide(&mut self) {
        self.visual.visible = false;
    }
}
