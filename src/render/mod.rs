mod camera;

pub use camera::{forward_to_yaw_pitch, Camera};

use crate::geometry::TriMesh;
use glam::{Mat4, Vec3};
use std::collections::HashMap;
use std::sync::Arc;

/// Identifier of a node handed to the scene graph. Allocated by the scene,
/// never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Terrain,
    Flower,
    HoverIndicator,
    Cloud,
    Sun,
}

/// Everything the renderer needs to draw one node.
#[derive(Debug, Clone)]
pub struct Visual {
    pub kind: NodeKind,
    /// `None` for nodes whose geometry comes from an external model.
    pub mesh: Option<Arc<TriMesh>>,
    pub transform: Mat4,
    pub visible: bool,
    /// Selection border.
    pub highlighted: bool,
    pub color: [f32; 4],
    /// Sprite frame or texture slot, for nodes that cycle images.
    pub frame: u32,
}

impl Visual {
    pub fn new(kind: NodeKind, mesh: Option<Arc<TriMesh>>, transform: Mat4) -> Self {
        Self {
            kind,
            mesh,
            transform,
            visible: true,
            highlighted: false,
            color: [1.0, 1.0, 1.0, 1.0],
            frame: 0,
        }
    }

    pub fn with_color(mut self, color: [f32; 4]) -> Self {
        self.color = color;
        self
    }

    pub fn translation(&self) -> Vec3 {
        self.transform.w_axis.truncate()
    }
}

/// The renderer seam. Implementations own GPU resources for every node they
/// have been given and must release them in `remove_node`.
pub trait SceneGraph {
    fn add_node(&mut self, id: NodeId, visual: &Visual);
    fn update_node(&mut self, id: NodeId, visual: &Visual);
    /// Removing an unknown node is a no-op.
    fn remove_node(&mut self, id: NodeId);
    fn contains(&self, id: NodeId) -> bool;
    fn node_count(&self) -> usize;
    fn draw(&mut self, camera: &Camera);
}

/// Scene graph without a GPU backend: tracks live nodes and reports frames
/// through the log.
#[derive(Default)]
pub struct HeadlessRenderer {
    nodes: HashMap<NodeId, Visual>,
    frames: u64,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: NodeId) -> Option<&Visual> {
        self.nodes.get(&id)
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl SceneGraph for HeadlessRenderer {
    fn add_node(&mut self, id: NodeId, visual: &Visual) {
        if self.nodes.insert(id, visual.clone()).is_some() {
            log::warn!("Node {:?} added twice, replacing", id);
        }
    }

    fn update_node(&mut self, id: NodeId, visual: &Visual) {
        match self.nodes.get_mut(&id) {
            Some(existing) => *existing = visual.clone(),
            None => log::debug!("Ignoring update for detached node {:?}", id),
        }
    }

    fn remove_node(&mut self, id: NodeId) {
        self.nodes.remove(&id);
    }

    fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn draw(&mut self, camera: &Camera) {
        self.frames += 1;
        let visible = self.nodes.values().filter(|visual| visual.visible).count();
        log::trace!(
            "frame {}: {} visible of {} nodes, eye {:?}",
            self.frames,
            visible,
            self.nodes.len(),
            camera.position
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_is_idempotent() {
        let mut graph = HeadlessRenderer::new();
        let visual = Visual::new(NodeKind::Flower, None, Mat4::IDENTITY);
        graph.add_node(NodeId(1), &visual);
        assert!(graph.contains(NodeId(1)));
        graph.remove_node(NodeId(1));
        graph.remove_node(NodeId(1));
        assert!(!graph.contains(NodeId(1)));
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn update_of_detached_node_does_not_resurrect_it() {
        let mut graph = HeadlessRenderer::new();
        let visual = Visual::new(NodeKind::Cloud, None, Mat4::IDENTITY);
        graph.update_node(NodeId(7), &visual);
        assert!(!graph.contains(NodeId(7)));
    }
}
