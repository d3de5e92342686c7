use crate::assets::{CancellationToken, ImageSource, LoadId};
use crate::geometry::{raycast_mesh, Hit, Ray, Raycast, TriMesh};
use crate::render::{NodeId, NodeKind, Visual};
use glam::{Mat4, Quat, Vec3};
use rand::Rng;
use std::f32::consts::PI;
use std::sync::Arc;

/// Width of every flower quad in world units.
pub const FLOWER_SIZE: f32 = 0.4;
pub const MIN_SCALE: f32 = 0.1;
pub const MAX_SCALE: f32 = 5.0;

const SWAY_RATE: f32 = 0.002;
const SWAY_PHASE: f32 = 2.0;
const SWAY_AMPLITUDE: f32 = 0.1;

/// An image billboard planted on the terrain.
///
/// The entity exists from construction; its quad only appears once the image
/// has been decoded and [`Flower::attach_image`] is called. Until then it has
/// no hittable surface, but it keeps its base position so it can be erased.
#[derive(Debug)]
pub struct Flower {
    base_position: Vec3,
    yaw_degrees: f32,
    scale: f32,
    tilt: f32,
    selected: bool,
    source: ImageSource,
    node: NodeId,
    visual: Option<Visual>,
    load: Option<(LoadId, CancellationToken)>,
}

impl Flower {
    pub fn new(source: ImageSource, base_position: Vec3, yaw_radians: f32, node: NodeId) -> Self {
        let mut flower = Self {
            base_position,
            yaw_degrees: 0.0,
            scale: 1.0,
            tilt: 0.0,
            selected: false,
            source,
            node,
            visual: None,
            load: None,
        };
        flower.set_rotation_degrees(yaw_radians.to_degrees());
        flower
    }

    /// New flower facing a uniformly random direction in `[0, π)`.
    pub fn with_random_yaw(
        source: ImageSource,
        base_position: Vec3,
        node: NodeId,
        rng: &mut impl Rng,
    ) -> Self {
        Self::new(source, base_position, rng.gen_range(0.0..PI), node)
    }

    pub fn base_position(&self) -> Vec3 {
        self.base_position
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    pub fn is_loaded(&self) -> bool {
        self.visual.is_some()
    }

    pub fn visual(&self) -> Option<&Visual> {
        self.visual.as_ref()
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn rotation_degrees(&self) -> f32 {
        self.yaw_degrees
    }

    pub fn yaw(&self) -> f32 {
        self.yaw_degrees.to_radians()
    }

    pub fn tilt(&self) -> f32 {
        self.tilt
    }

    pub(crate) fn begin_load(&mut self, id: LoadId, token: CancellationToken) {
        self.cancel_load();
        self.load = Some((id, token));
    }

    pub(crate) fn pending_load(&self) -> Option<LoadId> {
        self.load.as_ref().map(|(id, _)| *id)
    }

    pub(crate) fn finish_load(&mut self) {
        self.load = None;
    }

    pub(crate) fn cancel_load(&mut self) {
        if let Some((id, token)) = self.load.take() {
            log::trace!("Cancelling flower image load {:?}", id);
            token.cancel();
        }
    }

    /// Builds the quad for a decoded image of `width` × `height` pixels.
    /// Degenerate dimensions fall back to a square.
    pub fn attach_image(&mut self, width: u32, height: u32) -> &Visual {
        let aspect = if width > 0 && height > 0 {
            width as f32 / height as f32
        } else {
            1.0
        };
        let mesh = Arc::new(TriMesh::quad(FLOWER_SIZE, FLOWER_SIZE / aspect));
        let mut visual = Visual::new(NodeKind::Flower, Some(mesh), self.transform());
        visual.highlighted = self.selected;
        self.visual.insert(visual)
    }

    /// Returns whether the flag changed.
    pub fn set_selected(&mut self, selected: bool) -> bool {
        if self.selected == selected {
            return false;
        }
        self.selected = selected;
        if let Some(visual) = &mut self.visual {
            visual.highlighted = selected;
        }
        true
    }

    /// Out-of-range values, infinities included, are clamped. NaN is ignored.
    pub fn set_scale(&mut self, scale: f32) {
        if scale.is_nan() {
            log::debug!("Ignoring NaN flower scale");
            return;
        }
        self.scale = scale.clamp(MIN_SCALE, MAX_SCALE);
        self.sync_transform();
    }

    pub fn set_rotation_degrees(&mut self, degrees: f32) {
        if !degrees.is_finite() {
            log::debug!("Ignoring non-finite flower rotation {}", degrees);
            return;
        }
        let wrapped = degrees.rem_euclid(360.0);
        // rem_euclid can round up to exactly 360 for tiny negative inputs.
        self.yaw_degrees = if wrapped >= 360.0 { 0.0 } else { wrapped };
        self.sync_transform();
    }

    /// Idle sway. `time_ms` is absolute elapsed time.
    pub fn update(&mut self, time_ms: f64) {
        let phase = time_ms * SWAY_RATE as f64 + (self.base_position.x * SWAY_PHASE) as f64;
        self.tilt = phase.sin() as f32 * SWAY_AMPLITUDE;
        self.sync_transform();
    }

    pub fn transform(&self) -> Mat4 {
        Mat4::from_translation(self.base_position)
            * Mat4::from_quat(Quat::from_rotation_y(self.yaw()))
            * Mat4::from_quat(Quat::from_rotation_z(self.tilt))
            * Mat4::from_scale(Vec3::splat(self.scale))
    }

    fn sync_transform(&mut self) {
        let transform = self.transform();
        if let Some(visual) = &mut self.visual {
            visual.transform = transform;
        }
    }
}

impl Raycast for Flower {
    fn raycast(&self, ray: &Ray, _recursive: bool) -> Option<Hit> {
        let visual = self.visual.as_ref()?;
        let mesh = visual.mesh.as_ref()?;
        raycast_mesh(mesh, visual.transform, ray).map(|(point, normal, distance, _)| Hit {
            point,
            normal,
            distance,
            part: 0,
        })
    }
}
