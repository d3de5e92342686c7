//! Ray construction and ray/mesh hit-testing.
//!
//! Everything the editor and the locomotion controller know about the world
//! comes through [`Raycast`]: a pointer position becomes a [`Ray`] via
//! [`screen_to_ray`], a candidate foot position becomes one via
//! [`ground_ray`], and the nearest [`Hit`] carries the world-space point and
//! surface normal.

mod mesh;

pub use mesh::{raycast_mesh, Aabb, MeshGroup, MeshPart, TriMesh};

use crate::render::Camera;
use glam::{Vec2, Vec3, Vec4};
use winit::dpi::PhysicalSize;

pub const WORLD_UP: Vec3 = Vec3::Y;

/// Substituted whenever a direction collapses to zero length.
pub const DEFAULT_DIRECTION: Vec3 = Vec3::NEG_Z;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Always unit length.
    pub direction: Vec3,
    pub max_distance: f32,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3, max_distance: f32) -> Self {
        Self {
            origin,
            direction: direction.try_normalize().unwrap_or(DEFAULT_DIRECTION),
            max_distance,
        }
    }

    pub fn at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub point: Vec3,
    /// World-space unit normal of the intersected face.
    pub normal: Vec3,
    pub distance: f32,
    /// Index of the intersected part within a compound target.
    pub part: usize,
}

pub trait Raycast {
    /// Nearest intersection along `ray`. `recursive` extends the search from
    /// the target's own geometry to all of its sub-meshes.
    fn raycast(&self, ray: &Ray, recursive: bool) -> Option<Hit>;
}

/// An absent target never reports a hit.
impl<T: Raycast> Raycast for Option<T> {
    fn raycast(&self, ray: &Ray, recursive: bool) -> Option<Hit> {
        self.as_ref().and_then(|target| target.raycast(ray, recursive))
    }
}

/// Maps a pixel position (top-left origin) to a world-space ray leaving the
/// camera. Returns `None` for an empty viewport.
pub fn screen_to_ray(screen: Vec2, viewport: PhysicalSize<u32>, camera: &Camera) -> Option<Ray> {
    if viewport.width == 0 || viewport.height == 0 {
        return None;
    }
    let ndc_x = (2.0 * screen.x / viewport.width as f32) - 1.0;
    let ndc_y = 1.0 - (2.0 * screen.y / viewport.height as f32);
    let inv_view_proj = camera.view_projection(viewport).inverse();
    let far = inv_view_proj * Vec4::new(ndc_x, ndc_y, 1.0, 1.0);
    if far.w.abs() < f32::EPSILON {
        return None;
    }
    let direction = far.truncate() / far.w - camera.position;
    Some(Ray::new(camera.position, direction, camera.far))
}

/// Downward ray starting `lift` above `position`, so a probe taken on a slope
/// does not begin inside the surface.
pub fn ground_ray(position: Vec3, lift: f32, max_distance: f32) -> Ray {
    Ray::new(position + WORLD_UP * lift, -WORLD_UP, max_distance)
}
