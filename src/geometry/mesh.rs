use super::{Hit, Ray, Raycast, WORLD_UP};
use glam::{Mat3, Mat4, Vec2, Vec3};
use std::sync::Arc;

/// Axis-aligned bounds in mesh-local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let first = *points.first()?;
        let (min, max) = points
            .iter()
            .fold((first, first), |(min, max), p| (min.min(*p), max.max(*p)));
        Some(Self { min, max })
    }

    /// Slab test. Returns the entry distance along `dir` (or exit distance when
    /// the origin is inside the box).
    pub fn ray_hit(&self, origin: Vec3, dir: Vec3) -> Option<f32> {
        let inv = Vec3::new(
            if dir.x != 0.0 { 1.0 / dir.x } else { f32::INFINITY },
            if dir.y != 0.0 { 1.0 / dir.y } else { f32::INFINITY },
            if dir.z != 0.0 { 1.0 / dir.z } else { f32::INFINITY },
        );
        let t0 = (self.min - origin) * inv;
        let t1 = (self.max - origin) * inv;
        // 0 * inf produces NaN when the origin lies on a slab plane; treat as unbounded.
        let lo = t0.min(t1);
        let hi = t0.max(t1);
        let tmin = [lo.x, lo.y, lo.z]
            .into_iter()
            .filter(|v| !v.is_nan())
            .fold(f32::NEG_INFINITY, f32::max);
        let tmax = [hi.x, hi.y, hi.z]
            .into_iter()
            .filter(|v| !v.is_nan())
            .fold(f32::INFINITY, f32::min);
        if tmax < tmin || tmax < 0.0 {
            return None;
        }
        Some(if tmin >= 0.0 { tmin } else { tmax })
    }
}

/// Indexed triangle mesh used for hit-testing and handed to the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct TriMesh {
    positions: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
    bounds: Option<Aabb>,
}

impl TriMesh {
    pub fn new(positions: Vec<Vec3>, triangles: Vec<[u32; 3]>) -> Self {
        let bounds = Aabb::from_points(&positions);
        Self {
            positions,
            triangles,
            bounds,
        }
    }

    /// Upright quad in the XY plane facing +Z, with its bottom edge centred on
    /// the origin.
    pub fn quad(width: f32, height: f32) -> Self {
        let hw = width * 0.5;
        Self::new(
            vec![
                Vec3::new(-hw, 0.0, 0.0),
                Vec3::new(hw, 0.0, 0.0),
                Vec3::new(hw, height, 0.0),
                Vec3::new(-hw, height, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
    }

    /// Flat disc in the XY plane facing +Z.
    pub fn circle(radius: f32, segments: u32) -> Self {
        let segments = segments.max(3);
        let mut positions = Vec::with_capacity(segments as usize + 1);
        positions.push(Vec3::ZERO);
        for i in 0..segments {
            let angle = i as f32 / segments as f32 * std::f32::consts::TAU;
            positions.push(Vec3::new(angle.cos() * radius, angle.sin() * radius, 0.0));
        }
        let triangles = (0..segments)
            .map(|i| [0, i + 1, (i + 1) % segments + 1])
            .collect();
        Self::new(positions, triangles)
    }

    /// Height-field grid on the XZ plane spanning `min..max`, with
    /// `resolution` cells per side. Triangles are wound so faces point +Y.
    pub fn grid(min: Vec2, max: Vec2, resolution: u32, height: impl Fn(f32, f32) -> f32) -> Self {
        let cells = resolution.max(1);
        let verts_per_side = cells + 1;
        let step = (max - min) / cells as f32;

        let mut positions = Vec::with_capacity((verts_per_side * verts_per_side) as usize);
        for j in 0..verts_per_side {
            for i in 0..verts_per_side {
                let x = min.x + step.x * i as f32;
                let z = min.y + step.y * j as f32;
                positions.push(Vec3::new(x, height(x, z), z));
            }
        }

        let mut triangles = Vec::with_capacity((cells * cells * 2) as usize);
        for j in 0..cells {
            for i in 0..cells {
                let a = j * verts_per_side + i;
                let b = a + 1;
                let c = a + verts_per_side;
                let d = c + 1;
                triangles.push([a, c, b]);
                triangles.push([b, c, d]);
            }
        }
        Self::new(positions, triangles)
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    pub fn bounds(&self) -> Option<Aabb> {
        self.bounds
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    fn corners(&self, triangle: [u32; 3]) -> Option<[Vec3; 3]> {
        Some([
            *self.positions.get(triangle[0] as usize)?,
            *self.positions.get(triangle[1] as usize)?,
            *self.positions.get(triangle[2] as usize)?,
        ])
    }

    /// Geometric normal of triangle `index` in local space.
    pub fn face_normal(&self, index: usize) -> Option<Vec3> {
        let [v0, v1, v2] = self.corners(*self.triangles.get(index)?)?;
        (v1 - v0).cross(v2 - v0).try_normalize()
    }

    /// Nearest intersection in local space. `dir` need not be unit length; the
    /// returned parameter is in units of `dir`.
    pub fn intersect(&self, origin: Vec3, dir: Vec3, max_t: f32) -> Option<(f32, usize)> {
        let bounds = self.bounds?;
        let entry = bounds.ray_hit(origin, dir)?;
        if entry > max_t {
            return None;
        }

        let mut closest: Option<(f32, usize)> = None;
        for (index, triangle) in self.triangles.iter().enumerate() {
            let Some([v0, v1, v2]) = self.corners(*triangle) else {
                continue;
            };
            if let Some(t) = ray_triangle_intersection(origin, dir, v0, v1, v2) {
                if t <= max_t && closest.map_or(true, |(best, _)| t < best) {
                    closest = Some((t, index));
                }
            }
        }
        closest
    }
}

/// Möller–Trumbore ray-triangle intersection, double-sided.
fn ray_triangle_intersection(
    ray_origin: Vec3,
    ray_dir: Vec3,
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
) -> Option<f32> {
    const EPSILON: f32 = 1e-8;

    let edge1 = v1 - v0;
    let edge2 = v2 - v0;

    let h = ray_dir.cross(edge2);
    let a = edge1.dot(h);
    if a.abs() < EPSILON {
        return None;
    }

    let f = 1.0 / a;
    let s = ray_origin - v0;
    let u = f * s.dot(h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = f * ray_dir.dot(q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(q);
    (t > EPSILON).then_some(t)
}

/// Casts `ray` against `mesh` placed in the world by `transform`.
pub fn raycast_mesh(mesh: &TriMesh, transform: Mat4, ray: &Ray) -> Option<(Vec3, Vec3, f32, usize)> {
    if transform.determinant().abs() < f32::EPSILON {
        return None;
    }
    let inverse = transform.inverse();
    // The local direction keeps the world parameterisation, so `t` stays a
    // world-space distance.
    let local_origin = inverse.transform_point3(ray.origin);
    let local_dir = inverse.transform_vector3(ray.direction);
    let (t, triangle) = mesh.intersect(local_origin, local_dir, ray.max_distance)?;

    let point = ray.at(t);
    let normal_matrix = Mat3::from_mat4(transform).inverse().transpose();
    let normal = mesh
        .face_normal(triangle)
        .and_then(|local| (normal_matrix * local).try_normalize())
        .unwrap_or(WORLD_UP);
    Some((point, normal, t, triangle))
}

/// One mesh of a compound model together with its placement.
#[derive(Debug, Clone)]
pub struct MeshPart {
    pub mesh: Arc<TriMesh>,
    pub transform: Mat4,
}

impl MeshPart {
    pub fn new(mesh: TriMesh, transform: Mat4) -> Self {
        Self {
            mesh: Arc::new(mesh),
            transform,
        }
    }
}

impl Raycast for MeshPart {
    fn raycast(&self, ray: &Ray, _recursive: bool) -> Option<Hit> {
        raycast_mesh(&self.mesh, self.transform, ray).map(|(point, normal, distance, _)| Hit {
            point,
            normal,
            distance,
            part: 0,
        })
    }
}

/// Compound mesh: a root transform over any number of parts. Only the first
/// part is the root's own geometry; the rest are children.
#[derive(Debug, Clone)]
pub struct MeshGroup {
    parts: Vec<MeshPart>,
    transform: Mat4,
}

impl MeshGroup {
    pub fn new(parts: Vec<MeshPart>, transform: Mat4) -> Self {
        Self { parts, transform }
    }

    pub fn parts(&self) -> &[MeshPart] {
        &self.parts
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    pub fn part_world_transform(&self, index: usize) -> Option<Mat4> {
        self.parts.get(index).map(|part| self.transform * part.transform)
    }
}

impl Raycast for MeshGroup {
    fn raycast(&self, ray: &Ray, recursive: bool) -> Option<Hit> {
        let searched = if recursive { self.parts.len() } else { 1 };
        self.parts
            .iter()
            .take(searched)
            .enumerate()
            .filter_map(|(index, part)| {
                raycast_mesh(&part.mesh, self.transform * part.transform, ray).map(
                    |(point, normal, distance, _)| Hit {
                        point,
                        normal,
                        distance,
                        part: index,
                    },
                )
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}
