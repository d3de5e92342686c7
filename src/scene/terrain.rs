//! Walkable ground: a compound height-field mesh split into square tiles.

use crate::geometry::{Hit, MeshGroup, MeshPart, Ray, Raycast, TriMesh};
use crate::render::{NodeKind, Visual};
use glam::{Mat4, Vec2, Vec3};
use image::GrayImage;
use serde::Deserialize;
use std::path::PathBuf;

/// Where the terrain geometry comes from.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerrainSource {
    /// Analytic rolling hills.
    Procedural {
        size: f32,
        resolution: u32,
        amplitude: f32,
    },
    /// Grayscale image; white is `height`, black is zero.
    Heightmap {
        path: PathBuf,
        size: f32,
        #[serde(default = "default_heightmap_resolution")]
        resolution: u32,
        height: f32,
    },
}

fn default_heightmap_resolution() -> u32 {
    128
}

impl Default for TerrainSource {
    fn default() -> Self {
        Self::Procedural {
            size: 20.0,
            resolution: 96,
            amplitude: 0.6,
        }
    }
}

/// Layout shared by every terrain source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainLayout {
    /// Tiles per side; each tile becomes one part of the compound mesh.
    pub tiles: u32,
    /// Root scale applied to the whole model.
    pub scale: Vec3,
}

impl Default for TerrainLayout {
    fn default() -> Self {
        Self {
            tiles: 2,
            scale: Vec3::new(1.2, 1.2, 1.6),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Terrain {
    group: MeshGroup,
}

impl Terrain {
    pub fn new(group: MeshGroup) -> Self {
        Self { group }
    }

    pub fn procedural(size: f32, resolution: u32, amplitude: f32, layout: TerrainLayout) -> Self {
        Self::tiled(size, resolution, layout, |x, z| rolling_hills(x, z, amplitude))
    }

    pub fn from_heightmap(
        image: &GrayImage,
        size: f32,
        resolution: u32,
        height: f32,
        layout: TerrainLayout,
    ) -> Self {
        let half = size * 0.5;
        Self::tiled(size, resolution, layout, |x, z| {
            let u = ((x + half) / size).clamp(0.0, 1.0);
            let v = ((z + half) / size).clamp(0.0, 1.0);
            sample_bilinear(image, u, v) * height
        })
    }

    fn tiled(size: f32, resolution: u32, layout: TerrainLayout, height: impl Fn(f32, f32) -> f32) -> Self {
        let tiles = layout.tiles.max(1);
        let tile_size = size / tiles as f32;
        let cells_per_tile = (resolution / tiles).max(1);
        let origin = Vec2::splat(-size * 0.5);

        let mut parts = Vec::with_capacity((tiles * tiles) as usize);
        for tz in 0..tiles {
            for tx in 0..tiles {
                let min = origin + Vec2::new(tx as f32, tz as f32) * tile_size;
                let max = min + Vec2::splat(tile_size);
                let mesh = TriMesh::grid(min, max, cells_per_tile, &height);
                parts.push(MeshPart::new(mesh, Mat4::IDENTITY));
            }
        }
        Self::new(MeshGroup::new(parts, Mat4::from_scale(layout.scale)))
    }

    pub fn group(&self) -> &MeshGroup {
        &self.group
    }

    /// One visual per tile.
    pub fn visuals(&self) -> Vec<Visual> {
        self.group
            .parts()
            .iter()
            .enumerate()
            .filter_map(|(index, part)| {
                let transform = self.group.part_world_transform(index)?;
                Some(
                    Visual::new(NodeKind::Terrain, Some(part.mesh.clone()), transform)
                        .with_color([0.55, 0.75, 0.45, 1.0]),
                )
            })
            .collect()
    }
}

impl Raycast for Terrain {
    fn raycast(&self, ray: &Ray, recursive: bool) -> Option<Hit> {
        self.group.raycast(ray, recursive)
    }
}

fn rolling_hills(x: f32, z: f32, amplitude: f32) -> f32 {
    let broad = (x * 0.35).sin() * (z * 0.3).cos();
    let detail = (x * 0.9 + z * 0.7).sin() * 0.35;
    amplitude * (broad + detail)
}

/// Bilinear sample at normalised coordinates, in `[0, 1]`.
fn sample_bilinear(image: &GrayImage, u: f32, v: f32) -> f32 {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return 0.0;
    }
    let px = u * (width - 1) as f32;
    let pz = v * (height - 1) as f32;
    let x0 = px.floor() as u32;
    let z0 = pz.floor() as u32;
    let x1 = (x0 + 1).min(width - 1);
    let z1 = (z0 + 1).min(height - 1);
    let wx = px - x0 as f32;
    let wz = pz - z0 as f32;

    let sample = |x: u32, z: u32| image.get_pixel(x, z).0[0] as f32 / 255.0;
    let top = sample(x0, z0) * (1.0 - wx) + sample(x1, z0) * wx;
    let bottom = sample(x0, z1) * (1.0 - wx) + sample(x1, z1) * wx;
    top * (1.0 - wz) + bottom * wz
}
