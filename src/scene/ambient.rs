//! Background decoration: a ring of clouds, a slowly drifting cloud layer and
//! an animated sun sprite. Everything is driven from absolute elapsed time so
//! the animation does not depend on the frame rate.

use crate::render::{NodeId, NodeKind, Visual};
use glam::{Mat4, Quat, Vec3};
use rand::Rng;
use std::f32::consts::TAU;

pub const CLOUD_RADIUS: f32 = 15.0;
pub const STATIC_CLOUDS: usize = 10;
pub const DRIFTING_CLOUDS: usize = 30;
const STATIC_CLOUD_HEIGHT: f32 = 3.0;
const STATIC_CLOUD_SCALE: f32 = 3.0;
/// Clockwise, 0.0003 rad per frame at 60 Hz.
pub const DRIFT_RATE: f32 = 0.018;

pub const SUN_FRAMES: u32 = 3;
pub const SUN_FRAME_MS: f64 = 300.0;
const SUN_POSITION: Vec3 = Vec3::new(6.0, 10.0, -20.0);
const SUN_SCALE: Vec3 = Vec3::new(5.0, 3.0, 1.0);

#[derive(Debug, Clone)]
struct Cloud {
    node: NodeId,
    visual: Visual,
    initial_angle: f32,
    height: f32,
    scale: f32,
    drifting: bool,
}

impl Cloud {
    fn placement(&self, elapsed_secs: f32) -> Mat4 {
        let angle = if self.drifting {
            self.initial_angle - DRIFT_RATE * elapsed_secs
        } else {
            self.initial_angle
        };
        let position = Vec3::new(
            CLOUD_RADIUS * angle.cos(),
            self.height,
            CLOUD_RADIUS * angle.sin(),
        );
        // Face the vertical axis at the cloud's own height.
        let facing = Quat::from_rotation_y((-position.x).atan2(-position.z));
        Mat4::from_scale_rotation_translation(Vec3::splat(self.scale), facing, position)
    }
}

#[derive(Debug, Clone)]
pub struct Ambient {
    clouds: Vec<Cloud>,
    sun_node: NodeId,
    sun: Visual,
}

impl Ambient {
    /// `allocate` hands out node ids for every decoration, clouds first.
    pub fn new(rng: &mut impl Rng, mut allocate: impl FnMut() -> NodeId) -> Self {
        let total = STATIC_CLOUDS + DRIFTING_CLOUDS;
        let mut clouds = Vec::with_capacity(total);
        for index in 0..total {
            let drifting = index >= STATIC_CLOUDS;
            let (initial_angle, height, scale) = if drifting {
                (
                    index as f32 / total as f32 * TAU,
                    8.0 + rng.gen::<f32>() * 20.0,
                    0.5 + rng.gen::<f32>() * 0.1,
                )
            } else {
                (
                    index as f32 / STATIC_CLOUDS as f32 * TAU,
                    STATIC_CLOUD_HEIGHT,
                    STATIC_CLOUD_SCALE,
                )
            };
            let mut cloud = Cloud {
                node: allocate(),
                visual: Visual::new(NodeKind::Cloud, None, Mat4::IDENTITY),
                initial_angle,
                height,
                scale,
                drifting,
            };
            cloud.visual.transform = cloud.placement(0.0);
            clouds.push(cloud);
        }

        let sun = Visual::new(
            NodeKind::Sun,
            None,
            Mat4::from_scale_rotation_translation(SUN_SCALE, Quat::IDENTITY, SUN_POSITION),
        );
        Self {
            clouds,
            sun_node: allocate(),
            sun,
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Visual)> {
        self.clouds
            .iter()
            .map(|cloud| (cloud.node, &cloud.visual))
            .chain(std::iter::once((self.sun_node, &self.sun)))
    }

    pub fn sun_frame(&self) -> u32 {
        self.sun.frame
    }

    /// Advances to `elapsed_ms` and reports the nodes whose visual changed.
    pub fn animate(&mut self, elapsed_ms: f64) -> Vec<(NodeId, &Visual)> {
        let elapsed_secs = (elapsed_ms / 1000.0) as f32;
        let frame = ((elapsed_ms.max(0.0) / SUN_FRAME_MS) as u64 % SUN_FRAMES as u64) as u32;
        let sun_changed = self.sun.frame != frame;
        self.sun.frame = frame;

        let mut changed = Vec::with_capacity(DRIFTING_CLOUDS + 1);
        for cloud in self.clouds.iter_mut().filter(|cloud| cloud.drifting) {
            cloud.visual.transform = cloud.placement(elapsed_secs);
            changed.push((cloud.node, &cloud.visual));
        }
        if sun_changed {
            changed.push((self.sun_node, &self.sun));
        }
        changed
    }
}
