use super::CameraMovement;
use crate::render::Camera;
use glam::Vec3;
use serde::Deserialize;
use std::f32::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct OrbitSettings {
    pub target: Vec3,
    pub max_polar: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Fraction of the pending rotation applied per update.
    pub damping: f32,
    /// Radians of orbit per pixel of drag.
    pub rotate_speed: f32,
    /// Distance multiplier per scroll notch towards the target.
    pub zoom_step: f32,
}

impl Default for OrbitSettings {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            max_polar: PI / 2.2,
            min_distance: 1.0,
            max_distance: 15.0,
            damping: 0.05,
            rotate_speed: 0.005,
            zoom_step: 0.95,
        }
    }
}

/// Polar angles below this would put the camera exactly on the pole.
const MIN_POLAR: f32 = 1e-4;

/// Damped orbit around a fixed target. Drag rotates, scroll zooms, no pan.
#[derive(Debug, Clone)]
pub struct OrbitController {
    settings: OrbitSettings,
    azimuth: f32,
    polar: f32,
    distance: f32,
    azimuth_velocity: f32,
    polar_velocity: f32,
}

impl OrbitController {
    pub fn new(settings: OrbitSettings, camera: &Camera) -> Self {
        let offset = camera.position - settings.target;
        let distance = offset.length();
        let (azimuth, polar) = if distance > f32::EPSILON {
            (offset.x.atan2(offset.z), (offset.y / distance).clamp(-1.0, 1.0).acos())
        } else {
            (0.0, settings.max_polar)
        };
        Self {
            settings,
            azimuth,
            polar,
            distance,
            azimuth_velocity: 0.0,
            polar_velocity: 0.0,
        }
    }

    pub fn settings(&self) -> &OrbitSettings {
        &self.settings
    }

    pub fn polar(&self) -> f32 {
        self.polar
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    /// Damping is applied per call, so the glide length depends on the frame
    /// rate.
    pub fn update(&mut self, input: &CameraMovement, camera: &mut Camera) {
        let s = self.settings;
        self.azimuth_velocity -= input.drag_delta.x * s.rotate_speed;
        self.polar_velocity -= input.drag_delta.y * s.rotate_speed;
        if input.zoom != 0.0 {
            self.distance *= s.zoom_step.powf(input.zoom);
        }

        self.azimuth += self.azimuth_velocity * s.damping;
        self.polar += self.polar_velocity * s.damping;
        self.azimuth_velocity *= 1.0 - s.damping;
        self.polar_velocity *= 1.0 - s.damping;

        self.polar = self.polar.clamp(MIN_POLAR, s.max_polar.max(MIN_POLAR));
        self.distance = self
            .distance
            .clamp(s.min_distance, s.max_distance.max(s.min_distance));

        let (sin_polar, cos_polar) = self.polar.sin_cos();
        let offset = Vec3::new(
            sin_polar * self.azimuth.sin(),
            cos_polar,
            sin_polar * self.azimuth.cos(),
        ) * self.distance;
        camera.position = s.target + offset;
        camera.look_at(s.target);
    }
}
