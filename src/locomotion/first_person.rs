use super::CameraMovement;
use crate::geometry::{ground_ray, Raycast, WORLD_UP};
use crate::render::Camera;
use glam::Vec3;
use serde::Deserialize;
use std::f32::consts::FRAC_PI_2;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct FirstPersonSettings {
    pub eye_height: f32,
    pub gravity: f32,
    /// Metres per second.
    pub move_speed: f32,
    /// Largest gap between eye height and ground that still snaps.
    pub ground_snap: f32,
    pub max_slope_degrees: f32,
    pub probe_lift: f32,
    pub probe_distance: f32,
    /// Radians per pixel of mouse motion.
    pub mouse_sensitivity: f32,
    /// Radians per second for keyboard look.
    pub aim_speed: f32,
}

impl Default for FirstPersonSettings {
    fn default() -> Self {
        Self {
            eye_height: 1.6,
            gravity: 18.0,
            move_speed: 3.0,
            ground_snap: 0.6,
            max_slope_degrees: 50.0,
            probe_lift: 10.0,
            probe_distance: 100.0,
            mouse_sensitivity: 0.002,
            aim_speed: 1.8,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LocomotionState {
    pub vertical_velocity: f32,
    pub grounded: bool,
    pub yaw: f32,
    pub pitch: f32,
}

/// Walk mode: mouse/arrow look, WASD on the ground plane, gravity and
/// slope-aware snapping to the terrain.
#[derive(Debug, Clone)]
pub struct FirstPersonController {
    state: LocomotionState,
    settings: FirstPersonSettings,
}

impl FirstPersonController {
    /// Starts at the camera's current pose, airborne and at rest.
    pub fn new(settings: FirstPersonSettings, camera: &Camera) -> Self {
        let (yaw, pitch) = camera.yaw_pitch();
        Self {
            state: LocomotionState {
                vertical_velocity: 0.0,
                grounded: false,
                yaw,
                pitch: pitch.clamp(-FRAC_PI_2, FRAC_PI_2),
            },
            settings,
        }
    }

    pub fn state(&self) -> &LocomotionState {
        &self.state
    }

    pub fn settings(&self) -> &FirstPersonSettings {
        &self.settings
    }

    pub fn update(
        &mut self,
        dt: f32,
        input: &CameraMovement,
        ground: Option<&dyn Raycast>,
        camera: &mut Camera,
    ) {
        self.look(dt, input, camera);

        let mut position = camera.position + self.horizontal_step(dt, input, camera);

        if !self.state.grounded {
            self.state.vertical_velocity -= self.settings.gravity * dt;
        }
        position.y += self.state.vertical_velocity * dt;

        self.settle(&mut position, ground);
        camera.position = position;
    }

    fn look(&mut self, dt: f32, input: &CameraMovement, camera: &mut Camera) {
        if input.pointer_locked {
            self.state.yaw -= input.look_delta.x * self.settings.mouse_sensitivity;
            self.state.pitch -= input.look_delta.y * self.settings.mouse_sensitivity;
        }

        let aim = self.settings.aim_speed * dt;
        if input.aim_left {
            self.state.yaw += aim;
        }
        if input.aim_right {
            self.state.yaw -= aim;
        }
        if input.aim_up {
            self.state.pitch += aim;
        }
        if input.aim_down {
            self.state.pitch -= aim;
        }

        self.state.pitch = self.state.pitch.clamp(-FRAC_PI_2, FRAC_PI_2);
        camera.set_yaw_pitch(self.state.yaw, self.state.pitch);
    }

    fn horizontal_step(&self, dt: f32, input: &CameraMovement, camera: &Camera) -> Vec3 {
        let look = camera.forward();
        let forward = Vec3::new(look.x, 0.0, look.z)
            .try_normalize()
            .unwrap_or(Vec3::NEG_Z);
        let right = forward.cross(WORLD_UP);

        let mut intent = Vec3::ZERO;
        if input.move_forward {
            intent += forward;
        }
        if input.move_backward {
            intent -= forward;
        }
        if input.move_right {
            intent += right;
        }
        if input.move_left {
            intent -= right;
        }
        intent.try_normalize().unwrap_or(Vec3::ZERO) * self.settings.move_speed * dt
    }

    /// Ground contact for a tentative eye position.
    fn settle(&mut self, position: &mut Vec3, ground: Option<&dyn Raycast>) {
        let probe = ground_ray(*position, self.settings.probe_lift, self.settings.probe_distance);
        let Some(hit) = ground.and_then(|ground| ground.raycast(&probe, true)) else {
            self.state.grounded = false;
            return;
        };

        let eye = self.settings.eye_height;
        let walkable = hit.normal.dot(WORLD_UP) >= self.settings.max_slope_degrees.to_radians().cos();
        let height_over_ground = position.y - hit.point.y;

        if walkable && (height_over_ground - eye).abs() <= self.settings.ground_snap {
            position.y = hit.point.y + eye;
            self.state.vertical_velocity = 0.0;
            self.state.grounded = true;
        } else if height_over_ground < eye {
            // Sunk below eye height, e.g. after a fast fall: always push back up.
            position.y = hit.point.y + eye;
            self.state.vertical_velocity = 0.0;
            self.state.grounded = walkable;
        } else {
            self.state.grounded = false;
        }
    }
}
