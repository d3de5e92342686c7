use glam::{EulerRot, Mat4, Quat, Vec3};
use winit::dpi::PhysicalSize;

/// Perspective camera. Orientation is kept as yaw (about +Y) then pitch
/// (about the yawed +X) with no roll; the camera looks down its local -Z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub orientation: Quat,
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn new(position: Vec3, fov_y_radians: f32, near: f32, far: f32) -> Self {
        Self {
            position,
            orientation: Quat::IDENTITY,
            fov_y_radians,
            near,
            far,
        }
    }

    pub fn look_at(&mut self, target: Vec3) {
        let (yaw, pitch) = forward_to_yaw_pitch(target - self.position);
        self.set_yaw_pitch(yaw, pitch);
    }

    pub fn set_yaw_pitch(&mut self, yaw: f32, pitch: f32) {
        self.orientation = Quat::from_euler(EulerRot::YXZ, yaw, pitch, 0.0);
    }

    pub fn yaw_pitch(&self) -> (f32, f32) {
        forward_to_yaw_pitch(self.forward())
    }

    pub fn forward(&self) -> Vec3 {
        self.orientation * Vec3::NEG_Z
    }

    pub fn right(&self) -> Vec3 {
        self.orientation * Vec3::X
    }

    pub fn up(&self) -> Vec3 {
        self.orientation * Vec3::Y
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.position).inverse()
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov_y_radians, aspect.max(0.0001), self.near, self.far)
    }

    pub fn view_projection(&self, viewport: PhysicalSize<u32>) -> Mat4 {
        let aspect = if viewport.height > 0 {
            viewport.width as f32 / viewport.height as f32
        } else {
            1.0
        };
        self.projection_matrix(aspect) * self.view_matrix()
    }
}

/// Yaw/pitch for the YXZ convention above. A zero vector maps to (0, 0).
pub fn forward_to_yaw_pitch(forward: Vec3) -> (f32, f32) {
    let Some(dir) = forward.try_normalize() else {
        return (0.0, 0.0);
    };
    let yaw = (-dir.x).atan2(-dir.z);
    let pitch = dir.y.clamp(-1.0, 1.0).asin();
    (yaw, pitch)
}
