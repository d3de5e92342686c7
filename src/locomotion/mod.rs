//! Camera locomotion: a damped orbit and a first-person walk mode.

pub mod first_person;
pub mod orbit;

pub use first_person::{FirstPersonController, FirstPersonSettings, LocomotionState};
pub use orbit::{OrbitController, OrbitSettings};

use crate::geometry::Raycast;
use crate::render::Camera;
use glam::Vec2;
use serde::Deserialize;

/// One frame of movement intent, sampled from the input state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraMovement {
    pub move_forward: bool,
    pub move_backward: bool,
    pub move_left: bool,
    pub move_right: bool,
    pub aim_left: bool,
    pub aim_right: bool,
    pub aim_up: bool,
    pub aim_down: bool,
    /// Raw mouse motion since the last frame, in pixels.
    pub look_delta: Vec2,
    pub pointer_locked: bool,
    /// Left-button drag since the last frame, in pixels.
    pub drag_delta: Vec2,
    /// Scroll notches; positive zooms in.
    pub zoom: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraStrategy {
    #[default]
    Orbit,
    FirstPerson,
}

impl CameraStrategy {
    pub fn other(self) -> Self {
        match self {
            CameraStrategy::Orbit => CameraStrategy::FirstPerson,
            CameraStrategy::FirstPerson => CameraStrategy::Orbit,
        }
    }
}

/// The active controller. Switching strategy builds a fresh rig; no state
/// carries over except the camera pose itself.
#[derive(Debug, Clone)]
pub enum CameraRig {
    Orbit(OrbitController),
    FirstPerson(FirstPersonController),
}

impl CameraRig {
    pub fn install(
        strategy: CameraStrategy,
        camera: &Camera,
        orbit: OrbitSettings,
        first_person: FirstPersonSettings,
    ) -> Self {
        log::info!("Camera strategy: {:?}", strategy);
        match strategy {
            CameraStrategy::Orbit => CameraRig::Orbit(OrbitController::new(orbit, camera)),
            CameraStrategy::FirstPerson => {
                CameraRig::FirstPerson(FirstPersonController::new(first_person, camera))
            }
        }
    }

    pub fn strategy(&self) -> CameraStrategy {
        match self {
            CameraRig::Orbit(_) => CameraStrategy::Orbit,
            CameraRig::FirstPerson(_) => CameraStrategy::FirstPerson,
        }
    }

    /// Mouse-look only works with the pointer captured.
    pub fn wants_pointer_lock(&self) -> bool {
        matches!(self, CameraRig::FirstPerson(_))
    }

    pub fn update(
        &mut self,
        dt: f32,
        input: &CameraMovement,
        ground: Option<&dyn Raycast>,
        camera: &mut Camera,
    ) {
        match self {
            CameraRig::Orbit(orbit) => orbit.update(input, camera),
            CameraRig::FirstPerson(walker) => walker.update(dt, input, ground, camera),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn switching_rebuilds_controller_state() {
        let mut camera = Camera::new(Vec3::new(0.0, 5.0, 8.0), 1.0, 0.1, 1000.0);
        camera.look_at(Vec3::ZERO);
        let mut rig = CameraRig::install(
            CameraStrategy::FirstPerson,
            &camera,
            OrbitSettings::default(),
            FirstPersonSettings::default(),
        );
        rig.update(0.1, &CameraMovement::default(), None, &mut camera);
        let CameraRig::FirstPerson(walker) = &rig else {
            panic!("expected first person");
        };
        assert!(walker.state().vertical_velocity < 0.0);

        let strategy = rig.strategy().other();
        rig = CameraRig::install(strategy, &camera, OrbitSettings::default(), FirstPersonSettings::default());
        assert_eq!(rig.strategy(), CameraStrategy::Orbit);
        assert!(!rig.wants_pointer_lock());

        rig = CameraRig::install(rig.strategy().other(), &camera, OrbitSettings::default(), FirstPersonSettings::default());
        let CameraRig::FirstPerson(walker) = &rig else {
            panic!("expected first person");
        };
        assert_eq!(walker.state().vertical_velocity, 0.0);
        assert!(!walker.state().grounded);
    }

    #[test]
    fn entering_first_person_keeps_look_direction() {
        let mut camera = Camera::new(Vec3::new(6.0, 2.0, 10.0), 1.0, 0.1, 1000.0);
        camera.look_at(Vec3::new(0.0, 0.0, 1.0));
        let before = camera.forward();
        let mut rig = CameraRig::install(
            CameraStrategy::FirstPerson,
            &camera,
            OrbitSettings::default(),
            FirstPersonSettings::default(),
        );
        rig.update(0.0, &CameraMovement::default(), None, &mut camera);
        assert!(camera.forward().dot(before) > 0.9999);
    }
}
