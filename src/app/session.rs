//! The frame loop without a window: owns every piece of mutable state and is
//! driven by the winit shell (or by tests) through plain method calls.

use super::input::{InputAction, InputState};
use super::timing::FrameTiming;
use crate::assets::{AssetLoader, ImageSource, LoadMode};
use crate::config::Config;
use crate::editor::{ClickOutcome, EditMode, SceneEditor};
use crate::geometry::Raycast;
use crate::locomotion::{CameraRig, CameraStrategy};
use crate::render::{Camera, SceneGraph};
use crate::scene::Scene;
use glam::Vec2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Instant;
use winit::dpi::PhysicalSize;

/// What the shell has to do after an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionResponse {
    Handled,
    ReleasePointer,
    Exit,
}

pub struct Session {
    config: Config,
    scene: Scene,
    editor: SceneEditor,
    rig: CameraRig,
    camera: Camera,
    input: InputState,
    viewport: PhysicalSize<u32>,
    timing: FrameTiming,
}

impl Session {
    pub fn new(config: Config, graph: Box<dyn SceneGraph>, viewport: PhysicalSize<u32>, now: Instant) -> Self {
        let rng = match config.assets.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mode = if config.assets.background_loading {
            LoadMode::Background
        } else {
            LoadMode::Inline
        };
        let loader = AssetLoader::new(mode, config.assets.flower_image.clone());

        let mut scene = Scene::new(graph, loader, ImageSource::Default, rng);
        scene.load_terrain(config.terrain.source.clone(), config.terrain.layout());
        if config.terrain.ambient {
            scene.spawn_ambient();
        }

        let camera_config = &config.camera;
        let mut camera = Camera::new(
            camera_config.position,
            camera_config.fov_degrees.to_radians(),
            camera_config.near,
            camera_config.far,
        );
        camera.look_at(camera_config.look_at);
        let rig = CameraRig::install(camera_config.strategy, &camera, config.orbit, config.locomotion);

        let timing = FrameTiming::new(config.window.title.clone(), config.window.max_frame_dt, now);
        Self {
            editor: SceneEditor::new(config.editor.erase_radius),
            config,
            scene,
            rig,
            camera,
            input: InputState::default(),
            viewport,
            timing,
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn editor(&self) -> &SceneEditor {
        &self.editor
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn strategy(&self) -> CameraStrategy {
        self.rig.strategy()
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn viewport(&self) -> PhysicalSize<u32> {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: PhysicalSize<u32>) {
        self.viewport = viewport;
    }

    /// One frame. Returns the simulation step used, in seconds.
    pub fn tick(&mut self, now: Instant) -> f32 {
        let dt = self.timing.update(now);
        let movement = self.input.take_movement();
        let ground = self.scene.terrain().map(|terrain| terrain as &dyn Raycast);
        self.rig.update(dt, &movement, ground, &mut self.camera);

        self.scene.poll_assets();
        self.editor.refresh_hover(self.viewport, &self.camera, &mut self.scene);
        self.scene.animate(self.timing.elapsed_ms(now));
        self.scene.draw(&self.camera);
        dt
    }

    pub fn take_title(&mut self) -> Option<String> {
        self.timing.take_title()
    }

    // Pointer and keyboard

    pub fn pointer_moved(&mut self, position: Vec2) {
        self.input.cursor_moved(position);
        self.editor
            .handle_pointer_move(position, self.viewport, &self.camera, &mut self.scene);
    }

    pub fn mouse_motion(&mut self, delta: Vec2) {
        self.input.mouse_motion(delta);
    }

    pub fn scrolled(&mut self, notches: f32) {
        self.input.scrolled(notches);
    }

    pub fn pointer_pressed(&mut self) {
        self.input.left_pressed();
    }

    /// A release close to its press is a click; anything else was a drag.
    pub fn pointer_released(&mut self) -> ClickOutcome {
        match self.input.left_released(self.config.editor.click_slop) {
            Some(position) => self.click(position),
            None => ClickOutcome::Nothing,
        }
    }

    pub fn click(&mut self, position: Vec2) -> ClickOutcome {
        let outcome = self
            .editor
            .handle_click(position, self.viewport, &self.camera, &mut self.scene);
        if let ClickOutcome::Selected(handle) = &outcome {
            log::info!(
                "Selected flower: scale {:.1}, rotation {:.0}°",
                handle.scale,
                handle.rotation_degrees
            );
        }
        outcome
    }

    pub fn key(&mut self, key: winit::keyboard::PhysicalKey, pressed: bool) -> Option<InputAction> {
        self.input.handle_key(key, pressed)
    }

    pub fn focus_lost(&mut self) {
        self.input.release_all();
    }

    /// Pointer lock is wanted by walk mode until granted.
    pub fn wants_pointer_lock(&self) -> bool {
        self.rig.wants_pointer_lock() && !self.input.pointer_locked
    }

    pub fn set_pointer_locked(&mut self, locked: bool) {
        self.input.pointer_locked = locked;
    }

    pub fn apply(&mut self, action: InputAction) -> ActionResponse {
        match action {
            InputAction::ToggleMode(mode) => {
                self.editor.toggle_mode(mode, &mut self.scene);
                self.resume_hover();
            }
            InputAction::ClearMode => self.editor.reset(&mut self.scene),
            InputAction::SwitchCamera => {
                self.switch_camera();
                return ActionResponse::ReleasePointer;
            }
            InputAction::ScaleSelection(sign) => {
                if let Some(handle) = self.editor.selection_handle(&self.scene) {
                    let target = handle.scale + sign * self.config.editor.scale_step;
                    if let Err(err) = self.editor.set_selected_scale(&handle, target, &mut self.scene) {
                        log::debug!("Scale ignored: {}", err);
                    }
                }
            }
            InputAction::RotateSelection(sign) => {
                if let Some(handle) = self.editor.selection_handle(&self.scene) {
                    let target = handle.rotation_degrees + sign * self.config.editor.rotate_step;
                    if let Err(err) = self.editor.set_selected_rotation(&handle, target, &mut self.scene) {
                        log::debug!("Rotation ignored: {}", err);
                    }
                }
            }
            InputAction::Escape => {
                if self.input.pointer_locked {
                    self.input.pointer_locked = false;
                    return ActionResponse::ReleasePointer;
                }
                if self.editor.mode() != EditMode::None {
                    self.editor.reset(&mut self.scene);
                    return ActionResponse::Handled;
                }
                return ActionResponse::Exit;
            }
        }
        ActionResponse::Handled
    }

    /// Re-casts the cursor right after a mode change so the hover disc shows
    /// without waiting for the pointer to move.
    fn resume_hover(&mut self) {
        if let Some(cursor) = self.input.cursor {
            self.editor
                .handle_pointer_move(cursor, self.viewport, &self.camera, &mut self.scene);
        }
    }

    /// Replaces the camera rig with the other strategy, starting from the
    /// current camera pose.
    pub fn switch_camera(&mut self) {
        let strategy = self.rig.strategy().other();
        self.rig = CameraRig::install(strategy, &self.camera, self.config.orbit, self.config.locomotion);
        self.input.pointer_locked = false;
    }

    pub fn teardown(&mut self) {
        self.editor.reset(&mut self.scene);
        self.scene.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessRenderer;
    use std::time::Duration;
    use winit::keyboard::{KeyCode, PhysicalKey};

    const VIEWPORT: PhysicalSize<u32> = PhysicalSize::new(800, 600);

    fn config() -> Config {
        let mut config = Config::default();
        config.assets.background_loading = false;
        config.assets.seed = Some(9);
        config.assets.flower_image = "no/such/flower.png".into();
        config
    }

    fn session(config: Config) -> (Session, Instant) {
        let start = Instant::now();
        let mut session = Session::new(config, Box::new(HeadlessRenderer::new()), VIEWPORT, start);
        session.tick(start);
        (session, start)
    }

    fn centre() -> Vec2 {
        Vec2::new(VIEWPORT.width as f32 / 2.0, VIEWPORT.height as f32 / 2.0)
    }

    #[test]
    fn first_tick_applies_terrain() {
        let (session, _) = session(config());
        assert!(session.scene().terrain().is_some());
        assert!(session.scene().ambient().is_some());
    }

    #[test]
    fn frame_step_is_clamped() {
        let (mut session, start) = session(config());
        assert_eq!(session.tick(start + Duration::from_secs(2)), 0.1);
    }

    #[test]
    fn add_mode_click_plants_a_flower() {
        let (mut session, start) = session(config());
        let action = session.key(PhysicalKey::Code(KeyCode::Digit1), true).unwrap();
        assert_eq!(session.apply(action), ActionResponse::Handled);
        assert_eq!(session.editor().mode(), EditMode::Add);

        session.pointer_moved(centre());
        assert!(session.scene().hover().is_visible());

        session.pointer_pressed();
        let outcome = session.pointer_released();
        assert!(matches!(outcome, ClickOutcome::Added(_)));
        session.tick(start + Duration::from_millis(16));
        let (_, flower) = session.scene().flowers().next().unwrap();
        assert!(flower.is_loaded());
    }

    #[test]
    fn drag_is_not_a_click() {
        let (mut session, _) = session(config());
        session.apply(InputAction::ToggleMode(EditMode::Add));
        session.pointer_moved(centre());
        session.pointer_pressed();
        session.pointer_moved(centre() + Vec2::new(60.0, 0.0));
        assert_eq!(session.pointer_released(), ClickOutcome::Nothing);
        assert_eq!(session.scene().flower_count(), 0);
    }

    #[test]
    fn switching_camera_releases_pointer() {
        let (mut session, _) = session(config());
        assert_eq!(session.strategy(), CameraStrategy::Orbit);
        assert!(!session.wants_pointer_lock());
        assert_eq!(session.apply(InputAction::SwitchCamera), ActionResponse::ReleasePointer);
        assert_eq!(session.strategy(), CameraStrategy::FirstPerson);
        assert!(session.wants_pointer_lock());
        session.set_pointer_locked(true);
        assert!(!session.wants_pointer_lock());
        session.switch_camera();
        assert!(!session.input().pointer_locked);
    }

    #[test]
    fn escape_releases_then_clears_then_exits() {
        let (mut session, _) = session(config());
        session.switch_camera();
        session.set_pointer_locked(true);
        session.apply(InputAction::ToggleMode(EditMode::Erase));
        assert_eq!(session.apply(InputAction::Escape), ActionResponse::ReleasePointer);
        assert_eq!(session.apply(InputAction::Escape), ActionResponse::Handled);
        assert_eq!(session.editor().mode(), EditMode::None);
        assert_eq!(session.apply(InputAction::Escape), ActionResponse::Exit);
    }

    #[test]
    fn first_person_settles_on_terrain() {
        let mut config = config();
        config.camera.strategy = CameraStrategy::FirstPerson;
        let (mut session, start) = session(config);
        for frame in 1..=120 {
            session.tick(start + Duration::from_millis(frame * 16));
        }
        let camera = *session.camera();
        let ground = session
            .scene()
            .raycast_terrain(&crate::geometry::ground_ray(camera.position, 10.0, 100.0))
            .unwrap();
        assert!((camera.position.y - ground.point.y - 1.6).abs() < 0.05);
    }

    #[test]
    fn teardown_resets_mode_and_releases_nodes() {
        let (mut session, _) = session(config());
        session.apply(InputAction::ToggleMode(EditMode::Add));
        session.click(centre());
        session.teardown();
        assert_eq!(session.editor().mode(), EditMode::None);
        assert_eq!(session.scene().graph().node_count(), 0);
    }
}
