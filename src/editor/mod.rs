//! Pointer-driven editing: planting, erasing and picking flowers.
//!
//! The editor owns the edit-mode toggles and the selection. Scene state stays
//! in [`Scene`]; every operation borrows it for the duration of the call.

pub mod mode;
pub mod selection;

pub use mode::{EditMode, EditModes, ModeTransition};
pub use selection::{SelectionError, SelectionHandle};

use crate::geometry::screen_to_ray;
use crate::render::Camera;
use crate::scene::{FlowerKey, Scene};
use glam::Vec2;
use selection::Selection;
use winit::dpi::PhysicalSize;

/// Horizontal reach of an erase click.
pub const ERASE_RADIUS: f32 = 0.1;

/// Result of a click, so callers can react without re-querying the scene.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    Nothing,
    Added(FlowerKey),
    Erased(Vec<FlowerKey>),
    Selected(SelectionHandle),
}

/// Pointer routing for the active mode. Exists only while a mode other than
/// `None` is active.
#[derive(Debug, Clone, Copy)]
struct EditSession {
    mode: EditMode,
    pointer: Option<Vec2>,
}

#[derive(Debug)]
pub struct SceneEditor {
    modes: EditModes,
    session: Option<EditSession>,
    selection: Selection,
    erase_radius: f32,
}

impl Default for SceneEditor {
    fn default() -> Self {
        Self::new(ERASE_RADIUS)
    }
}

impl SceneEditor {
    pub fn new(erase_radius: f32) -> Self {
        Self {
            modes: EditModes::default(),
            session: None,
            selection: Selection::default(),
            erase_radius,
        }
    }

    pub fn mode(&self) -> EditMode {
        self.modes.current()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn selected(&self) -> Option<FlowerKey> {
        self.selection.key()
    }

    pub fn set_mode(&mut self, mode: EditMode, enabled: bool, scene: &mut Scene) -> ModeTransition {
        let transition = self.modes.set(mode, enabled);
        self.apply_transition(transition, scene);
        transition
    }

    pub fn enable_mode(&mut self, mode: EditMode, scene: &mut Scene) -> ModeTransition {
        self.set_mode(mode, true, scene)
    }

    pub fn toggle_mode(&mut self, mode: EditMode, scene: &mut Scene) -> ModeTransition {
        let transition = self.modes.toggle(mode);
        self.apply_transition(transition, scene);
        transition
    }

    /// Back to `None` with nothing selected.
    pub fn reset(&mut self, scene: &mut Scene) {
        self.enable_mode(EditMode::None, scene);
    }

    fn apply_transition(&mut self, transition: ModeTransition, scene: &mut Scene) {
        if !transition.changed() {
            return;
        }
        log::debug!("Edit mode {:?} -> {:?}", transition.from, transition.to);

        if transition.left(EditMode::Resize) || transition.entered(EditMode::Resize) {
            self.clear_selection(scene);
        }
        if !transition.to.targets_ground() {
            scene.hide_hover();
        }
        if transition.to == EditMode::None {
            scene.clear_selection();
            self.session = None;
        } else {
            let pointer = self.session.and_then(|session| session.pointer);
            self.session = Some(EditSession {
                mode: transition.to,
                pointer,
            });
        }
    }

    fn clear_selection(&mut self, scene: &mut Scene) {
        if let Some(key) = self.selection.clear() {
            scene.set_flower_selected(key, false);
        }
    }

    /// Records the pointer and moves the hover disc under it.
    pub fn handle_pointer_move(
        &mut self,
        screen: Vec2,
        viewport: PhysicalSize<u32>,
        camera: &Camera,
        scene: &mut Scene,
    ) {
        let Some(session) = &mut self.session else {
            return;
        };
        session.pointer = Some(screen);
        self.refresh_hover(viewport, camera, scene);
    }

    /// Re-casts the last pointer position, so the disc tracks camera motion.
    pub fn refresh_hover(&self, viewport: PhysicalSize<u32>, camera: &Camera, scene: &mut Scene) {
        let Some(session) = self.session else {
            return;
        };
        if !session.mode.targets_ground() {
            return;
        }
        let hit = session
            .pointer
            .and_then(|pointer| screen_to_ray(pointer, viewport, camera))
            .and_then(|ray| scene.raycast_terrain(&ray));
        match hit {
            Some(hit) => scene.show_hover(&hit),
            None => scene.hide_hover(),
        }
    }

    pub fn handle_click(
        &mut self,
        screen: Vec2,
        viewport: PhysicalSize<u32>,
        camera: &Camera,
        scene: &mut Scene,
    ) -> ClickOutcome {
        let Some(session) = self.session else {
            return ClickOutcome::Nothing;
        };
        let Some(ray) = screen_to_ray(screen, viewport, camera) else {
            return ClickOutcome::Nothing;
        };

        match session.mode {
            EditMode::None => ClickOutcome::Nothing,
            EditMode::Add => match scene.raycast_terrain(&ray) {
                Some(hit) => ClickOutcome::Added(scene.spawn_flower(hit.point)),
                None => ClickOutcome::Nothing,
            },
            EditMode::Erase => {
                let Some(hit) = scene.raycast_terrain(&ray) else {
                    return ClickOutcome::Nothing;
                };
                let doomed = scene.flowers_within(hit.point, self.erase_radius);
                for key in &doomed {
                    if self.selection.key() == Some(*key) {
                        self.selection.clear();
                    }
                    scene.remove_flower(*key);
                }
                if !doomed.is_empty() {
                    log::debug!("Erased {} flower(s) near {:?}", doomed.len(), hit.point);
                }
                ClickOutcome::Erased(doomed)
            }
            EditMode::Resize => {
                let Some((key, _)) = scene.raycast_flowers(&ray) else {
                    return ClickOutcome::Nothing;
                };
                scene.clear_selection();
                scene.set_flower_selected(key, true);
                let epoch = self.selection.select(key);
                match scene.flower(key) {
                    Some(flower) => ClickOutcome::Selected(SelectionHandle {
                        key,
                        epoch,
                        scale: flower.scale(),
                        rotation_degrees: flower.rotation_degrees(),
                    }),
                    None => ClickOutcome::Nothing,
                }
            }
        }
    }

    /// Rescales the selected flower. Returns the applied, clamped value.
    pub fn set_selected_scale(
        &mut self,
        handle: &SelectionHandle,
        scale: f32,
        scene: &mut Scene,
    ) -> Result<f32, SelectionError> {
        let key = self.selection.validate(handle)?;
        scene.set_flower_scale(key, scale).ok_or(SelectionError::Stale)
    }

    /// Rotates the selected flower. Returns the applied, wrapped value.
    pub fn set_selected_rotation(
        &mut self,
        handle: &SelectionHandle,
        degrees: f32,
        scene: &mut Scene,
    ) -> Result<f32, SelectionError> {
        let key = self.selection.validate(handle)?;
        scene.set_flower_rotation(key, degrees).ok_or(SelectionError::Stale)
    }

    /// Handle for the current selection, reflecting the flower's live values.
    pub fn selection_handle(&self, scene: &Scene) -> Option<SelectionHandle> {
        let key = self.selection.key()?;
        let flower = scene.flower(key)?;
        Some(SelectionHandle {
            key,
            epoch: self.selection.epoch(),
            scale: flower.scale(),
            rotation_degrees: flower.rotation_degrees(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::testing::{bare_scene, flat_scene};
    use glam::Vec3;

    const VIEWPORT: PhysicalSize<u32> = PhysicalSize::new(800, 600);
    const CENTRE: Vec2 = Vec2::new(400.0, 300.0);

    /// Camera above the origin looking straight down, so the centre pixel
    /// lands on (x, 0, z).
    fn camera_over(x: f32, z: f32) -> Camera {
        let mut camera = Camera::new(Vec3::new(x, 5.0, z), 60f32.to_radians(), 0.1, 1000.0);
        camera.set_yaw_pitch(0.0, -std::f32::consts::FRAC_PI_2);
        camera
    }

    /// Camera level with flowers, looking down -Z.
    fn camera_facing(x: f32, y: f32) -> Camera {
        Camera::new(Vec3::new(x, y, 5.0), 60f32.to_radians(), 0.1, 1000.0)
    }

    fn click(editor: &mut SceneEditor, scene: &mut Scene, camera: &Camera) -> ClickOutcome {
        editor.handle_click(CENTRE, VIEWPORT, camera, scene)
    }

    #[test]
    fn add_click_plants_at_hit_point() {
        let mut scene = flat_scene();
        let mut editor = SceneEditor::default();
        editor.enable_mode(EditMode::Add, &mut scene);
        let ClickOutcome::Added(key) = click(&mut editor, &mut scene, &camera_over(1.0, 2.0)) else {
            panic!("expected a flower");
        };
        let base = scene.flower(key).unwrap().base_position();
        assert!((base - Vec3::new(1.0, 0.0, 2.0)).length() < 1e-3);
    }

    #[test]
    fn add_click_off_terrain_creates_nothing() {
        let mut scene = flat_scene();
        let mut editor = SceneEditor::default();
        editor.enable_mode(EditMode::Add, &mut scene);
        let outcome = click(&mut editor, &mut scene, &camera_over(50.0, 50.0));
        assert_eq!(outcome, ClickOutcome::Nothing);
        assert_eq!(scene.flower_count(), 0);

        let mut empty = bare_scene();
        editor.enable_mode(EditMode::Add, &mut empty);
        assert_eq!(click(&mut editor, &mut empty, &camera_over(0.0, 0.0)), ClickOutcome::Nothing);
    }

    #[test]
    fn erase_removes_only_flowers_within_radius() {
        let mut scene = flat_scene();
        let close = scene.plant_flower(crate::assets::ImageSource::Default, Vec3::new(0.05, 0.0, 0.0), 0.0);
        let closer = scene.plant_flower(crate::assets::ImageSource::Default, Vec3::new(0.0, 0.0, -0.09), 0.0);
        let outside = scene.plant_flower(crate::assets::ImageSource::Default, Vec3::new(0.0, 0.0, 0.15), 0.0);
        scene.poll_assets();

        let mut editor = SceneEditor::default();
        editor.enable_mode(EditMode::Erase, &mut scene);
        let ClickOutcome::Erased(mut erased) = click(&mut editor, &mut scene, &camera_over(0.0, 0.0)) else {
            panic!("expected an erase");
        };
        erased.sort();
        let mut expected = vec![close, closer];
        expected.sort();
        assert_eq!(erased, expected);
        assert!(scene.flower(outside).is_some());
        assert_eq!(scene.flower_count(), 1);
    }

    #[test]
    fn erase_skips_flowers_still_loading() {
        let mut scene = flat_scene();
        let key = scene.spawn_flower(Vec3::ZERO);
        let mut editor = SceneEditor::default();
        editor.enable_mode(EditMode::Erase, &mut scene);
        assert_eq!(
            click(&mut editor, &mut scene, &camera_over(0.0, 0.0)),
            ClickOutcome::Erased(Vec::new())
        );
        assert!(scene.flower(key).is_some());

        scene.poll_assets();
        assert!(scene.flower(key).unwrap().is_loaded());
        assert_eq!(
            click(&mut editor, &mut scene, &camera_over(0.0, 0.0)),
            ClickOutcome::Erased(vec![key])
        );
        assert_eq!(scene.flower_count(), 0);
    }

    #[test]
    fn resize_click_selects_exclusively() {
        let mut scene = flat_scene();
        let left = scene.plant_flower(crate::assets::ImageSource::Default, Vec3::new(-1.0, 0.0, 0.0), 0.0);
        let right = scene.plant_flower(crate::assets::ImageSource::Default, Vec3::new(1.0, 0.0, 0.0), 0.0);
        scene.poll_assets();

        let mut editor = SceneEditor::default();
        let transition = editor.enable_mode(EditMode::Resize, &mut scene);
        assert!(transition.entered(EditMode::Resize));
        assert!(scene.selected_flowers().is_empty());

        let outcome = click(&mut editor, &mut scene, &camera_facing(-1.0, 0.2));
        assert!(matches!(outcome, ClickOutcome::Selected(handle) if handle.key == left));
        assert_eq!(scene.selected_flowers(), vec![left]);

        let outcome = click(&mut editor, &mut scene, &camera_facing(1.0, 0.2));
        assert!(matches!(outcome, ClickOutcome::Selected(handle) if handle.key == right));
        assert_eq!(scene.selected_flowers(), vec![right]);

        // A miss keeps the current selection.
        assert_eq!(click(&mut editor, &mut scene, &camera_facing(8.0, 0.2)), ClickOutcome::Nothing);
        assert_eq!(editor.selected(), Some(right));
    }

    #[test]
    fn resize_skips_unloaded_flowers() {
        let mut scene = flat_scene();
        scene.plant_flower(crate::assets::ImageSource::Default, Vec3::ZERO, 0.0);
        let mut editor = SceneEditor::default();
        editor.enable_mode(EditMode::Resize, &mut scene);
        assert_eq!(click(&mut editor, &mut scene, &camera_facing(0.0, 0.2)), ClickOutcome::Nothing);
    }

    #[test]
    fn leaving_resize_clears_selection_and_stales_handle() {
        let mut scene = flat_scene();
        let key = scene.plant_flower(crate::assets::ImageSource::Default, Vec3::ZERO, 0.0);
        scene.poll_assets();
        let mut editor = SceneEditor::default();
        editor.enable_mode(EditMode::Resize, &mut scene);
        let ClickOutcome::Selected(handle) = click(&mut editor, &mut scene, &camera_facing(0.0, 0.2)) else {
            panic!("expected a selection");
        };

        assert_eq!(editor.set_selected_scale(&handle, 2.5, &mut scene), Ok(2.5));
        assert_eq!(editor.set_selected_rotation(&handle, 90.0, &mut scene), Ok(90.0));
        assert_eq!(scene.flower(key).unwrap().rotation_degrees(), 90.0);
        assert_eq!(editor.selection_handle(&scene).unwrap().scale, 2.5);

        editor.enable_mode(EditMode::Add, &mut scene);
        assert!(scene.selected_flowers().is_empty());
        assert_eq!(editor.selected(), None);
        assert_eq!(
            editor.set_selected_scale(&handle, 1.0, &mut scene),
            Err(SelectionError::Stale)
        );
        assert_eq!(scene.flower(key).unwrap().scale(), 2.5);
    }

    #[test]
    fn hover_follows_pointer_only_in_ground_modes() {
        let mut scene = flat_scene();
        let mut editor = SceneEditor::default();
        let camera = camera_over(0.0, 0.0);

        editor.handle_pointer_move(CENTRE, VIEWPORT, &camera, &mut scene);
        assert!(!scene.hover().is_visible());

        editor.enable_mode(EditMode::Add, &mut scene);
        editor.handle_pointer_move(CENTRE, VIEWPORT, &camera, &mut scene);
        assert!(scene.hover().is_visible());
        assert!((scene.hover().position() - Vec3::new(0.0, 0.001, 0.0)).length() < 1e-3);

        // Camera moves off the terrain; the refresh hides the disc.
        editor.refresh_hover(VIEWPORT, &camera_over(50.0, 0.0), &mut scene);
        assert!(!scene.hover().is_visible());

        editor.refresh_hover(VIEWPORT, &camera, &mut scene);
        assert!(scene.hover().is_visible());
        editor.enable_mode(EditMode::None, &mut scene);
        assert!(!scene.hover().is_visible());
        assert!(!editor.is_active());
    }
}
