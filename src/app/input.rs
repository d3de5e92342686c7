use crate::editor::EditMode;
use crate::locomotion::CameraMovement;
use glam::Vec2;
use winit::keyboard::{KeyCode, PhysicalKey};

/// Discrete commands bound to single key presses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputAction {
    ToggleMode(EditMode),
    ClearMode,
    SwitchCamera,
    /// Sign of the scale step: +1 grows, -1 shrinks.
    ScaleSelection(f32),
    /// Sign of the rotation step: +1 clockwise seen from above.
    RotateSelection(f32),
    Escape,
}

#[derive(Default, Debug, Clone)]
pub struct InputState {
    pub move_forward: bool,
    pub move_backward: bool,
    pub move_left: bool,
    pub move_right: bool,
    pub aim_left: bool,
    pub aim_right: bool,
    pub aim_up: bool,
    pub aim_down: bool,
    pub pointer_locked: bool,
    pub cursor: Option<Vec2>,
    pub look_delta: Vec2,
    pub drag_delta: Vec2,
    pub scroll: f32,
    pub left_down: bool,
    press_origin: Option<Vec2>,
}

impl InputState {
    /// Updates held keys and returns the action bound to a fresh press.
    pub fn handle_key(&mut self, key: PhysicalKey, pressed: bool) -> Option<InputAction> {
        let PhysicalKey::Code(code) = key else {
            return None;
        };
        match code {
            KeyCode::KeyW => self.move_forward = pressed,
            KeyCode::KeyS => self.move_backward = pressed,
            KeyCode::KeyA => self.move_left = pressed,
            KeyCode::KeyD => self.move_right = pressed,
            KeyCode::ArrowLeft => self.aim_left = pressed,
            KeyCode::ArrowRight => self.aim_right = pressed,
            KeyCode::ArrowUp => self.aim_up = pressed,
            KeyCode::ArrowDown => self.aim_down = pressed,
            _ => {}
        }
        if !pressed {
            return None;
        }
        match code {
            KeyCode::Digit1 => Some(InputAction::ToggleMode(EditMode::Add)),
            KeyCode::Digit2 => Some(InputAction::ToggleMode(EditMode::Erase)),
            KeyCode::Digit3 => Some(InputAction::ToggleMode(EditMode::Resize)),
            KeyCode::Digit0 => Some(InputAction::ClearMode),
            KeyCode::Tab => Some(InputAction::SwitchCamera),
            KeyCode::BracketLeft => Some(InputAction::ScaleSelection(-1.0)),
            KeyCode::BracketRight => Some(InputAction::ScaleSelection(1.0)),
            KeyCode::Comma => Some(InputAction::RotateSelection(-1.0)),
            KeyCode::Period => Some(InputAction::RotateSelection(1.0)),
            KeyCode::Escape => Some(InputAction::Escape),
            _ => None,
        }
    }

    pub fn cursor_moved(&mut self, position: Vec2) {
        if self.left_down {
            if let Some(previous) = self.cursor {
                self.drag_delta += position - previous;
            }
        }
        self.cursor = Some(position);
    }

    /// Raw device motion, independent of the cursor (which stays put while
    /// the pointer is locked).
    pub fn mouse_motion(&mut self, delta: Vec2) {
        self.look_delta += delta;
    }

    pub fn scrolled(&mut self, notches: f32) {
        self.scroll += notches;
    }

    pub fn left_pressed(&mut self) {
        self.left_down = true;
        self.press_origin = self.cursor;
    }

    /// Returns the click position when the pointer travelled less than
    /// `slop` pixels since the press.
    pub fn left_released(&mut self, slop: f32) -> Option<Vec2> {
        self.left_down = false;
        let origin = self.press_origin.take()?;
        let position = self.cursor?;
        (position.distance(origin) < slop).then_some(position)
    }

    /// Samples this frame's movement and clears the accumulated deltas.
    pub fn take_movement(&mut self) -> CameraMovement {
        let movement = CameraMovement {
            move_forward: self.move_forward,
            move_backward: self.move_backward,
            move_left: self.move_left,
            move_right: self.move_right,
            aim_left: self.aim_left,
            aim_right: self.aim_right,
            aim_up: self.aim_up,
            aim_down: self.aim_down,
            look_delta: self.look_delta,
            pointer_locked: self.pointer_locked,
            drag_delta: self.drag_delta,
            zoom: self.scroll,
        };
        self.look_delta = Vec2::ZERO;
        self.drag_delta = Vec2::ZERO;
        self.scroll = 0.0;
        movement
    }

    /// Drops held keys and buttons, e.g. when the window loses focus.
    pub fn release_all(&mut self) {
        *self = Self {
            cursor: self.cursor,
            pointer_locked: self.pointer_locked,
            ..Self::default()
        };
    }
}
