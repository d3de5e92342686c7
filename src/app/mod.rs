mod input;
mod session;
mod timing;

pub use input::{InputAction, InputState};
pub use session::{ActionResponse, Session};
pub use timing::FrameTiming;

use crate::config::{Config, ConfigError};
use crate::render::HeadlessRenderer;
use glam::Vec2;
use std::sync::Arc;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, DeviceId, ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{CursorGrabMode, Window, WindowAttributes, WindowId};

/// Pixels per scroll notch for touchpads that report pixel deltas.
const PIXELS_PER_NOTCH: f32 = 40.0;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("failed to create window: {0}")]
    Os(#[from] winit::error::OsError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub struct App {
    config: Config,
    window: Option<Arc<Window>>,
    session: Option<Session>,
    error: Option<AppError>,
    close_requested: bool,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            config,
            window: None,
            session: None,
            error: None,
            close_requested: false,
        }
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(session) = &mut self.session {
            session.teardown();
        }
        self.close_requested = true;
        event_loop.exit();
    }

    fn lock_pointer(&mut self) {
        let (Some(window), Some(session)) = (&self.window, &mut self.session) else {
            return;
        };
        let grabbed = window
            .set_cursor_grab(CursorGrabMode::Locked)
            .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined));
        match grabbed {
            Ok(()) => {
                window.set_cursor_visible(false);
                session.set_pointer_locked(true);
            }
            Err(err) => log::warn!("Pointer lock unavailable: {}", err),
        }
    }

    fn release_pointer(&mut self) {
        if let Some(window) = &self.window {
            if let Err(err) = window.set_cursor_grab(CursorGrabMode::None) {
                log::debug!("Failed to release cursor grab: {}", err);
            }
            window.set_cursor_visible(true);
        }
        if let Some(session) = &mut self.session {
            session.set_pointer_locked(false);
        }
    }

    fn render(&mut self) {
        let Some(session) = &mut self.session else {
            return;
        };
        session.tick(Instant::now());
        if let (Some(window), Some(title)) = (&self.window, session.take_title()) {
            window.set_title(&title);
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_config = &self.config.window;
        let window_attrs = WindowAttributes::default()
            .with_title(window_config.title.clone())
            .with_inner_size(PhysicalSize::new(window_config.width, window_config.height))
            .with_resizable(true);

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                self.error = Some(err.into());
                event_loop.exit();
                return;
            }
        };
        log::info!(
            "Window created: {}x{}",
            window.inner_size().width,
            window.inner_size().height
        );

        self.session = Some(Session::new(
            self.config.clone(),
            Box::new(HeadlessRenderer::new()),
            window.inner_size(),
            Instant::now(),
        ));
        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),
            WindowEvent::Focused(focused) => {
                if !focused {
                    if let Some(session) = &mut self.session {
                        session.focus_lost();
                    }
                    self.release_pointer();
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let Some(session) = &mut self.session else {
                    return;
                };
                let pressed = event.state == ElementState::Pressed;
                let action = session.key(event.physical_key, pressed);
                // Held keys stay tracked on repeats, but actions fire once.
                let Some(action) = action.filter(|_| !event.repeat) else {
                    return;
                };
                match session.apply(action) {
                    ActionResponse::Handled => {}
                    ActionResponse::ReleasePointer => self.release_pointer(),
                    ActionResponse::Exit => self.shutdown(event_loop),
                }
            }
            WindowEvent::Resized(new_size) => {
                log::debug!("Window resized to {}x{}", new_size.width, new_size.height);
                if let Some(session) = &mut self.session {
                    session.set_viewport(new_size);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let Some(session) = &mut self.session {
                    session.pointer_moved(Vec2::new(position.x as f32, position.y as f32));
                }
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                let Some(session) = &mut self.session else {
                    return;
                };
                match state {
                    ElementState::Pressed if session.wants_pointer_lock() => self.lock_pointer(),
                    ElementState::Pressed => session.pointer_pressed(),
                    ElementState::Released => {
                        session.pointer_released();
                    }
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let notches = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / PIXELS_PER_NOTCH,
                };
                if let Some(session) = &mut self.session {
                    session.scrolled(notches);
                }
            }
            WindowEvent::RedrawRequested => self.render(),
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            if let Some(session) = &mut self.session {
                session.mouse_motion(Vec2::new(delta.0 as f32, delta.1 as f32));
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if self.close_requested {
            return;
        }
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

pub fn run(config: Config) -> Result<(), AppError> {
    log::info!("Meadow: 1 add, 2 erase, 3 resize, 0 none, Tab switches camera");
    log::info!("   Press ESC or close window to exit");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    if let Some(err) = app.error.take() {
        return Err(err);
    }
    log::info!("Goodbye!");
    Ok(())
}
