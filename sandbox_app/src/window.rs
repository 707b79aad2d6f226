//! GLFW window wrapper and event translation

use glfw::{Context as _, WindowEvent};
use tav_engine::foundation::math::Vec2;
use tav_engine::input::{Action, InputEvent, KeyCode, Modifiers, MouseButton};
use thiserror::Error;

use crate::gl_device::GlDevice;

/// Window errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW could not start
    #[error("GLFW initialization failed: {0}")]
    InitializationFailed(String),
    /// The window could not be created
    #[error("Window creation failed")]
    CreationFailed,
}

/// GLFW window with every input callback enabled
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, WindowEvent)>,
    cursor_captured: bool,
}

impl Window {
    pub fn new(title: &str, width: u32, height: u32, vsync: bool) -> Result<Self, WindowError> {
        let mut glfw = glfw::init(glfw::fail_on_errors).map_err(|e| WindowError::InitializationFailed(format!("{e:?}")))?;

        glfw.window_hint(glfw::WindowHint::ContextVersion(4, 6));
        glfw.window_hint(glfw::WindowHint::OpenGlProfile(glfw::OpenGlProfileHint::Core));
        glfw.window_hint(glfw::WindowHint::OpenGlForwardCompat(true));
        glfw.window_hint(glfw::WindowHint::Resizable(true));
        glfw.window_hint(glfw::WindowHint::Samples(Some(tav_engine::render::framebuffer::DEFAULT_SAMPLES)));

        let (mut window, events) = glfw
            .create_window(width, height, title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.make_current();
        glfw.set_swap_interval(if vsync { glfw::SwapInterval::Sync(1) } else { glfw::SwapInterval::None });
        window.set_all_polling(true);
        window.set_cursor_mode(glfw::CursorMode::Disabled);
        log::info!("Window '{}' created at {}x{}", title, width, height);

        Ok(Self { glfw, window, events, cursor_captured: true })
    }

    /// GL device bound to this window's context
    pub fn gl_device(&mut self) -> GlDevice {
        GlDevice::load(|symbol| self.window.get_proc_address(symbol) as *const _)
    }

    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    pub fn poll_events(&mut self) {
        self.glfw.poll_events();
    }

    /// Drain pending events, keeping the ones the engine understands
    pub fn drain_events(&self) -> Vec<InputEvent> {
        glfw::flush_messages(&self.events).filter_map(|(_, event)| translate(event)).collect()
    }

    /// Lock or release the cursor; only touches GLFW when the mode changes
    pub fn set_cursor_captured(&mut self, captured: bool) {
        if captured != self.cursor_captured {
            self.cursor_captured = captured;
            self.window.set_cursor_mode(if captured { glfw::CursorMode::Disabled } else { glfw::CursorMode::Normal });
        }
    }

    pub fn swap_buffers(&mut self) {
        self.window.swap_buffers();
    }

    pub fn time(&self) -> f64 {
        self.glfw.get_time()
    }

    pub fn framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (width.max(0) as u32, height.max(0) as u32)
    }
}

fn translate(event: WindowEvent) -> Option<InputEvent> {
    match event {
        WindowEvent::Key(key, _, action, mods) => Some(InputEvent::Key {
            key: key_code(key),
            action: action_of(action),
            modifiers: modifiers_of(mods),
        }),
        WindowEvent::MouseButton(button, action, mods) => {
            let button = match button {
                glfw::MouseButton::Button1 => MouseButton::Left,
                glfw::MouseButton::Button2 => MouseButton::Right,
                glfw::MouseButton::Button3 => MouseButton::Middle,
                _ => return None,
            };
            Some(InputEvent::MouseButton { button, action: action_of(action), modifiers: modifiers_of(mods) })
        }
        WindowEvent::CursorPos(x, y) => Some(InputEvent::CursorMoved { position: Vec2::new(x as f32, y as f32) }),
        WindowEvent::Scroll(x, y) => Some(InputEvent::Scroll { x: x as f32, y: y as f32 }),
        WindowEvent::FramebufferSize(width, height) => Some(InputEvent::Resized {
            width: width.max(0) as u32,
            height: height.max(0) as u32,
        }),
        WindowEvent::Close => Some(InputEvent::CloseRequested),
        _ => None,
    }
}

fn key_code(key: glfw::Key) -> KeyCode {
    match key {
        glfw::Key::A => KeyCode::A,
        glfw::Key::C => KeyCode::C,
        glfw::Key::D => KeyCode::D,
        glfw::Key::E => KeyCode::E,
        glfw::Key::F => KeyCode::F,
        glfw::Key::Q => KeyCode::Q,
        glfw::Key::R => KeyCode::R,
        glfw::Key::S => KeyCode::S,
        glfw::Key::W => KeyCode::W,
        glfw::Key::Space => KeyCode::Space,
        glfw::Key::Enter => KeyCode::Enter,
        glfw::Key::Escape => KeyCode::Escape,
        glfw::Key::GraveAccent => KeyCode::GraveAccent,
        glfw::Key::LeftShift => KeyCode::LeftShift,
        glfw::Key::LeftControl => KeyCode::LeftControl,
        glfw::Key::Up => KeyCode::Up,
        glfw::Key::Down => KeyCode::Down,
        glfw::Key::Left => KeyCode::Left,
        glfw::Key::Right => KeyCode::Right,
        _ => KeyCode::Unknown,
    }
}

fn action_of(action: glfw::Action) -> Action {
    match action {
        glfw::Action::Press => Action::Press,
        glfw::Action::Release => Action::Release,
        glfw::Action::Repeat => Action::Repeat,
    }
}

fn modifiers_of(mods: glfw::Modifiers) -> Modifiers {
    let mut out = Modifiers::empty();
    out.set(Modifiers::SHIFT, mods.contains(glfw::Modifiers::Shift));
    out.set(Modifiers::CONTROL, mods.contains(glfw::Modifiers::Control));
    out.set(Modifiers::ALT, mods.contains(glfw::Modifiers::Alt));
    out.set(Modifiers::SUPER, mods.contains(glfw::Modifiers::Super));
    out
}
