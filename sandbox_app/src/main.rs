//! Sandbox demo
//!
//! Opens a window with a GL context, builds a small scene (floor, a field of instanced cubes,
//! a second camera and an imported model) and runs the engine loop. Drag with
//! the left button to look around; with a selected object, drag one of its
//! gizmo axes to move it.

mod gl_device;
mod window;

use rand::Rng;
use tav_engine::foundation::logging;
use tav_engine::prelude::*;
use tav_engine::scene::primitives::CUBE_TEXTURE;
use thiserror::Error;

use crate::window::{Window, WindowError};

const CUBE_FIELD_SIZE: usize = 200;
const CUBE_FIELD_EXTENT: f32 = 300.0;
const MODEL_PATH: &str = "models/backpack.obj";

#[derive(Error, Debug)]
enum SandboxError {
    #[error(transparent)]
    Window(#[from] WindowError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    App(#[from] AppError),
}

#[derive(Default)]
struct Sandbox {
    fps_logged: f32,
}

impl Application for Sandbox {
    fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError> {
        engine.add_object(primitives::plane().with_position(Vec3::new(0.0, -20.0, 0.0)))?;
        engine.add_object(primitives::triangle().with_position(Vec3::new(0.0, 5.0, -20.0)).with_scale(Vec3::repeat(10.0)))?;

        let texture = match engine.load_texture(CUBE_TEXTURE) {
            Ok(texture) => Some(texture),
            Err(e) => {
                log::warn!("Cubes will be drawn flat: {}", e);
                None
            }
        };

        let mut rng = rand::thread_rng();
        let instances = (0..CUBE_FIELD_SIZE)
            .map(|_| {
                let position = Vec3::new(
                    rng.gen_range(-CUBE_FIELD_EXTENT..CUBE_FIELD_EXTENT),
                    rng.gen_range(0.0..50.0),
                    rng.gen_range(-CUBE_FIELD_EXTENT..CUBE_FIELD_EXTENT),
                );
                Transform::from_position(position).with_uniform_scale(rng.gen_range(2.0..8.0))
            })
            .collect();
        engine.add_object(primitives::cube(texture.clone()).with_instances(instances))?;

        let clickable = primitives::cube(texture)
            .with_position(Vec3::new(0.0, 0.0, -40.0))
            .with_on_click(Box::new(|event: &ClickEvent| log::info!("Clicked '{}'", event.tag)));
        engine.add_object(clickable)?;

        engine.add_camera(Vec3::new(15.0, -10.0, 10.0))?;
        engine.load_model(MODEL_PATH, |model| model.with_position(Vec3::new(30.0, 0.0, -30.0)).with_scale(Vec3::repeat(5.0)));
        Ok(())
    }

    fn update(&mut self, engine: &mut Engine, _ctx: &UpdateContext) -> Result<(), AppError> {
        let fps = engine.context().fps;
        if fps != self.fps_logged {
            self.fps_logged = fps;
            if let Some(camera) = engine.active_camera() {
                let p = camera.position;
                log::debug!("FPS {:.0} | camera X: {:.2}, Y: {:.2}, Z: {:.2}", fps, p.x, p.y, p.z);
            }
        }
        Ok(())
    }

    fn cleanup(&mut self, engine: &mut Engine) {
        log::info!("Sandbox closing with {} objects", engine.directory().object_count());
    }
}

fn run() -> Result<(), SandboxError> {
    let config = EngineConfig::load_or_default("sandbox.toml").map_err(EngineError::from)?;
    let locator = SettingsLocator::from_executable().map_err(EngineError::from)?;

    let mut window = Window::new(&config.window.title, config.window.width, config.window.height, config.window.vsync)?;
    let device = Box::new(window.gl_device());
    let mut engine = Engine::initialize(config, &locator, device)?;

    let (width, height) = window.framebuffer_size();
    engine.resize(width, height)?;

    let mut app = Sandbox::default();
    app.initialize(&mut engine)?;

    while !window.should_close() && !engine.should_close() {
        window.poll_events();
        for event in window.drain_events() {
            if let Err(e) = engine.dispatch(event, &mut app) {
                log::error!("Event {:?} failed: {}", event, e);
            }
        }
        window.set_cursor_captured(engine.context().cursor_captured);

        match engine.frame(window.time(), &mut app) {
            Ok(stats) => log::trace!("{:?}", stats),
            Err(e) => log::error!("Frame failed: {}", e),
        }
        window.swap_buffers();
    }

    app.cleanup(&mut engine);
    engine.shutdown();
    Ok(())
}

fn main() {
    logging::init();
    log::info!("Starting sandbox");

    if let Err(e) = run() {
        log::error!("Sandbox failed: {}", e);
        std::process::exit(1);
    }
}
