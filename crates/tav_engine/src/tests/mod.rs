//! Whole-engine scenarios driven through the headless device

mod picking_scenarios;

use crate::backend::HeadlessDevice;
use crate::config::EngineSettings;
use crate::foundation::math::{Mat4Ext, Vec2, Vec3};
use crate::{AppError, Application, Engine, EngineConfig};

/// Application that only counts its update ticks
#[derive(Default)]
pub(crate) struct CountingApp {
    pub updates: u32,
}

impl Application for CountingApp {
    fn initialize(&mut self, _engine: &mut Engine) -> Result<(), AppError> {
        Ok(())
    }

    fn update(&mut self, _engine: &mut Engine, _ctx: &crate::scene::UpdateContext) -> Result<(), AppError> {
        self.updates += 1;
        Ok(())
    }
}

pub(crate) fn headless_engine() -> Engine {
    Engine::new(EngineConfig::default(), EngineSettings::default(), Box::new(HeadlessDevice::new()))
        .expect("headless engine starts")
}

/// Window pixel where `world` appears from the active camera
pub(crate) fn screen_position(engine: &Engine, world: Vec3) -> Vec2 {
    let camera = engine.active_camera().expect("active camera");
    let ndc = camera.view_projection().project_point(&world).expect("point in front of camera");
    let viewport = engine.context().viewport();
    Vec2::new((ndc.x + 1.0) * 0.5 * viewport.x, (1.0 - ndc.y) * 0.5 * viewport.y)
}
