//! Application trait and lifecycle management

use crate::assets::AssetError;
use crate::engine::{Engine, EngineError};
use crate::input::InputEvent;
use crate::scene::UpdateContext;
use thiserror::Error;

/// Application lifecycle trait
///
/// Implement this trait to build a scene on top of the engine. The engine is
/// passed in explicitly on every call; there is no global to reach for.
pub trait Application {
    /// Initialize the application
    ///
    /// Called once after the engine is initialized. Use this to add objects,
    /// cameras and model imports.
    fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError>;

    /// Update the application
    ///
    /// Called once per fixed update tick, after the engine has moved the
    /// camera and eased hover colours.
    fn update(&mut self, _engine: &mut Engine, _ctx: &UpdateContext) -> Result<(), AppError> {
        Ok(())
    }

    /// Handle an input event before the engine's own bindings see it
    fn handle_event(&mut self, _engine: &mut Engine, _event: &InputEvent) -> Result<(), AppError> {
        Ok(())
    }

    /// Cleanup the application
    ///
    /// Called before [`Engine::shutdown`]; the scene is still intact.
    fn cleanup(&mut self, _engine: &mut Engine) {}
}

/// Application-level errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Engine error propagated to application level
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Asset loading error
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    /// Custom application error
    #[error("Application error: {0}")]
    Custom(String),
}
