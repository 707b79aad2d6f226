//! # TAV Engine
//!
//! A real-time 3D engine core: a directory of drawable entities with
//! GPU-resident geometry, instanced transforms, frustum culling, and mouse
//! picking with a translation gizmo.
//!
//! ## Features
//!
//! - **Scene directory**: objects, imported models and cameras with idempotent teardown
//! - **Instancing**: per-instance model matrices streamed to one draw call
//! - **Culling**: six-plane frustum test against bounding spheres
//! - **Picking**: screen-space hover, click callbacks, axis-constrained dragging
//! - **Background import**: OBJ files decoded on a worker pool
//!
//! The GPU sits behind [`backend::GpuDevice`]; [`backend::HeadlessDevice`]
//! records calls instead of issuing them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tav_engine::prelude::*;
//!
//! struct MyApp;
//!
//! impl Application for MyApp {
//!     fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError> {
//!         engine.add_object(primitives::plane())?;
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let device = Box::new(HeadlessDevice::new());
//!     let mut engine = Engine::new(EngineConfig::default(), EngineSettings::default(), device)?;
//!     let mut app = MyApp;
//!     app.initialize(&mut engine)?;
//!     engine.frame(0.0, &mut app)?;
//!     engine.shutdown();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;
pub mod config;
pub mod backend;
pub mod assets;
pub mod render;
pub mod scene;
pub mod camera;
pub mod picking;
pub mod input;
pub mod physics;

mod application;
mod engine;

#[cfg(test)]
mod tests;

pub use application::{AppError, Application};
pub use engine::{Engine, EngineConfig, EngineContext, EngineError, ModelSetup, WindowConfig, DEFAULT_CAMERA_POSITION};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        AppError, Application,
        Engine, EngineConfig, EngineContext, EngineError,
        backend::{GpuDevice, HeadlessDevice},
        camera::{Camera, CameraConfig},
        config::{Config, EngineSettings, SettingsLocator},
        foundation::{
            math::{Color, Mat4, Vec2, Vec3},
            time::{Clock, FixedTimestep, MonotonicClock},
        },
        input::{Action, InputEvent, KeyCode, Modifiers, MouseButton},
        picking::{Axis, AxisDistance, AxisTieBreak, PickingConfig},
        render::{Texture, TextureCache},
        scene::{
            primitives, ClickEvent, EntityId, FrameStats, Model3D, ObjectType, SceneEntity, SceneObject, Transform,
            UpdateContext,
        },
    };
}
