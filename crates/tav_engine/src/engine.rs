//! Core engine implementation
//!
//! [`Engine`] owns every subsystem and the GPU device. Nothing is global:
//! window size, timing and mode flags live in [`EngineContext`], which the
//! engine hands to the application alongside the scene.
//!
//! One call to [`Engine::frame`] is one outer loop iteration. The fixed
//! timestep decides whether the update pass runs; the render pass runs every
//! time.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::Application;
use crate::assets::{AssetError, ImportHandle, ImportPool};
use crate::backend::{FramebufferId, FramebufferTarget, GpuDevice};
use crate::camera::{Camera, CameraConfig, CameraMovement};
use crate::config::{Config, ConfigError, EngineSettings, SettingsLocator};
use crate::foundation::math::{Vec2, Vec3};
use crate::foundation::time::{FixedTimestep, FrameCounter, DEFAULT_UPDATE_INTERVAL};
use crate::input::{Action, InputEvent, KeyCode, KeyState, Modifiers, MouseButton};
use crate::physics::PhysicsManager;
use crate::picking::{PickingConfig, PickingController};
use crate::render::framebuffer::DEFAULT_SAMPLES;
use crate::render::{FrameBufferObject, GeometryRegistry, RenderError, ShaderLibrary, ShaderRole, Texture, TextureCache};
use crate::scene::primitives::CAMERA_TEXTURE;
use crate::scene::{CameraKey, DrawContext, EntityId, FrameStats, Model3D, ModelKey, ObjectKey, SceneDirectory, SceneObject, UpdateContext};

/// Where the engine places the camera it creates at startup
pub const DEFAULT_CAMERA_POSITION: Vec3 = Vec3::new(1.0, 1.0, 1.0);

const MOVEMENT_BINDINGS: [(KeyCode, CameraMovement); 6] = [
    (KeyCode::W, CameraMovement::Forward),
    (KeyCode::S, CameraMovement::Backward),
    (KeyCode::A, CameraMovement::Left),
    (KeyCode::D, CameraMovement::Right),
    (KeyCode::Space, CameraMovement::Up),
    (KeyCode::LeftShift, CameraMovement::Down),
];

/// Hook applied to an imported model before it enters the scene
pub type ModelSetup = Box<dyn FnOnce(Model3D) -> Model3D>;

struct PendingImport {
    handle: ImportHandle,
    setup: ModelSetup,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Window configuration
    pub window: WindowConfig,
    /// Render through the multisampled framebuffer
    pub anti_aliasing: bool,
    /// MSAA sample count
    pub samples: u32,
    /// Clear colour (RGBA)
    pub background: [f32; 4],
    /// Fixed update interval in seconds
    pub update_interval: f64,
    /// Draw bounding-box outlines
    pub show_bounds: bool,
    /// Import worker threads
    pub import_workers: usize,
    /// Camera defaults
    pub camera: CameraConfig,
    /// Hover and gizmo parameters
    pub picking: PickingConfig,
}

/// Window configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Window width
    pub width: u32,
    /// Window height
    pub height: u32,
    /// VSync setting
    pub vsync: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { title: "TAV Engine".to_string(), width: 800, height: 600, vsync: true }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            anti_aliasing: true,
            samples: DEFAULT_SAMPLES,
            background: [0.53, 0.81, 0.98, 1.0],
            update_interval: DEFAULT_UPDATE_INTERVAL,
            show_bounds: false,
            import_workers: 2,
            camera: CameraConfig::default(),
            picking: PickingConfig::default(),
        }
    }
}

impl Config for EngineConfig {}

/// Per-run state shared with the application
#[derive(Debug, Clone)]
pub struct EngineContext {
    /// Framebuffer width in pixels
    pub width: u32,
    /// Framebuffer height in pixels
    pub height: u32,
    /// Slack reported by the last update tick
    pub delta_time: f32,
    /// Clock time of the last update tick
    pub time: f64,
    /// Last published frames-per-second sample
    pub fps: f32,
    /// Directory layout read at startup
    pub settings: EngineSettings,
    /// Polygons drawn as lines
    pub wireframe: bool,
    /// Render through the multisampled framebuffer
    pub anti_aliasing: bool,
    /// Draw bounding-box outlines
    pub show_bounds: bool,
    /// Cursor hidden and locked to the window
    pub cursor_captured: bool,
    /// Someone asked the main loop to stop
    pub close_requested: bool,
}

impl EngineContext {
    fn new(config: &EngineConfig, settings: EngineSettings) -> Self {
        Self {
            width: config.window.width.max(1),
            height: config.window.height.max(1),
            delta_time: 0.0,
            time: 0.0,
            fps: 0.0,
            settings,
            wireframe: false,
            anti_aliasing: config.anti_aliasing,
            show_bounds: config.show_bounds,
            cursor_captured: true,
            close_requested: false,
        }
    }

    /// Width over height
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    /// Framebuffer size as a vector
    pub fn viewport(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }
}

/// Main engine struct
///
/// The engine coordinates all subsystems and manages the frame loop.
pub struct Engine {
    config: EngineConfig,
    context: EngineContext,
    device: Box<dyn GpuDevice>,
    directory: SceneDirectory,
    registry: GeometryRegistry,
    shaders: ShaderLibrary,
    textures: TextureCache,
    imports: ImportPool,
    pending: Vec<PendingImport>,
    picking: PickingController,
    physics: PhysicsManager,
    keys: KeyState,
    timestep: FixedTimestep,
    frames: FrameCounter,
    framebuffer: Option<FrameBufferObject>,
}

impl Engine {
    /// Read the settings file through `locator`, then build the engine
    ///
    /// A missing settings file or key is fatal.
    pub fn initialize(config: EngineConfig, locator: &SettingsLocator, device: Box<dyn GpuDevice>) -> Result<Self, EngineError> {
        let settings = locator.load().map_err(|e| {
            log::error!("Cannot read {:?}: {}", locator.settings_file(), e);
            e
        })?;
        Self::new(config, settings, device)
    }

    /// Create a new engine instance
    ///
    /// Compiles the built-in shaders, builds the anti-alias framebuffer when
    /// enabled and adds the main camera.
    pub fn new(config: EngineConfig, settings: EngineSettings, mut device: Box<dyn GpuDevice>) -> Result<Self, EngineError> {
        log::info!("Initializing engine...");
        let context = EngineContext::new(&config, settings);

        device.viewport(context.width, context.height);
        device.set_depth_test(true);

        let mut registry = GeometryRegistry::new();
        let shaders = ShaderLibrary::load_builtin(device.as_mut(), &context.settings.shader_dir);
        if shaders.role(ShaderRole::Default).is_none() {
            return Err(EngineError::InitializationFailed("default shader unavailable".to_string()));
        }

        let framebuffer = if config.anti_aliasing {
            let fbo = FrameBufferObject::create(device.as_mut(), &mut registry, context.width, context.height, config.samples)?;
            Some(fbo)
        } else {
            None
        };

        let mut engine = Self {
            imports: ImportPool::new(config.import_workers),
            picking: PickingController::new(config.picking.clone()),
            timestep: FixedTimestep::new(config.update_interval),
            context,
            device,
            directory: SceneDirectory::new(),
            registry,
            shaders,
            textures: TextureCache::new(),
            pending: Vec::new(),
            physics: PhysicsManager::new(),
            keys: KeyState::new(),
            frames: FrameCounter::new(),
            framebuffer,
            config,
        };

        engine.add_camera(DEFAULT_CAMERA_POSITION)?;
        log::info!(
            "Engine ready: {}x{}, anti-aliasing {}",
            engine.context.width,
            engine.context.height,
            if engine.framebuffer.is_some() { "on" } else { "off" }
        );
        Ok(engine)
    }

    /// Run one loop iteration at clock time `now`
    ///
    /// # Returns
    /// Counters of the render pass
    pub fn frame(&mut self, now: f64, app: &mut dyn Application) -> Result<FrameStats, EngineError> {
        if self.timestep.tick_at(now) {
            self.update(now, app)?;
        }
        if let Some(fps) = self.frames.record_frame(now) {
            self.context.fps = fps;
            log::debug!("{:.0} fps, {} live geometries", fps, self.registry.live_count());
        }
        self.render()
    }

    fn update(&mut self, now: f64, app: &mut dyn Application) -> Result<(), EngineError> {
        let delta_time = self.timestep.delta_time();
        self.context.delta_time = delta_time;
        self.context.time = now;
        let ctx = UpdateContext { delta_time, time: now };

        self.poll_imports();
        self.apply_movement(delta_time);
        self.physics.step(delta_time);
        self.directory.update_all(&ctx);

        let aspect = self.context.aspect_ratio();
        if let Some(camera) = self.directory.active_camera_mut() {
            camera.update(aspect);
        }
        self.picking.update_hover(&mut self.directory, delta_time);

        app.update(self, &ctx).map_err(|e| EngineError::ApplicationError(e.to_string()))
    }

    fn apply_movement(&mut self, delta_time: f32) {
        let Some(camera) = self.directory.active_camera_mut() else { return };
        for (key, movement) in MOVEMENT_BINDINGS {
            if self.keys.is_held(key) {
                camera.process_keyboard(movement, delta_time);
            }
        }
    }

    /// Draw the scene from the active camera
    pub fn render(&mut self) -> Result<FrameStats, EngineError> {
        let Some(camera) = self.directory.active_camera() else {
            log::trace!("No active camera, nothing to render");
            return Ok(FrameStats::default());
        };
        let (view, projection, frustum) = (camera.view(), camera.projection(), *camera.frustum());

        let device = self.device.as_mut();
        let offscreen = self.context.anti_aliasing && self.framebuffer.as_ref().is_some_and(FrameBufferObject::is_complete);
        match self.framebuffer.as_ref() {
            Some(fbo) if offscreen => fbo.begin(device),
            _ => device.bind_framebuffer(FramebufferTarget::Both, FramebufferId::NULL),
        }
        device.clear(self.config.background);
        device.set_depth_test(true);
        device.set_wireframe(self.context.wireframe);

        let mut ctx = DrawContext {
            device: &mut *device,
            registry: &mut self.registry,
            shaders: &self.shaders,
            view,
            projection,
            frustum,
            show_bounds: self.context.show_bounds,
        };
        let stats = self.directory.render(&mut ctx);

        if offscreen {
            if let Some(fbo) = self.framebuffer.as_mut() {
                device.set_wireframe(false);
                fbo.resolve(device, &self.shaders)?;
            }
        }
        Ok(stats)
    }

    /// Feed one input event through the application, then the engine
    pub fn dispatch(&mut self, event: InputEvent, app: &mut dyn Application) -> Result<(), EngineError> {
        app.handle_event(self, &event).map_err(|e| EngineError::ApplicationError(e.to_string()))?;
        self.handle_event(event)
    }

    /// Handle an input event
    pub fn handle_event(&mut self, event: InputEvent) -> Result<(), EngineError> {
        let viewport = self.context.viewport();
        match event {
            InputEvent::Key { key, action, modifiers } => {
                self.keys.apply(key, action);
                if action == Action::Release {
                    self.key_released(key, modifiers);
                }
            }
            InputEvent::MouseButton { button: MouseButton::Left, action: Action::Press, .. } => {
                self.picking.mouse_pressed(&self.directory, viewport);
            }
            InputEvent::MouseButton { button: MouseButton::Left, action: Action::Release, .. } => {
                self.picking.mouse_released(&mut self.directory);
            }
            InputEvent::MouseButton { .. } => {}
            InputEvent::CursorMoved { position } => {
                self.picking.cursor_moved(position, &mut self.directory, viewport);
            }
            InputEvent::Scroll { y, .. } => {
                if let Some(camera) = self.directory.active_camera_mut() {
                    camera.zoom(y);
                }
            }
            InputEvent::Resized { width, height } => self.resize(width, height)?,
            InputEvent::CloseRequested => self.quit(),
        }
        Ok(())
    }

    fn key_released(&mut self, key: KeyCode, modifiers: Modifiers) {
        match key {
            KeyCode::Escape => self.quit(),
            KeyCode::R => {
                self.shaders.reload_all(self.device.as_mut());
            }
            KeyCode::GraveAccent => {
                self.context.cursor_captured = !self.context.cursor_captured;
                if !self.context.cursor_captured {
                    self.keys.clear();
                }
            }
            KeyCode::W if modifiers.contains(Modifiers::CONTROL) => {
                self.context.wireframe = !self.context.wireframe;
                log::info!("Wireframe {}", if self.context.wireframe { "on" } else { "off" });
            }
            _ => {}
        }
    }

    /// Apply a framebuffer resize, rebuilding the anti-alias target
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), EngineError> {
        if width == 0 || height == 0 {
            log::debug!("Ignoring resize to {}x{}", width, height);
            return Ok(());
        }
        log::debug!("Resized to {}x{}", width, height);
        self.context.width = width;
        self.context.height = height;
        self.device.viewport(width, height);

        let aspect = self.context.aspect_ratio();
        if let Some(camera) = self.directory.active_camera_mut() {
            camera.update(aspect);
        }
        if let Some(fbo) = self.framebuffer.as_mut() {
            fbo.resize(self.device.as_mut(), &mut self.registry, width, height)?;
        }
        Ok(())
    }

    /// Request engine shutdown
    pub fn quit(&mut self) {
        log::info!("Engine shutdown requested");
        self.context.close_requested = true;
    }

    /// True once Escape or a close request was seen
    pub fn should_close(&self) -> bool {
        self.context.close_requested
    }

    /// Register and add a scene object
    pub fn add_object(&mut self, object: SceneObject) -> Result<ObjectKey, EngineError> {
        Ok(self.directory.add_object(self.device.as_mut(), &mut self.registry, object)?)
    }

    /// Add a camera at `position` using the configured defaults
    ///
    /// The first camera becomes the active one.
    pub fn add_camera(&mut self, position: Vec3) -> Result<CameraKey, EngineError> {
        let mut camera = Camera::new(position, &self.config.camera);
        match self.load_texture(CAMERA_TEXTURE) {
            Ok(texture) => camera = camera.with_billboard_texture(texture),
            Err(e) => log::warn!("Camera billboard left untextured: {}", e),
        }
        camera.update(self.context.aspect_ratio());
        Ok(self.directory.add_camera(self.device.as_mut(), &mut self.registry, camera)?)
    }

    /// Fetch a texture from the asset directory through the cache
    pub fn load_texture(&mut self, name: impl AsRef<Path>) -> Result<Rc<Texture>, EngineError> {
        let path = self.context.settings.asset_path(name);
        Ok(self.textures.acquire(self.device.as_mut(), path)?)
    }

    /// Start importing a model from the asset directory
    ///
    /// The model enters the scene from a later [`Engine::poll_imports`]
    /// after `setup` has positioned it.
    pub fn load_model(&mut self, path: impl AsRef<Path>, setup: impl FnOnce(Model3D) -> Model3D + 'static) -> PathBuf {
        let path = self.context.settings.asset_path(path);
        log::info!("Importing {:?}", path);
        let handle = self.imports.submit(&path);
        self.pending.push(PendingImport { handle, setup: Box::new(setup) });
        path
    }

    /// Import a model and wait for it
    pub fn load_model_blocking(
        &mut self,
        path: impl AsRef<Path>,
        setup: impl FnOnce(Model3D) -> Model3D,
    ) -> Result<ModelKey, EngineError> {
        let path = self.context.settings.asset_path(path);
        let scene = self.imports.submit(&path).wait()?;
        let model = setup(Model3D::from_import(scene, self.device.as_mut(), &mut self.textures));
        Ok(self.directory.add_model(self.device.as_mut(), &mut self.registry, model)?)
    }

    /// Move finished imports into the scene
    ///
    /// Failures are logged and dropped; nothing partial is added.
    ///
    /// # Returns
    /// Keys of the models added by this call
    pub fn poll_imports(&mut self) -> Vec<ModelKey> {
        let mut added = Vec::new();
        let mut still_running = Vec::with_capacity(self.pending.len());

        for pending in std::mem::take(&mut self.pending) {
            let Some(result) = pending.handle.poll() else {
                still_running.push(pending);
                continue;
            };
            let path = pending.handle.path().to_path_buf();
            let registered = result.map_err(EngineError::from).and_then(|scene| {
                let model = (pending.setup)(Model3D::from_import(scene, self.device.as_mut(), &mut self.textures));
                Ok(self.directory.add_model(self.device.as_mut(), &mut self.registry, model)?)
            });
            match registered {
                Ok(key) => {
                    log::info!("Model {:?} added", path);
                    added.push(key);
                }
                Err(e) => log::error!("Model {:?} not added: {}", path, e),
            }
        }
        self.pending = still_running;
        added
    }

    /// Imports submitted but not yet added
    pub fn pending_imports(&self) -> usize {
        self.pending.len()
    }

    /// Remove an entity and release its GPU resources
    pub fn remove(&mut self, id: EntityId) -> bool {
        if self.picking.selected() == Some(id) {
            self.picking.select(None);
        }
        let removed = self.directory.remove(id, self.device.as_mut(), &mut self.registry);
        if removed {
            self.textures.evict_unused(self.device.as_mut());
        }
        removed
    }

    /// Release everything
    ///
    /// Textures go first, then cameras, objects and models, then shaders and
    /// the anti-alias target. Safe to call more than once.
    pub fn shutdown(&mut self) {
        for pending in self.pending.drain(..) {
            pending.handle.cancel();
        }
        self.picking.select(None);
        self.directory.shutdown(self.device.as_mut(), &mut self.registry, &mut self.textures);
        self.shaders.release_all(self.device.as_mut());
        if let Some(mut fbo) = self.framebuffer.take() {
            fbo.release(self.device.as_mut(), &mut self.registry);
        }
        log::info!("Engine shutdown complete");
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shared per-run state
    pub fn context(&self) -> &EngineContext {
        &self.context
    }

    /// Mutable per-run state
    pub fn context_mut(&mut self) -> &mut EngineContext {
        &mut self.context
    }

    /// Scene entities
    pub fn directory(&self) -> &SceneDirectory {
        &self.directory
    }

    /// Mutable scene entities
    pub fn directory_mut(&mut self) -> &mut SceneDirectory {
        &mut self.directory
    }

    /// Active camera, if any
    pub fn active_camera(&self) -> Option<&Camera> {
        self.directory.active_camera()
    }

    /// Hover, selection and gizmo state
    pub fn picking(&self) -> &PickingController {
        &self.picking
    }

    /// Mutable hover, selection and gizmo state
    pub fn picking_mut(&mut self) -> &mut PickingController {
        &mut self.picking
    }

    /// Physics switch
    pub fn physics_mut(&mut self) -> &mut PhysicsManager {
        &mut self.physics
    }

    /// Compiled programs
    pub fn shaders(&self) -> &ShaderLibrary {
        &self.shaders
    }

    /// Geometry bookkeeping
    pub fn registry(&self) -> &GeometryRegistry {
        &self.registry
    }

    /// Texture cache
    pub fn textures(&self) -> &TextureCache {
        &self.textures
    }

    /// Held keys
    pub fn keys(&self) -> &KeyState {
        &self.keys
    }

    /// Anti-alias target, when enabled
    pub fn framebuffer(&self) -> Option<&FrameBufferObject> {
        self.framebuffer.as_ref()
    }

    /// Fixed timestep driving the update pass
    pub fn timestep(&self) -> &FixedTimestep {
        &self.timestep
    }

    /// GPU device
    pub fn device_mut(&mut self) -> &mut dyn GpuDevice {
        self.device.as_mut()
    }
}

/// Engine-level errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Initialization error
    #[error("Engine initialization failed: {0}")]
    InitializationFailed(String),

    /// Rendering error
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Asset system error
    #[error(transparent)]
    Asset(#[from] AssetError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Application error
    #[error("Application error: {0}")]
    ApplicationError(String),
}
