//! # Scene Object Directory
//!
//! The authoritative collection of live entities: scene objects, imported
//! models and cameras. Entities enter through the `add_*` methods, which
//! register their GPU geometry first and refuse the entity if that fails, so
//! the directory never holds a partially created entity.
//!
//! Iteration applies the existence predicate (geometry handles bound) before
//! handing out an entity, so anything mid-teardown is skipped.

use slotmap::{new_key_type, SlotMap};

use crate::backend::GpuDevice;
use crate::camera::Camera;
use crate::render::geometry::GeometryRegistry;
use crate::render::texture::TextureCache;
use crate::render::RenderError;
use crate::scene::entity::{DrawContext, DrawOutcome, Drawable, SceneEntity, UpdateContext, Updatable};
use crate::scene::model::Model3D;
use crate::scene::object::SceneObject;

new_key_type! {
    /// Key of a scene object
    pub struct ObjectKey;
    /// Key of an imported model
    pub struct ModelKey;
    /// Key of a camera
    pub struct CameraKey;
}

/// Any entity the directory owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityId {
    /// A [`SceneObject`]
    Object(ObjectKey),
    /// A [`Model3D`]
    Model(ModelKey),
    /// A [`Camera`] (through its billboard)
    Camera(CameraKey),
}

/// Per-frame render pass counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Entities submitted
    pub drawn: u32,
    /// Entities entirely outside the frustum
    pub culled: u32,
    /// Entities not resident or whose draw failed
    pub skipped: u32,
    /// Instances submitted over all draws
    pub instances: u32,
}

impl FrameStats {
    fn record(&mut self, tag: &str, result: Result<DrawOutcome, RenderError>) {
        match result {
            Ok(DrawOutcome::Drawn(instances)) => {
                self.drawn += 1;
                self.instances += instances;
            }
            Ok(DrawOutcome::Culled) => self.culled += 1,
            Ok(DrawOutcome::Skipped) => self.skipped += 1,
            Err(e) => {
                log::warn!("Draw of '{}' failed: {}", tag, e);
                self.skipped += 1;
            }
        }
    }
}

/// Owner of every live entity
#[derive(Debug, Default)]
pub struct SceneDirectory {
    objects: SlotMap<ObjectKey, SceneObject>,
    models: SlotMap<ModelKey, Model3D>,
    cameras: SlotMap<CameraKey, Camera>,
    active_camera: Option<CameraKey>,
}

impl SceneDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `object` and take ownership of it
    ///
    /// On failure the object is dropped and nothing stays allocated.
    pub fn add_object(
        &mut self,
        device: &mut dyn GpuDevice,
        registry: &mut GeometryRegistry,
        mut object: SceneObject,
    ) -> Result<ObjectKey, RenderError> {
        if let Err(e) = object.register(device, registry) {
            log::error!("Scene object '{}' not created: {}", object.tag(), e);
            return Err(e);
        }
        Ok(self.objects.insert(object))
    }

    /// Register `model` and take ownership of it
    pub fn add_model(
        &mut self,
        device: &mut dyn GpuDevice,
        registry: &mut GeometryRegistry,
        mut model: Model3D,
    ) -> Result<ModelKey, RenderError> {
        if let Err(e) = model.register(device, registry) {
            log::error!("Model '{}' not created: {}", model.tag(), e);
            return Err(e);
        }
        Ok(self.models.insert(model))
    }

    /// Register `camera`; the first camera added becomes active
    pub fn add_camera(
        &mut self,
        device: &mut dyn GpuDevice,
        registry: &mut GeometryRegistry,
        mut camera: Camera,
    ) -> Result<CameraKey, RenderError> {
        if let Err(e) = camera.register(device, registry) {
            log::error!("Camera not created: {}", e);
            return Err(e);
        }
        let key = self.cameras.insert(camera);
        if self.active_camera.is_none() {
            self.active_camera = Some(key);
        }
        Ok(key)
    }

    /// Remove an entity and release its GPU resources
    ///
    /// # Returns
    /// `false` if the entity was already gone; the second removal of the
    /// same id releases nothing.
    pub fn remove(&mut self, id: EntityId, device: &mut dyn GpuDevice, registry: &mut GeometryRegistry) -> bool {
        match id {
            EntityId::Object(key) => self.objects.remove(key).map(|mut o| o.release(device, registry)).is_some(),
            EntityId::Model(key) => self.models.remove(key).map(|mut m| m.release(device, registry)).is_some(),
            EntityId::Camera(key) => {
                if self.active_camera == Some(key) {
                    self.active_camera = None;
                }
                self.cameras.remove(key).map(|mut c| c.release(device, registry)).is_some()
            }
        }
    }

    /// Entity by id, whether or not it is resident
    pub fn get(&self, id: EntityId) -> Option<&dyn SceneEntity> {
        match id {
            EntityId::Object(key) => self.objects.get(key).map(|o| o as &dyn SceneEntity),
            EntityId::Model(key) => self.models.get(key).map(|m| m as &dyn SceneEntity),
            EntityId::Camera(key) => self.cameras.get(key).map(|c| c as &dyn SceneEntity),
        }
    }

    /// Mutable entity by id
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut dyn SceneEntity> {
        match id {
            EntityId::Object(key) => self.objects.get_mut(key).map(|o| o as &mut dyn SceneEntity),
            EntityId::Model(key) => self.models.get_mut(key).map(|m| m as &mut dyn SceneEntity),
            EntityId::Camera(key) => self.cameras.get_mut(key).map(|c| c as &mut dyn SceneEntity),
        }
    }

    /// Existence predicate for an id
    pub fn exists(&self, id: EntityId) -> bool {
        self.get(id).is_some_and(|e| e.exists())
    }

    /// Scene object by key
    pub fn object(&self, key: ObjectKey) -> Option<&SceneObject> {
        self.objects.get(key)
    }

    /// Mutable scene object by key
    pub fn object_mut(&mut self, key: ObjectKey) -> Option<&mut SceneObject> {
        self.objects.get_mut(key)
    }

    /// Model by key
    pub fn model(&self, key: ModelKey) -> Option<&Model3D> {
        self.models.get(key)
    }

    /// Mutable model by key
    pub fn model_mut(&mut self, key: ModelKey) -> Option<&mut Model3D> {
        self.models.get_mut(key)
    }

    /// Camera by key
    pub fn camera(&self, key: CameraKey) -> Option<&Camera> {
        self.cameras.get(key)
    }

    /// Mutable camera by key
    pub fn camera_mut(&mut self, key: CameraKey) -> Option<&mut Camera> {
        self.cameras.get_mut(key)
    }

    /// Key of the camera driving view and projection
    pub fn active_camera_key(&self) -> Option<CameraKey> {
        self.active_camera
    }

    /// The camera driving view and projection
    pub fn active_camera(&self) -> Option<&Camera> {
        self.active_camera.and_then(|key| self.cameras.get(key))
    }

    /// Mutable active camera
    pub fn active_camera_mut(&mut self) -> Option<&mut Camera> {
        self.active_camera.and_then(|key| self.cameras.get_mut(key))
    }

    /// Switch the active camera; `false` if `key` is not a live camera
    pub fn set_active_camera(&mut self, key: CameraKey) -> bool {
        if !self.cameras.contains_key(key) {
            return false;
        }
        self.active_camera = Some(key);
        true
    }

    /// Ids of every resident entity, objects first, then models, then cameras
    pub fn entity_ids(&self) -> Vec<EntityId> {
        let objects = self.objects.iter().filter(|(_, o)| o.exists()).map(|(k, _)| EntityId::Object(k));
        let models = self.models.iter().filter(|(_, m)| m.exists()).map(|(k, _)| EntityId::Model(k));
        let cameras = self.cameras.iter().filter(|(_, c)| c.exists()).map(|(k, _)| EntityId::Camera(k));
        objects.chain(models).chain(cameras).collect()
    }

    /// Ids of resident entities hover and click tests apply to
    ///
    /// The active camera is excluded: it is never drawn, so it cannot be
    /// under the cursor.
    pub fn pickable_ids(&self) -> Vec<EntityId> {
        let active = self.active_camera.map(EntityId::Camera);
        self.entity_ids()
            .into_iter()
            .filter(|id| Some(*id) != active)
            .filter(|id| self.get(*id).is_some_and(|e| e.is_pickable()))
            .collect()
    }

    /// Visit every resident entity
    pub fn for_each_visible<F>(&mut self, mut f: F)
    where
        F: FnMut(EntityId, &mut dyn SceneEntity),
    {
        for (key, object) in self.objects.iter_mut().filter(|(_, o)| o.exists()) {
            f(EntityId::Object(key), object);
        }
        for (key, model) in self.models.iter_mut().filter(|(_, m)| m.exists()) {
            f(EntityId::Model(key), model);
        }
        for (key, camera) in self.cameras.iter_mut().filter(|(_, c)| c.exists()) {
            f(EntityId::Camera(key), camera);
        }
    }

    /// Advance every resident entity one tick
    pub fn update_all(&mut self, ctx: &UpdateContext) {
        for object in self.objects.values_mut().filter(|o| o.exists()) {
            object.update(ctx);
        }
        for model in self.models.values_mut().filter(|m| m.exists()) {
            model.update(ctx);
        }
        for camera in self.cameras.values_mut().filter(|c| c.exists()) {
            Updatable::update(camera, ctx);
        }
    }

    /// Draw every resident entity except the active camera's billboard
    pub fn render(&mut self, ctx: &mut DrawContext<'_>) -> FrameStats {
        let mut stats = FrameStats::default();
        for object in self.objects.values_mut() {
            let result = object.draw(ctx);
            stats.record(object.tag(), result);
        }
        for model in self.models.values_mut() {
            let result = model.draw(ctx);
            stats.record(model.tag(), result);
        }
        for (key, camera) in &mut self.cameras {
            if Some(key) == self.active_camera {
                continue;
            }
            let result = camera.billboard_mut().draw(ctx);
            stats.record(camera.tag(), result);
        }
        stats
    }

    /// Number of scene objects
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Number of models
    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Number of cameras
    pub fn camera_count(&self) -> usize {
        self.cameras.len()
    }

    /// True when nothing is held
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.models.is_empty() && self.cameras.is_empty()
    }

    /// Tear everything down
    ///
    /// Order: textures, then cameras, then objects and models, then the
    /// directory's own storage.
    pub fn shutdown(&mut self, device: &mut dyn GpuDevice, registry: &mut GeometryRegistry, textures: &mut TextureCache) {
        log::info!(
            "Shutting down scene: {} objects, {} models, {} cameras, {} textures",
            self.objects.len(),
            self.models.len(),
            self.cameras.len(),
            textures.len()
        );
        textures.release_all(device);
        for camera in self.cameras.values_mut() {
            camera.release(device, registry);
        }
        for object in self.objects.values_mut() {
            object.release(device, registry);
        }
        for model in self.models.values_mut() {
            model.release(device, registry);
        }
        self.active_camera = None;
        self.cameras.clear();
        self.objects.clear();
        self.models.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessDevice;
    use crate::camera::CameraConfig;
    use crate::foundation::math::Vec3;
    use crate::scene::transform::Transform;
    use crate::render::mesh::{MeshData, Vertex};
    use crate::render::shader::ShaderLibrary;
    use crate::scene::object::ObjectType;
    use crate::scene::primitives;
    use std::path::Path;

    struct Fixture {
        device: HeadlessDevice,
        registry: GeometryRegistry,
        directory: SceneDirectory,
    }

    fn fixture() -> Fixture {
        Fixture { device: HeadlessDevice::new(), registry: GeometryRegistry::new(), directory: SceneDirectory::new() }
    }

    #[test]
    fn test_plane_exists_between_add_and_remove() {
        let mut fx = fixture();
        let plane = primitives::plane().with_position(Vec3::zeros()).with_scale(Vec3::repeat(100.0));
        let key = fx.directory.add_object(&mut fx.device, &mut fx.registry, plane).unwrap();
        let id = EntityId::Object(key);
        assert!(fx.directory.exists(id));

        assert!(fx.directory.remove(id, &mut fx.device, &mut fx.registry));
        assert!(!fx.directory.exists(id));
        assert!(!fx.directory.remove(id, &mut fx.device, &mut fx.registry));
        assert_eq!(fx.device.invalid_deletes(), 0);
        assert_eq!(fx.device.live_handles(), 0);
    }

    #[test]
    fn test_failed_registration_adds_nothing() {
        let mut fx = fixture();
        fx.device.set_fail_allocations(true);
        let result = fx.directory.add_object(&mut fx.device, &mut fx.registry, primitives::cube(None));
        assert!(result.is_err());
        assert!(fx.directory.is_empty());
    }

    #[test]
    fn test_first_camera_is_active() {
        let mut fx = fixture();
        let config = CameraConfig::default();
        let first = fx.directory.add_camera(&mut fx.device, &mut fx.registry, Camera::new(Vec3::zeros(), &config)).unwrap();
        let second = fx
            .directory
            .add_camera(&mut fx.device, &mut fx.registry, Camera::new(Vec3::new(0.0, 0.0, -30.0), &config))
            .unwrap();
        assert_eq!(fx.directory.active_camera_key(), Some(first));
        assert!(!fx.directory.pickable_ids().contains(&EntityId::Camera(first)));
        assert!(fx.directory.pickable_ids().contains(&EntityId::Camera(second)));

        assert!(fx.directory.set_active_camera(second));
        fx.directory.remove(EntityId::Camera(second), &mut fx.device, &mut fx.registry);
        assert_eq!(fx.directory.active_camera_key(), None);
    }

    #[test]
    fn test_render_skips_active_camera_and_culls() {
        let mut fx = fixture();
        let shaders = ShaderLibrary::load_builtin(&mut fx.device, Path::new("missing-shader-dir"));
        let config = CameraConfig::default();
        fx.directory.add_camera(&mut fx.device, &mut fx.registry, Camera::new(Vec3::zeros(), &config)).unwrap();
        let visible = primitives::cube(None).with_position(Vec3::new(0.0, 0.0, -50.0));
        let hidden = primitives::cube(None).with_position(Vec3::new(0.0, 0.0, 50.0));
        fx.directory.add_object(&mut fx.device, &mut fx.registry, visible).unwrap();
        fx.directory.add_object(&mut fx.device, &mut fx.registry, hidden).unwrap();

        let camera = fx.directory.active_camera().unwrap();
        let (view, projection) = (camera.view(), camera.projection());
        let frustum = *camera.frustum();
        let mut ctx = DrawContext {
            device: &mut fx.device,
            registry: &mut fx.registry,
            shaders: &shaders,
            view,
            projection,
            frustum,
            show_bounds: false,
        };
        let stats = fx.directory.render(&mut ctx);
        assert_eq!(stats.drawn, 1);
        assert_eq!(stats.culled, 1);
    }

    #[test]
    fn test_instanced_draw_uploads_only_visible_instances() {
        let mut fx = fixture();
        let shaders = ShaderLibrary::load_builtin(&mut fx.device, Path::new("missing-shader-dir"));
        let instances = (0..4)
            .map(|i| Transform::from_position(Vec3::new(0.0, 0.0, if i % 2 == 0 { -50.0 } else { 50.0 })))
            .collect();
        let cubes = primitives::cube(None).with_instances(instances);
        fx.directory.add_object(&mut fx.device, &mut fx.registry, cubes).unwrap();

        let camera = Camera::new(Vec3::zeros(), &CameraConfig::default());
        let mut ctx = DrawContext {
            device: &mut fx.device,
            registry: &mut fx.registry,
            shaders: &shaders,
            view: camera.view(),
            projection: camera.projection(),
            frustum: *camera.frustum(),
            show_bounds: false,
        };
        let stats = fx.directory.render(&mut ctx);
        assert_eq!(stats.instances, 2);
        assert_eq!(fx.device.draws().last().map(|d| d.instances), Some(2));
    }

    #[test]
    fn test_instances_cull_with_shared_mesh_extent() {
        let mut fx = fixture();
        let shaders = ShaderLibrary::load_builtin(&mut fx.device, Path::new("missing-shader-dir"));
        let offset = MeshData::new(
            vec![
                Vertex::from_position([-21.0, -0.5, 0.0]),
                Vertex::from_position([-20.0, -0.5, 0.0]),
                Vertex::from_position([-20.5, 0.5, 0.0]),
            ],
            vec![0, 1, 2],
        );
        // Instance 0 is far off to the side; instance 1 sits outside the
        // frustum but its geometry, 20 units to the left, is in view.
        let instances = vec![
            Transform::from_position(Vec3::new(200.0, 0.0, -50.0)),
            Transform::from_position(Vec3::new(26.0, 0.0, -50.0)),
        ];
        let object = SceneObject::new("offset", ObjectType::OBJECT_3D, offset).with_instances(instances);
        fx.directory.add_object(&mut fx.device, &mut fx.registry, object).unwrap();

        let camera = Camera::new(Vec3::zeros(), &CameraConfig::default());
        let mut ctx = DrawContext {
            device: &mut fx.device,
            registry: &mut fx.registry,
            shaders: &shaders,
            view: camera.view(),
            projection: camera.projection(),
            frustum: *camera.frustum(),
            show_bounds: false,
        };
        let stats = fx.directory.render(&mut ctx);
        assert_eq!(stats.drawn, 1);
        assert_eq!(stats.instances, 1);
        assert_eq!(fx.device.draws().last().map(|d| d.instances), Some(1));
    }

    #[test]
    fn test_shutdown_releases_everything() {
        let mut fx = fixture();
        let mut textures = TextureCache::new();
        let image = crate::assets::TextureImage::solid_color(2, 2, [255, 255, 255, 255]);
        let texture = textures.insert_image(&mut fx.device, "grass_block.png", &image).unwrap();
        fx.directory.add_object(&mut fx.device, &mut fx.registry, primitives::cube(Some(texture))).unwrap();
        fx.directory
            .add_camera(&mut fx.device, &mut fx.registry, Camera::new(Vec3::zeros(), &CameraConfig::default()))
            .unwrap();

        fx.directory.shutdown(&mut fx.device, &mut fx.registry, &mut textures);
        assert!(fx.directory.is_empty());
        assert!(textures.is_empty());
        assert_eq!(fx.device.live_handles(), 0);
        assert_eq!(fx.device.invalid_deletes(), 0);
    }
}
