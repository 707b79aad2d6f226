//! Imported multi-mesh models
//!
//! A [`Model3D`] owns one [`ModelMesh`] per imported mesh. All meshes share
//! the model's transforms, colour and click state; textures are shared with
//! every other entity through the texture cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::assets::ImportedScene;
use crate::backend::GpuDevice;
use crate::foundation::math::{Color, Vec3};
use crate::render::geometry::{GeometryHandles, GeometryLayout, GeometryRegistry};
use crate::render::mesh::MeshData;
use crate::render::shader::ShaderKey;
use crate::render::texture::{Texture, TextureCache};
use crate::render::RenderError;
use crate::scene::bounds::BoundingBox;
use crate::scene::entity::{
    draw_bounds, submit_geometry, visible_instances, Clickable, DrawContext, DrawOutcome, Drawable, Material,
    SceneEntity, UpdateContext, Updatable,
};
use crate::scene::transform::Transform;

/// One mesh of a model with its own GPU handles
#[derive(Debug)]
pub struct ModelMesh {
    /// Owned vertex and index data
    pub mesh: MeshData,
    /// GPU handles (zero until registered)
    pub geometry: GeometryHandles,
    /// Diffuse texture, if the material named one that loaded
    pub texture: Option<Rc<Texture>>,
}

/// A model imported from a file
#[derive(Debug)]
pub struct Model3D {
    tag: String,
    source: PathBuf,
    meshes: Vec<ModelMesh>,
    transforms: Vec<Transform>,
    textures_loaded: HashMap<PathBuf, Rc<Texture>>,
    shader: Option<ShaderKey>,
    color: Color,
    clickable: Clickable,
}

impl Model3D {
    /// Build a model from an import result
    ///
    /// Textures are acquired through `textures`; a texture that fails to
    /// load is logged and the mesh falls back to the model colour.
    pub fn from_import(scene: ImportedScene, device: &mut dyn GpuDevice, textures: &mut TextureCache) -> Self {
        let tag = scene
            .source
            .file_stem()
            .map_or_else(|| "model".to_string(), |s| s.to_string_lossy().into_owned());

        let mut textures_loaded: HashMap<PathBuf, Rc<Texture>> = HashMap::new();
        let mut meshes = Vec::with_capacity(scene.meshes.len());
        for imported in scene.meshes {
            let texture = imported.diffuse_texture.as_ref().and_then(|path| {
                if let Some(texture) = textures_loaded.get(path) {
                    return Some(Rc::clone(texture));
                }
                match textures.acquire(device, path) {
                    Ok(texture) => {
                        textures_loaded.insert(path.clone(), Rc::clone(&texture));
                        Some(texture)
                    }
                    Err(e) => {
                        log::warn!("Model '{}' texture {:?} unavailable: {}", tag, path, e);
                        None
                    }
                }
            });
            let mut mesh = MeshData::new(imported.vertices, imported.indices);
            mesh.has_normals = imported.has_normals;
            meshes.push(ModelMesh { mesh, geometry: GeometryHandles::default(), texture });
        }

        let mut transform = Transform::identity();
        transform.set_bounding_box(Self::bounds_of(&meshes));

        let color = Vec3::repeat(1.0);
        Self {
            tag,
            source: scene.source,
            meshes,
            transforms: vec![transform],
            textures_loaded,
            shader: None,
            color,
            clickable: Clickable::new(color),
        }
    }

    fn bounds_of(meshes: &[ModelMesh]) -> Option<BoundingBox> {
        meshes
            .iter()
            .filter_map(|m| BoundingBox::from_vertices(&m.mesh.vertices))
            .reduce(|a, b| BoundingBox::new(a.min.inf(&b.min), a.max.sup(&b.max)))
    }

    /// Builder: position of instance 0
    #[must_use]
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.transforms[0].set_position(position);
        self
    }

    /// Builder: uniform scale of instance 0
    #[must_use]
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.transforms[0].set_scale(scale);
        self
    }

    /// Builder: replace the instances; the bounding box moves to the new instance 0
    #[must_use]
    pub fn with_instances(mut self, instances: Vec<Transform>) -> Self {
        if instances.is_empty() {
            return self;
        }
        let bounds = self.transforms[0].take_bounding_box();
        self.transforms = instances;
        if self.transforms[0].bounding_box().is_none() {
            self.transforms[0].set_bounding_box(bounds);
        }
        self
    }

    /// Builder: base colour
    #[must_use]
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self.clickable.hover_color = color;
        self
    }

    /// Builder: program overriding the built-in one
    #[must_use]
    pub fn with_shader(mut self, shader: ShaderKey) -> Self {
        self.shader = Some(shader);
        self
    }

    /// Upload every mesh; on failure the meshes already uploaded are released
    pub fn register(&mut self, device: &mut dyn GpuDevice, registry: &mut GeometryRegistry) -> Result<(), RenderError> {
        let instance_count = self.transforms.len();
        for index in 0..self.meshes.len() {
            let entry = &mut self.meshes[index];
            if entry.geometry.is_bound() {
                continue;
            }
            let layout = GeometryLayout::for_mesh(&entry.mesh, instance_count);
            match registry.register(device, &entry.mesh, layout) {
                Ok(handles) => entry.geometry = handles,
                Err(e) => {
                    self.release(device, registry);
                    return Err(e);
                }
            }
        }
        log::info!("Registered model '{}' ({} meshes)", self.tag, self.meshes.len());
        Ok(())
    }

    /// Release every mesh's geometry and drop texture references
    pub fn release(&mut self, device: &mut dyn GpuDevice, registry: &mut GeometryRegistry) {
        for entry in &mut self.meshes {
            registry.release(device, &mut entry.geometry);
            entry.texture = None;
        }
        for transform in &mut self.transforms {
            if let Some(bounds) = transform.bounding_box_mut() {
                bounds.release(device, registry);
            }
        }
        self.textures_loaded.clear();
    }

    /// File the model was imported from
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Meshes in import order
    pub fn meshes(&self) -> &[ModelMesh] {
        &self.meshes
    }

    /// Every instance transform
    pub fn instances(&self) -> &[Transform] {
        &self.transforms
    }

    /// Mutable instance transforms
    pub fn instances_mut(&mut self) -> &mut [Transform] {
        &mut self.transforms
    }

    /// Distinct textures this model references
    pub fn texture_count(&self) -> usize {
        self.textures_loaded.len()
    }
}

impl SceneEntity for Model3D {
    fn tag(&self) -> &str {
        &self.tag
    }

    /// A model exists once every mesh is resident
    fn exists(&self) -> bool {
        !self.meshes.is_empty() && self.meshes.iter().all(|m| m.geometry.is_bound())
    }

    fn transform(&self) -> &Transform {
        &self.transforms[0]
    }

    fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transforms[0]
    }

    fn base_color(&self) -> Color {
        self.color
    }

    fn clickable(&self) -> &Clickable {
        &self.clickable
    }

    fn clickable_mut(&mut self) -> &mut Clickable {
        &mut self.clickable
    }
}

impl Drawable for Model3D {
    fn draw(&mut self, ctx: &mut DrawContext<'_>) -> Result<DrawOutcome, RenderError> {
        if !self.exists() {
            return Ok(DrawOutcome::Skipped);
        }
        let instanced = self.transforms.len() > 1;
        let matrices = visible_instances(&mut self.transforms, &ctx.frustum, true);
        if matrices.is_empty() {
            return Ok(DrawOutcome::Culled);
        }

        let mut outcome = DrawOutcome::Skipped;
        for entry in &mut self.meshes {
            let material = Material {
                shader: self.shader,
                texture: entry.texture.as_deref(),
                color: self.clickable.hover_color,
            };
            outcome = submit_geometry(ctx, &mut entry.geometry, &matrices, instanced, &material)?;
        }

        if ctx.show_bounds {
            draw_bounds(ctx, &mut self.transforms[0])?;
        }
        Ok(outcome)
    }
}

impl Updatable for Model3D {
    fn update(&mut self, _ctx: &UpdateContext) {
        for transform in &mut self.transforms {
            transform.refresh();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::ImportedMesh;
    use crate::backend::HeadlessDevice;
    use crate::render::mesh::Vertex;

    fn scene() -> ImportedScene {
        let mesh = |offset: f32| ImportedMesh {
            name: "part".into(),
            vertices: vec![
                Vertex::from_position([offset, 0.0, 0.0]),
                Vertex::from_position([offset + 1.0, 0.0, 0.0]),
                Vertex::from_position([offset, 1.0, 0.0]),
            ],
            indices: vec![0, 1, 2],
            has_normals: false,
            diffuse_texture: None,
        };
        ImportedScene { source: PathBuf::from("assets/ship.obj"), meshes: vec![mesh(0.0), mesh(4.0)] }
    }

    #[test]
    fn test_model_from_import() {
        let mut device = HeadlessDevice::new();
        let mut textures = TextureCache::new();
        let model = Model3D::from_import(scene(), &mut device, &mut textures);
        assert_eq!(model.tag(), "ship");
        assert_eq!(model.meshes().len(), 2);
        assert!(!model.exists());
        let bounds = model.bounding_box().unwrap();
        assert_eq!(bounds.max.x, 5.0);
        assert_eq!(model.base_color(), Vec3::repeat(1.0));
    }

    #[test]
    fn test_missing_texture_falls_back_to_color() {
        let mut device = HeadlessDevice::new();
        let mut textures = TextureCache::new();
        let mut imported = scene();
        imported.meshes[0].diffuse_texture = Some(PathBuf::from("does/not/exist.png"));
        let model = Model3D::from_import(imported, &mut device, &mut textures);
        assert!(model.meshes()[0].texture.is_none());
        assert_eq!(model.texture_count(), 0);
    }

    #[test]
    fn test_register_failure_leaves_nothing_resident() {
        let mut device = HeadlessDevice::new();
        let mut textures = TextureCache::new();
        let mut registry = GeometryRegistry::new();
        let mut model = Model3D::from_import(scene(), &mut device, &mut textures);

        device.set_fail_allocations(true);
        assert!(model.register(&mut device, &mut registry).is_err());
        assert!(!model.exists());
        assert_eq!(registry.live_count(), 0);

        device.set_fail_allocations(false);
        model.register(&mut device, &mut registry).unwrap();
        assert!(model.exists());
        assert_eq!(registry.live_count(), 2);
    }
}
