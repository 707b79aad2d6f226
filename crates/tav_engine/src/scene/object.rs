//! Scene objects: owned mesh, transforms and material of one drawable
//!
//! A [`SceneObject`] is created CPU-side with builder methods and becomes
//! resident once [`SceneObject::register`] uploads its geometry. Its
//! existence predicate is simply whether those handles are bound.

use std::rc::Rc;

use bitflags::bitflags;

use crate::backend::GpuDevice;
use crate::foundation::math::{Color, Vec3};
use crate::render::geometry::{GeometryHandles, GeometryLayout, GeometryRegistry};
use crate::render::mesh::MeshData;
use crate::render::shader::ShaderKey;
use crate::render::texture::Texture;
use crate::render::RenderError;
use crate::scene::bounds::BoundingBox;
use crate::scene::entity::{
    draw_bounds, submit_geometry, visible_instances, ClickCallback, Clickable, DrawContext, DrawOutcome, Drawable,
    Material, SceneEntity, UpdateContext, Updatable,
};
use crate::scene::transform::Transform;

bitflags! {
    /// What kind of thing an object is; flags combine (a camera billboard is `CAMERA | SPRITE`)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ObjectType: u32 {
        /// Light source marker
        const LIGHT = 1 << 0;
        /// Regular 3D mesh
        const OBJECT_3D = 1 << 1;
        /// Flat 2D shape
        const OBJECT_2D = 1 << 2;
        /// Belongs to a camera
        const CAMERA = 1 << 3;
        /// Camera-facing sprite
        const SPRITE = 1 << 4;
        /// Ground plane
        const FLOOR = 1 << 5;
        /// Full-screen anti-alias quad
        const FRAMEBUFFER_QUAD = 1 << 6;
    }
}

impl ObjectType {
    /// Whether draws test instances against the frustum
    pub fn is_culled(self) -> bool {
        !self.contains(Self::FRAMEBUFFER_QUAD)
    }

    /// Whether hover and click tests may select it
    pub fn is_pickable(self) -> bool {
        !self.contains(Self::FRAMEBUFFER_QUAD)
    }
}

/// A drawable mesh with its own transforms and material
#[derive(Debug)]
pub struct SceneObject {
    tag: String,
    kind: ObjectType,
    mesh: MeshData,
    transforms: Vec<Transform>,
    geometry: GeometryHandles,
    shader: Option<ShaderKey>,
    texture: Option<Rc<Texture>>,
    color: Color,
    clickable: Clickable,
}

impl SceneObject {
    /// Create an object owning `mesh`, with one identity instance
    ///
    /// The bounding box is derived from the mesh vertices and attached to
    /// instance 0.
    pub fn new(tag: impl Into<String>, kind: ObjectType, mesh: MeshData) -> Self {
        let mut transform = Transform::identity();
        transform.set_bounding_box(BoundingBox::from_vertices(&mesh.vertices));
        let color = Vec3::repeat(1.0);
        let clickable = if kind.is_pickable() { Clickable::new(color) } else { Clickable::inert(color) };
        Self {
            tag: tag.into(),
            kind,
            mesh,
            transforms: vec![transform],
            geometry: GeometryHandles::default(),
            shader: None,
            texture: None,
            color,
            clickable,
        }
    }

    /// Builder: position of instance 0
    #[must_use]
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.transforms[0].set_position(position);
        self
    }

    /// Builder: rotation of instance 0
    #[must_use]
    pub fn with_rotation(mut self, axis: Vec3, degrees: f32) -> Self {
        self.transforms[0].set_rotation(axis, degrees);
        self
    }

    /// Builder: scale of instance 0
    #[must_use]
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.transforms[0].set_scale(scale);
        self
    }

    /// Builder: replace the instances; the bounding box moves to the new instance 0
    ///
    /// An empty list is ignored.
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

    /// Builder: base colour (also the initial hover colour)
    #[must_use]
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self.clickable.hover_color = color;
        self
    }

    /// Builder: texture shared through the cache
    #[must_use]
    pub fn with_texture(mut self, texture: Rc<Texture>) -> Self {
        self.texture = Some(texture);
        self
    }

    /// Builder: program overriding the built-in one
    #[must_use]
    pub fn with_shader(mut self, shader: ShaderKey) -> Self {
        self.shader = Some(shader);
        self
    }

    /// Builder: click callback
    #[must_use]
    pub fn with_on_click(mut self, callback: ClickCallback) -> Self {
        self.clickable.set_on_click(callback);
        self
    }

    /// Upload geometry; a no-op when already resident
    pub fn register(&mut self, device: &mut dyn GpuDevice, registry: &mut GeometryRegistry) -> Result<(), RenderError> {
        if self.geometry.is_bound() {
            return Ok(());
        }
        let layout = GeometryLayout::for_mesh(&self.mesh, self.transforms.len());
        self.geometry = registry.register(device, &self.mesh, layout)?;
        log::debug!("Registered '{}' ({} instances)", self.tag, self.transforms.len());
        Ok(())
    }

    /// Release geometry and debug lines, and drop the texture reference
    ///
    /// Safe to call more than once.
    pub fn release(&mut self, device: &mut dyn GpuDevice, registry: &mut GeometryRegistry) {
        registry.release(device, &mut self.geometry);
        for transform in &mut self.transforms {
            if let Some(bounds) = transform.bounding_box_mut() {
                bounds.release(device, registry);
            }
        }
        self.texture = None;
    }

    /// Kind flags
    pub fn kind(&self) -> ObjectType {
        self.kind
    }

    /// Owned mesh data
    pub fn mesh(&self) -> &MeshData {
        &self.mesh
    }

    /// GPU handles (zero until registered)
    pub fn geometry(&self) -> &GeometryHandles {
        &self.geometry
    }

    /// Every instance transform
    pub fn instances(&self) -> &[Transform] {
        &self.transforms
    }

    /// Mutable instance transforms; the count is fixed once registered
    pub fn instances_mut(&mut self) -> &mut [Transform] {
        &mut self.transforms
    }

    /// Number of instances
    pub fn instance_count(&self) -> usize {
        self.transforms.len()
    }

    /// Shared texture, if any
    pub fn texture(&self) -> Option<&Rc<Texture>> {
        self.texture.as_ref()
    }

    /// Program override, if any
    pub fn shader(&self) -> Option<ShaderKey> {
        self.shader
    }

    /// Change the base colour without touching the hover state
    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }
}

impl SceneEntity for SceneObject {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn exists(&self) -> bool {
        self.geometry.is_bound()
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

impl Drawable for SceneObject {
    fn draw(&mut self, ctx: &mut DrawContext<'_>) -> Result<DrawOutcome, RenderError> {
        if !self.geometry.is_bound() {
            return Ok(DrawOutcome::Skipped);
        }
        let instanced = self.transforms.len() > 1;
        let matrices = visible_instances(&mut self.transforms, &ctx.frustum, self.kind.is_culled());

        let material = Material {
            shader: self.shader,
            texture: self.texture.as_deref(),
            color: self.clickable.hover_color,
        };
        let outcome = submit_geometry(ctx, &mut self.geometry, &matrices, instanced, &material)?;

        if ctx.show_bounds && matches!(outcome, DrawOutcome::Drawn(_)) {
            draw_bounds(ctx, &mut self.transforms[0])?;
        }
        Ok(outcome)
    }
}

impl Updatable for SceneObject {
    fn update(&mut self, _ctx: &UpdateContext) {
        for transform in &mut self.transforms {
            transform.refresh();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessDevice;
    use crate::render::mesh::Vertex;

    fn triangle() -> MeshData {
        MeshData::new(
            vec![
                Vertex::from_position([-0.5, -0.5, 0.0]),
                Vertex::from_position([0.5, -0.5, 0.0]),
                Vertex::from_position([0.0, 0.5, 0.0]),
            ],
            vec![0, 1, 2],
        )
    }

    #[test]
    fn test_exists_follows_registration() {
        let mut device = HeadlessDevice::new();
        let mut registry = GeometryRegistry::new();
        let mut object = SceneObject::new("tri", ObjectType::OBJECT_2D, triangle());
        assert!(!object.exists());

        object.register(&mut device, &mut registry).unwrap();
        assert!(object.exists());

        object.release(&mut device, &mut registry);
        assert!(!object.exists());
        object.release(&mut device, &mut registry);
        assert_eq!(device.invalid_deletes(), 0);
    }

    #[test]
    fn test_bounding_box_follows_instances() {
        let instances = vec![
            Transform::from_position(Vec3::new(1.0, 0.0, 0.0)),
            Transform::from_position(Vec3::new(2.0, 0.0, 0.0)),
        ];
        let object = SceneObject::new("tri", ObjectType::OBJECT_3D, triangle()).with_instances(instances);
        assert_eq!(object.instance_count(), 2);
        assert!(object.instances()[0].bounding_box().is_some());
        assert!(object.instances()[1].bounding_box().is_none());
    }

    #[test]
    fn test_kind_flags() {
        assert!(!ObjectType::FRAMEBUFFER_QUAD.is_culled());
        assert!(!ObjectType::FRAMEBUFFER_QUAD.is_pickable());
        assert!((ObjectType::CAMERA | ObjectType::SPRITE).is_pickable());
        assert!(ObjectType::OBJECT_3D.is_pickable());
    }

    #[test]
    fn test_color_sets_hover_start() {
        let object = SceneObject::new("tri", ObjectType::OBJECT_3D, triangle()).with_color(Vec3::new(0.0, 1.0, 1.0));
        assert_eq!(object.clickable().hover_color, Vec3::new(0.0, 1.0, 1.0));
    }
}
