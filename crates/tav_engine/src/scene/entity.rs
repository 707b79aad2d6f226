//! Capabilities shared by everything the directory holds
//!
//! Entities no longer carry draw/update function pointers. Each variant
//! (scene object, model, camera billboard, anti-alias quad) implements the
//! subset of [`Drawable`], [`Updatable`] and [`SceneEntity`] that applies to
//! it, and the render and update passes dispatch through these traits.

use std::fmt;

use crate::backend::{GpuDevice, PrimitiveMode, TextureId, VertexArrayId};
use crate::camera::Frustum;
use crate::foundation::math::{Color, Mat4};
use crate::render::geometry::{GeometryHandles, GeometryRegistry};
use crate::render::shader::{ShaderKey, ShaderLibrary};
use crate::render::texture::Texture;
use crate::render::RenderError;
use crate::scene::bounds::BoundingBox;
use crate::scene::directory::EntityId;
use crate::scene::transform::Transform;

/// Per-frame state handed to every draw
pub struct DrawContext<'a> {
    /// GPU device
    pub device: &'a mut dyn GpuDevice,
    /// Geometry registry (for lazily uploaded debug lines)
    pub registry: &'a mut GeometryRegistry,
    /// Shader programs
    pub shaders: &'a ShaderLibrary,
    /// Active camera view matrix
    pub view: Mat4,
    /// Active camera projection matrix
    pub projection: Mat4,
    /// Active camera frustum
    pub frustum: Frustum,
    /// Draw bounding-box outlines
    pub show_bounds: bool,
}

/// Per-tick state handed to every update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateContext {
    /// Slack reported by the fixed timestep (seconds)
    pub delta_time: f32,
    /// Clock time of this tick (seconds)
    pub time: f64,
}

/// What a draw call ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    /// Submitted; carries the number of instances drawn
    Drawn(u32),
    /// Entirely outside the frustum
    Culled,
    /// Not resident on the GPU
    Skipped,
}

/// Something the render pass can submit
pub trait Drawable {
    /// Submit draw calls for the current frame
    fn draw(&mut self, ctx: &mut DrawContext<'_>) -> Result<DrawOutcome, RenderError>;
}

/// Something the update pass advances
pub trait Updatable {
    /// Advance one fixed tick
    fn update(&mut self, ctx: &UpdateContext);
}

/// Event passed to click callbacks
#[derive(Debug, Clone, PartialEq)]
pub struct ClickEvent {
    /// Entity that was clicked
    pub entity: EntityId,
    /// Its debug tag
    pub tag: String,
}

/// Callback fired once per release over a hovered entity
pub type ClickCallback = Box<dyn FnMut(&ClickEvent)>;

/// Hover and click state of a pickable entity
pub struct Clickable {
    /// Whether the cursor is over the entity
    pub is_hovered: bool,
    /// Colour currently drawn, eased toward the hover target
    pub hover_color: Color,
    /// Whether picking considers this entity at all
    pub pickable: bool,
    on_click: Option<ClickCallback>,
}

impl fmt::Debug for Clickable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clickable")
            .field("is_hovered", &self.is_hovered)
            .field("hover_color", &self.hover_color)
            .field("pickable", &self.pickable)
            .field("on_click", &self.on_click.is_some())
            .finish()
    }
}

impl Clickable {
    /// Pickable state starting at `color`
    pub fn new(color: Color) -> Self {
        Self { is_hovered: false, hover_color: color, pickable: true, on_click: None }
    }

    /// State for entities picking must ignore
    pub fn inert(color: Color) -> Self {
        Self { pickable: false, ..Self::new(color) }
    }

    /// Install the click callback
    pub fn set_on_click(&mut self, callback: ClickCallback) {
        self.on_click = Some(callback);
    }

    /// True when a callback is installed
    pub fn has_on_click(&self) -> bool {
        self.on_click.is_some()
    }

    /// Run the callback if one is installed
    pub fn fire(&mut self, event: &ClickEvent) -> bool {
        match self.on_click.as_mut() {
            Some(callback) => {
                callback(event);
                true
            }
            None => false,
        }
    }
}

/// Common view of every directory entity
pub trait SceneEntity {
    /// Debug name
    fn tag(&self) -> &str;

    /// Existence predicate: GPU geometry is resident
    fn exists(&self) -> bool;

    /// Canonical transform (instance 0)
    fn transform(&self) -> &Transform;

    /// Mutable canonical transform
    fn transform_mut(&mut self) -> &mut Transform;

    /// Base colour
    fn base_color(&self) -> Color;

    /// Hover and click state
    fn clickable(&self) -> &Clickable;

    /// Mutable hover and click state
    fn clickable_mut(&mut self) -> &mut Clickable;

    /// Local bounding box of instance 0
    fn bounding_box(&self) -> Option<&BoundingBox> {
        self.transform().bounding_box()
    }

    /// Whether hover and click tests apply
    fn is_pickable(&self) -> bool {
        self.exists() && self.clickable().pickable
    }
}

/// Material inputs of one draw
pub(crate) struct Material<'a> {
    pub shader: Option<ShaderKey>,
    pub texture: Option<&'a Texture>,
    pub color: Color,
}

/// Model matrices of the instances that survive culling
pub(crate) fn visible_instances(transforms: &mut [Transform], frustum: &Frustum, cull: bool) -> Vec<Mat4> {
    let mesh_radius = transforms.first().and_then(Transform::bounding_box).map(BoundingBox::radius);
    transforms
        .iter_mut()
        .filter_map(|t| {
            let radius = t.scaled_radius(mesh_radius);
            let matrix = t.refresh();
            (!cull || frustum.is_visible(&t.position(), radius)).then_some(matrix)
        })
        .collect()
}

/// Bind geometry and material and issue the draw
pub(crate) fn submit_geometry(
    ctx: &mut DrawContext<'_>,
    geometry: &mut GeometryHandles,
    matrices: &[Mat4],
    instanced: bool,
    material: &Material<'_>,
) -> Result<DrawOutcome, RenderError> {
    if !geometry.is_bound() {
        return Ok(DrawOutcome::Skipped);
    }
    if matrices.is_empty() {
        return Ok(DrawOutcome::Culled);
    }

    let shader = ctx.shaders.resolve(material.shader, instanced)?;
    shader.use_program(ctx.device);
    shader.set_mat4(ctx.device, "projection", ctx.projection);
    shader.set_mat4(ctx.device, "view", ctx.view);

    if instanced {
        ctx.registry.update_instance_buffer(ctx.device, geometry, matrices)?;
    } else {
        shader.set_mat4(ctx.device, "model", matrices[0]);
    }

    match material.texture.map(Texture::id).filter(|id| !id.is_null()) {
        Some(id) => {
            shader.set_bool(ctx.device, "useTexture", true);
            shader.set_int(ctx.device, "texture1", 0);
            ctx.device.bind_texture(0, id);
        }
        None => {
            shader.set_bool(ctx.device, "useTexture", false);
            shader.set_vec3(ctx.device, "color", material.color);
        }
    }

    ctx.device.bind_vertex_array(geometry.vertex_array);
    let instances = if instanced { matrices.len() as u32 } else { 1 };
    match (geometry.index_count > 0, instanced) {
        (true, true) => ctx.device.draw_elements_instanced(PrimitiveMode::Triangles, geometry.index_count, instances),
        (true, false) => ctx.device.draw_elements(PrimitiveMode::Triangles, geometry.index_count),
        (false, _) => ctx.device.draw_arrays(PrimitiveMode::Triangles, geometry.vertex_count),
    }
    ctx.device.bind_vertex_array(VertexArrayId::NULL);
    ctx.device.bind_texture(0, TextureId::NULL);

    Ok(DrawOutcome::Drawn(instances))
}

/// Draw the outline of instance 0's bounding box
pub(crate) fn draw_bounds(ctx: &mut DrawContext<'_>, transform: &mut Transform) -> Result<(), RenderError> {
    let model = transform.refresh();
    let Some(bounds) = transform.bounding_box_mut() else { return Ok(()) };
    bounds.upload_lines(ctx.device, ctx.registry)?;

    let shader = ctx.shaders.resolve(None, false)?;
    shader.use_program(ctx.device);
    shader.set_mat4(ctx.device, "projection", ctx.projection);
    shader.set_mat4(ctx.device, "view", ctx.view);
    shader.set_mat4(ctx.device, "model", model);
    shader.set_bool(ctx.device, "useTexture", false);
    shader.set_vec3(ctx.device, "color", bounds.color);

    ctx.device.bind_vertex_array(bounds.lines().vertex_array);
    ctx.device.draw_elements(PrimitiveMode::Lines, bounds.lines().index_count);
    ctx.device.bind_vertex_array(VertexArrayId::NULL);
    Ok(())
}
