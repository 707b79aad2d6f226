//! # GPU Device Abstraction
//!
//! Defines the [`GpuDevice`] trait that concrete graphics drivers implement.
//!
//! ## Conventions
//!
//! - **Handles**: every resource is a `u32` newtype; zero is the null handle
//!   and is never returned for a successful allocation.
//! - **Binding state**: operations act on whatever is currently bound, exactly
//!   like the underlying API. Callers re-bind before every use and never assume
//!   bindings survive a call into another subsystem.
//! - **Failure**: allocation failure is reported by returning the null handle.
//!   Operations never panic.

use crate::foundation::math::{Mat2, Mat3, Mat4, Vec2, Vec3, Vec4};
use crate::assets::TextureImage;

macro_rules! gpu_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            /// The unbound handle
            pub const NULL: Self = Self(0);

            /// True for the unbound handle
            pub fn is_null(self) -> bool {
                self.0 == 0
            }
        }
    };
}

gpu_handle!(
    /// Vertex array object handle
    VertexArrayId
);
gpu_handle!(
    /// Buffer object handle (vertex, index or instance data)
    BufferId
);
gpu_handle!(
    /// Texture handle
    TextureId
);
gpu_handle!(
    /// Linked shader program handle
    ProgramId
);
gpu_handle!(
    /// Framebuffer object handle
    FramebufferId
);
gpu_handle!(
    /// Renderbuffer handle
    RenderbufferId
);

/// Buffer binding points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Per-vertex or per-instance attribute data
    Array,
    /// Index data, captured by the bound vertex array
    ElementArray,
}

/// Expected update frequency of a buffer's contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Uploaded once, drawn many times
    StaticDraw,
    /// Refreshed every frame
    DynamicDraw,
}

/// Framebuffer binding points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramebufferTarget {
    /// Read and draw
    Both,
    /// Source of a blit
    Read,
    /// Destination of a blit
    Draw,
}

/// Primitive assembly mode for draw calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveMode {
    /// Independent triangles
    Triangles,
    /// Independent line segments
    Lines,
}

/// One float attribute slot of a vertex array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Shader attribute location
    pub location: u32,
    /// Number of float components (1-4)
    pub components: u32,
    /// Byte distance between consecutive elements
    pub stride: usize,
    /// Byte offset of the first element
    pub offset: usize,
    /// 0 advances per vertex, 1 advances once per instance
    pub divisor: u32,
}

/// Value uploaded to a named uniform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    /// Boolean (uploaded as int)
    Bool(bool),
    /// Signed integer or sampler unit
    Int(i32),
    /// Scalar float
    Float(f32),
    /// 2-component vector
    Vec2(Vec2),
    /// 3-component vector
    Vec3(Vec3),
    /// 4-component vector
    Vec4(Vec4),
    /// 2x2 matrix
    Mat2(Mat2),
    /// 3x3 matrix
    Mat3(Mat3),
    /// 4x4 matrix
    Mat4(Mat4),
}

/// Outcome of compiling and linking a program
///
/// Drivers may hand back a usable handle even when diagnostics are present.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramBuild {
    /// Program handle, possibly null
    pub program: ProgramId,
    /// Compiler or linker output when the build did not succeed cleanly
    pub diagnostics: Option<String>,
}

/// Handle-based GPU command surface
pub trait GpuDevice {
    /// Allocate a vertex array object
    fn create_vertex_array(&mut self) -> VertexArrayId;

    /// Allocate a buffer object
    fn create_buffer(&mut self) -> BufferId;

    /// Delete a vertex array; deleting the null handle is a no-op
    fn delete_vertex_array(&mut self, id: VertexArrayId);

    /// Delete a buffer; deleting the null handle is a no-op
    fn delete_buffer(&mut self, id: BufferId);

    /// Bind a vertex array (null unbinds)
    fn bind_vertex_array(&mut self, id: VertexArrayId);

    /// Bind a buffer to `target` (null unbinds)
    fn bind_buffer(&mut self, target: BufferTarget, id: BufferId);

    /// Allocate storage for the buffer bound to `target` and fill it
    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage);

    /// Overwrite part of the existing storage of the buffer bound to `target`
    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]);

    /// Enable and describe an attribute of the bound vertex array, sourcing
    /// from the bound array buffer
    fn vertex_attribute(&mut self, attribute: &VertexAttribute);

    /// Upload a decoded image as a mipmapped, repeating, linearly filtered texture
    fn create_texture(&mut self, image: &TextureImage) -> TextureId;

    /// Delete a texture; deleting the null handle is a no-op
    fn delete_texture(&mut self, id: TextureId);

    /// Bind a texture to a sampler unit
    fn bind_texture(&mut self, unit: u32, id: TextureId);

    /// Compile and link a program from vertex and fragment sources
    fn create_program(&mut self, vertex_source: &str, fragment_source: &str) -> ProgramBuild;

    /// Delete a program; deleting the null handle is a no-op
    fn delete_program(&mut self, id: ProgramId);

    /// Make a program current
    fn use_program(&mut self, id: ProgramId);

    /// Upload a uniform to `program` by name; unknown names are ignored
    fn set_uniform(&mut self, program: ProgramId, name: &str, value: &UniformValue);

    /// Allocate a framebuffer object
    fn create_framebuffer(&mut self) -> FramebufferId;

    /// Delete a framebuffer; deleting the null handle is a no-op
    fn delete_framebuffer(&mut self, id: FramebufferId);

    /// Bind a framebuffer (null selects the default framebuffer)
    fn bind_framebuffer(&mut self, target: FramebufferTarget, id: FramebufferId);

    /// Allocate a colour texture and attach it to the bound framebuffer;
    /// `samples > 1` allocates multisampled storage
    fn attach_color_texture(&mut self, width: u32, height: u32, samples: u32) -> TextureId;

    /// Allocate a depth/stencil renderbuffer and attach it to the bound framebuffer
    fn attach_depth_stencil(&mut self, width: u32, height: u32, samples: u32) -> RenderbufferId;

    /// Delete a renderbuffer; deleting the null handle is a no-op
    fn delete_renderbuffer(&mut self, id: RenderbufferId);

    /// Completeness of the bound framebuffer
    fn framebuffer_complete(&mut self) -> bool;

    /// Resolve the read framebuffer into the draw framebuffer
    fn blit_framebuffer(&mut self, width: u32, height: u32);

    /// Set the viewport rectangle
    fn viewport(&mut self, width: u32, height: u32);

    /// Clear colour and depth of the bound framebuffer
    fn clear(&mut self, color: [f32; 4]);

    /// Toggle depth testing
    fn set_depth_test(&mut self, enabled: bool);

    /// Toggle line rasterization of polygons
    fn set_wireframe(&mut self, enabled: bool);

    /// Indexed draw from the bound vertex array
    fn draw_elements(&mut self, mode: PrimitiveMode, index_count: u32);

    /// Indexed instanced draw from the bound vertex array
    fn draw_elements_instanced(&mut self, mode: PrimitiveMode, index_count: u32, instance_count: u32);

    /// Non-indexed draw from the bound vertex array
    fn draw_arrays(&mut self, mode: PrimitiveMode, vertex_count: u32);
}
