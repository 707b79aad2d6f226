//! # Backend Module
//!
//! The GPU itself is an external collaborator. Everything the engine asks of
//! it goes through the [`GpuDevice`] trait, a thin handle-based surface shaped
//! after OpenGL: resources are named by `u32` handles and a handle of zero
//! means "unbound".
//!
//! ## Organization
//!
//! - **device**: the `GpuDevice` trait, handle newtypes and descriptor types
//! - **headless**: a recording implementation used by tests
//!
//! The OpenGL implementation lives with the sandbox application, which owns
//! the window and its context.

pub mod device;
pub mod headless;

pub use device::{
    BufferId, BufferTarget, BufferUsage, FramebufferId, FramebufferTarget, GpuDevice,
    PrimitiveMode, ProgramBuild, ProgramId, RenderbufferId, TextureId, UniformValue,
    VertexArrayId, VertexAttribute,
};
pub use headless::{DrawCall, HeadlessDevice};
