//! # Rendering System
//!
//! GPU-facing half of the engine. Everything here talks to a
//! [`GpuDevice`](crate::backend::GpuDevice) and never to a graphics API
//! directly.
//!
//! ## Architecture
//!
//! - **Mesh**: interleaved vertex layout and owned mesh data
//! - **Geometry**: registration, instance refresh and release of GPU buffers
//! - **Shader**: program ownership, named uniforms and live reload
//! - **Texture**: path-deduplicated, reference-counted texture cache
//! - **Framebuffer**: multisampled offscreen target and its resolve pass

pub mod framebuffer;
pub mod geometry;
pub mod mesh;
pub mod shader;
pub mod texture;

pub use framebuffer::FrameBufferObject;
pub use geometry::{GeometryHandles, GeometryLayout, GeometryRegistry, INSTANCE_STRIDE};
pub use mesh::{MeshData, Vertex, INSTANCE_MATRIX_LOCATION};
pub use shader::{Shader, ShaderKey, ShaderLibrary, ShaderRole, ShaderSource};
pub use texture::{Texture, TextureCache};

use crate::assets::AssetError;

/// Rendering errors
///
/// Every variant is logged where it is raised; callers decide whether it is
/// fatal for the entity being created or for the whole engine.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// Renderer initialization failed during setup
    #[error("Renderer initialization failed: {0}")]
    InitializationFailed(String),

    /// The device returned a null handle
    ///
    /// Treated as fatal for the entity being created: it is not registered
    /// and nothing it allocated so far stays alive.
    #[error("GPU allocation failed: {0}")]
    AllocationFailed(String),

    /// Geometry was used after release or before registration
    #[error("Geometry is not bound: {0}")]
    UnboundGeometry(String),

    /// No program is available for a draw
    #[error("No shader program for {0}")]
    MissingShader(String),

    /// Shader source could not be read
    #[error("Failed to read shader {path}: {reason}")]
    ShaderSource {
        /// Source file
        path: String,
        /// I/O message
        reason: String,
    },

    /// The offscreen target failed its completeness check
    #[error("Framebuffer {width}x{height} is not complete")]
    IncompleteFramebuffer {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },

    /// Texture decode failure
    #[error(transparent)]
    Asset(#[from] AssetError),
}
