//! Asset loading
//!
//! Decoders that turn files into plain data: images into [`TextureImage`]s and
//! Wavefront OBJ models into [`ImportedScene`]s. Model import runs on the
//! [`ImportPool`] so the render thread never blocks on file I/O unless it asks
//! to.

pub mod image_loader;
pub mod importer;
pub mod mtl_parser;
pub mod obj_loader;

pub use image_loader::{PixelFormat, TextureImage};
pub use importer::{ImportHandle, ImportPool, ImportResult};
pub use obj_loader::{ImportedMesh, ImportedScene, ObjError, ObjLoader};

/// Asset loading errors
#[derive(thiserror::Error, Debug)]
pub enum AssetError {
    /// Asset not found
    #[error("Asset not found: {0}")]
    NotFound(String),

    /// File contents could not be parsed
    #[error("Failed to parse asset: {0}")]
    Parse(String),

    /// Image decoding failed
    #[error("Failed to decode {path}: {reason}")]
    Decode {
        /// Offending file
        path: String,
        /// Decoder message
        reason: String,
    },

    /// The import produced no meshes
    #[error("Import of {0} produced no meshes")]
    EmptyScene(String),

    /// The import was cancelled before it started
    #[error("Import of {0} was cancelled")]
    Cancelled(String),

    /// Waiting for the import timed out
    #[error("Import of {0} timed out")]
    Timeout(String),

    /// The worker went away without answering
    #[error("Import worker for {0} disconnected")]
    Disconnected(String),

    /// IO error during asset loading
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ObjError> for AssetError {
    fn from(err: ObjError) -> Self {
        match err {
            ObjError::Io(io) => Self::Io(io),
            other => Self::Parse(other.to_string()),
        }
    }
}
