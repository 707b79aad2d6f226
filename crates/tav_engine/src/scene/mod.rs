//! Scene management system
//!
//! Entities and the directory that owns them.
//!
//! ## Architecture
//!
//! ```text
//! SceneDirectory
//!      ├── SceneObject   (mesh + instances + material)
//!      ├── Model3D       (imported meshes sharing one transform)
//!      └── Camera        (billboard SceneObject)
//! ```
//!
//! Every entity owns its [`Transform`]s; instance 0 carries the
//! [`BoundingBox`] used for culling and picking.

pub mod bounds;
pub mod directory;
pub mod entity;
pub mod model;
pub mod object;
pub mod primitives;
pub mod transform;

pub use bounds::BoundingBox;
pub use directory::{CameraKey, EntityId, FrameStats, ModelKey, ObjectKey, SceneDirectory};
pub use entity::{
    ClickCallback, ClickEvent, Clickable, DrawContext, DrawOutcome, Drawable, SceneEntity, UpdateContext, Updatable,
};
pub use model::{Model3D, ModelMesh};
pub use object::{ObjectType, SceneObject};
pub use transform::{instance_matrices, Decomposed, Transform};
