//! Built-in shapes
//!
//! Each constructor returns an unregistered [`SceneObject`] with the
//! shape's default transform and material; callers register it (usually
//! through the scene directory) to make it resident.

use std::rc::Rc;

use crate::foundation::math::Vec3;
use crate::render::mesh::{MeshData, Vertex};
use crate::render::texture::Texture;
use crate::scene::object::{ObjectType, SceneObject};

/// Texture the cube primitive expects under the asset directory
pub const CUBE_TEXTURE: &str = "grass_block.png";
/// Texture the camera billboard expects under the asset directory
pub const CAMERA_TEXTURE: &str = "camera_texture.png";

/// Default edge size of the camera billboard
pub const BILLBOARD_SIZE: f32 = 10.0;

/// Tag of the anti-alias quad
pub const SCREEN_QUAD_TAG: &str = "ANTI-ALIAS FRAMEBUFFER QUAD";

/// Single cyan triangle in the XY plane
pub fn triangle() -> SceneObject {
    let normal = [0.0, 0.0, 1.0];
    let mesh = MeshData::new(
        vec![
            Vertex::new([-0.5, -0.5, 0.0], [0.0, 0.0], normal),
            Vertex::new([0.5, -0.5, 0.0], [1.0, 0.0], normal),
            Vertex::new([0.0, 0.5, 0.0], [0.5, 1.0], normal),
        ],
        vec![0, 1, 2],
    );
    SceneObject::new("triangle", ObjectType::OBJECT_2D, mesh).with_color(Vec3::new(0.0, 1.0, 1.0))
}

fn quad_mesh(half: f32) -> MeshData {
    let normal = [0.0, 0.0, 1.0];
    MeshData::new(
        vec![
            Vertex::new([-half, -half, 0.0], [0.0, 0.0], normal),
            Vertex::new([half, -half, 0.0], [1.0, 0.0], normal),
            Vertex::new([-half, half, 0.0], [0.0, 1.0], normal),
            Vertex::new([half, half, 0.0], [1.0, 1.0], normal),
        ],
        vec![0, 1, 2, 1, 3, 2],
    )
}

/// White ground plane: unit quad laid flat (-90° about X) and scaled 100×
pub fn plane() -> SceneObject {
    SceneObject::new("plane", ObjectType::OBJECT_3D | ObjectType::FLOOR, quad_mesh(0.5))
        .with_rotation(Vec3::x(), -90.0)
        .with_scale(Vec3::repeat(100.0))
}

/// Unit cube with per-face normals and UVs, scaled 7×
///
/// Pass the cached `grass_block.png` texture, or `None` to draw it flat.
pub fn cube(texture: Option<Rc<Texture>>) -> SceneObject {
    // (normal, tangent u, tangent v) per face
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in faces {
        let base = vertices.len() as u32;
        let (n, u, v) = (Vec3::from(normal), Vec3::from(u), Vec3::from(v));
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let p = (n + u * su + v * sv) * 0.5;
            vertices.push(Vertex::new(p.into(), [(su + 1.0) * 0.5, (sv + 1.0) * 0.5], normal));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    let object = SceneObject::new("cube", ObjectType::OBJECT_3D, MeshData::new(vertices, indices))
        .with_scale(Vec3::repeat(7.0));
    match texture {
        Some(texture) => object.with_texture(texture),
        None => object,
    }
}

/// Camera marker sprite (purple when untextured)
pub fn billboard(size: f32, texture: Option<Rc<Texture>>) -> SceneObject {
    let object = SceneObject::new("camera billboard", ObjectType::CAMERA | ObjectType::SPRITE, quad_mesh(size * 0.5))
        .with_color(Vec3::new(0.3, 0.0, 0.3));
    match texture {
        Some(texture) => object.with_texture(texture),
        None => object,
    }
}

/// Full-screen quad in NDC sampled by the anti-alias resolve
pub fn screen_quad() -> SceneObject {
    let normal = [0.0, 0.0, 1.0];
    let mesh = MeshData::new(
        vec![
            Vertex::new([-1.0, 1.0, 0.0], [0.0, 1.0], normal),
            Vertex::new([-1.0, -1.0, 0.0], [0.0, 0.0], normal),
            Vertex::new([1.0, -1.0, 0.0], [1.0, 0.0], normal),
            Vertex::new([1.0, 1.0, 0.0], [1.0, 1.0], normal),
        ],
        vec![0, 1, 2, 0, 2, 3],
    )
    .without_normals();
    SceneObject::new(SCREEN_QUAD_TAG, ObjectType::FRAMEBUFFER_QUAD, mesh)
}
