//! Mesh data for GPU upload
//!
//! [`Vertex`] is the interleaved layout every drawable uses; [`MeshData`] is
//! an entity's privately owned copy of its vertex and index arrays. The copy
//! decouples the entity from whatever buffers the importer produced, so the
//! importer's memory can go away independently.
//!
//! # Attribute locations
//!
//! | Location | Contents                                 | Divisor |
//! |----------|------------------------------------------|---------|
//! | 0        | position (`vec3`)                        | 0       |
//! | 1        | texture coordinate (`vec2`)              | 0       |
//! | 2        | normal (`vec3`)                          | 0       |
//! | 3-6      | instance model matrix, one `vec4` each   | 1       |

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::Vec3;

/// First attribute location of the per-instance model matrix
pub const INSTANCE_MATRIX_LOCATION: u32 = 3;

/// 3D vertex data structure for rendering
///
/// `#[repr(C)]` keeps the field order and packing identical to what the
/// attribute pointers describe.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    /// Position in model space
    pub position: [f32; 3],
    /// Texture coordinates
    pub tex_coord: [f32; 2],
    /// Normal vector
    pub normal: [f32; 3],
}

impl Vertex {
    /// Byte size of one interleaved vertex
    pub const STRIDE: usize = std::mem::size_of::<Self>();
    /// Byte offset of the texture coordinate
    pub const TEX_COORD_OFFSET: usize = 3 * std::mem::size_of::<f32>();
    /// Byte offset of the normal
    pub const NORMAL_OFFSET: usize = 5 * std::mem::size_of::<f32>();

    /// Create a new vertex
    pub fn new(position: [f32; 3], tex_coord: [f32; 2], normal: [f32; 3]) -> Self {
        Self { position, tex_coord, normal }
    }

    /// Create a vertex with only a position
    pub fn from_position(position: [f32; 3]) -> Self {
        Self { position, ..Self::default() }
    }

    /// Position as a vector
    pub fn position_vec(&self) -> Vec3 {
        Vec3::from(self.position)
    }
}

/// Owned vertex and index arrays of one drawable
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    /// Interleaved vertices
    pub vertices: Vec<Vertex>,
    /// Triangle (or line) indices; empty for non-indexed geometry
    pub indices: Vec<u32>,
    /// Whether the normal attribute carries data
    pub has_normals: bool,
}

impl MeshData {
    /// Take ownership of vertex and index arrays
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices, has_normals: true }
    }

    /// Copy vertex and index slices into a new owned mesh
    pub fn from_slices(vertices: &[Vertex], indices: &[u32]) -> Self {
        Self::new(vertices.to_vec(), indices.to_vec())
    }

    /// Mark the normal attribute as unused
    #[must_use]
    pub fn without_normals(mut self) -> Self {
        self.has_normals = false;
        self
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    /// Number of indices
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// True when draws should use the index buffer
    pub fn is_indexed(&self) -> bool {
        !self.indices.is_empty()
    }

    /// Check that every index refers to an existing vertex
    pub fn validate(&self) -> Result<(), String> {
        if self.vertices.is_empty() {
            return Err("mesh has no vertices".to_string());
        }
        let count = self.vertices.len();
        match self.indices.iter().find(|&&i| i as usize >= count) {
            Some(bad) => Err(format!("index {} out of range for {} vertices", bad, count)),
            None => Ok(()),
        }
    }

    /// Vertex bytes for upload
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Index bytes for upload
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout() {
        assert_eq!(Vertex::STRIDE, 32);
        assert_eq!(Vertex::TEX_COORD_OFFSET, 12);
        assert_eq!(Vertex::NORMAL_OFFSET, 20);
    }

    #[test]
    fn test_mesh_data_is_an_owned_copy() {
        let source = vec![Vertex::from_position([1.0, 0.0, 0.0]); 3];
        let mesh = MeshData::from_slices(&source, &[0, 1, 2]);
        drop(source);
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.vertex_bytes().len(), 96);
    }

    #[test]
    fn test_validate_rejects_out_of_range_index() {
        let mesh = MeshData::new(vec![Vertex::default(); 2], vec![0, 1, 2]);
        assert!(mesh.validate().is_err());
        assert!(MeshData::default().validate().is_err());
    }
}
