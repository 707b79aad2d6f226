//! Local-space bounding boxes
//!
//! Derived once from an entity's vertex data and used for culling radii,
//! screen-space hover tests and optional debug-line rendering.

use crate::backend::GpuDevice;
use crate::foundation::math::{Color, Vec3};
use crate::render::geometry::{GeometryHandles, GeometryLayout, GeometryRegistry};
use crate::render::mesh::{MeshData, Vertex};
use crate::render::RenderError;

/// Default debug-line colour
pub const DEFAULT_BOX_COLOR: [f32; 3] = [0.0, 0.0, 0.37];

/// Index pairs of the 12 box edges over [`BoundingBox::corners`]
const EDGE_INDICES: [u32; 24] = [
    0, 1, 1, 3, 3, 2, 2, 0, // min-z face
    4, 5, 5, 7, 7, 6, 6, 4, // max-z face
    0, 4, 1, 5, 2, 6, 3, 7, // connecting edges
];

/// Axis-aligned box in an entity's local space
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
    /// Debug-line colour
    pub color: Color,
    lines: GeometryHandles,
}

impl BoundingBox {
    /// Create a box from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max, color: Vec3::from(DEFAULT_BOX_COLOR), lines: GeometryHandles::default() }
    }

    /// Smallest box containing every vertex; `None` for an empty slice
    pub fn from_vertices(vertices: &[Vertex]) -> Option<Self> {
        let first = vertices.first()?.position_vec();
        let (min, max) = vertices.iter().skip(1).fold((first, first), |(min, max), v| {
            let p = v.position_vec();
            (min.inf(&p), max.sup(&p))
        });
        Some(Self::new(min, max))
    }

    /// Centre point
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half-size along each axis
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Distance from the local origin to the farthest corner
    pub fn radius(&self) -> f32 {
        self.min.abs().sup(&self.max.abs()).norm()
    }

    /// The 8 corners; bit 0 selects x, bit 1 y, bit 2 z (0 = min, 1 = max)
    pub fn corners(&self) -> [Vec3; 8] {
        std::array::from_fn(|i| {
            Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            )
        })
    }

    /// Check if this box contains a point
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x &&
        point.y >= self.min.y && point.y <= self.max.y &&
        point.z >= self.min.z && point.z <= self.max.z
    }

    /// Slab test; distance to the entry point, or 0 when the origin is inside
    pub fn intersect_ray(&self, ray_origin: Vec3, ray_dir: Vec3) -> Option<f32> {
        let inv = ray_dir.map(|d| if d == 0.0 { f32::INFINITY } else { 1.0 / d });
        let t1 = (self.min - ray_origin).component_mul(&inv);
        let t2 = (self.max - ray_origin).component_mul(&inv);

        let tmin = t1.inf(&t2).max();
        let tmax = t1.sup(&t2).min();

        (tmax >= tmin && tmax >= 0.0).then(|| tmin.max(0.0))
    }

    /// Line geometry for debug drawing (12 edges)
    pub fn line_mesh(&self) -> MeshData {
        let vertices = self.corners().iter().map(|c| Vertex::from_position((*c).into())).collect();
        MeshData::new(vertices, EDGE_INDICES.to_vec()).without_normals()
    }

    /// Upload debug-line geometry if not already resident
    pub fn upload_lines(&mut self, device: &mut dyn GpuDevice, registry: &mut GeometryRegistry) -> Result<(), RenderError> {
        if self.lines.is_bound() {
            return Ok(());
        }
        self.lines = registry.register(device, &self.line_mesh(), GeometryLayout::FLAT)?;
        Ok(())
    }

    /// Debug-line handles (unbound until uploaded)
    pub fn lines(&self) -> &GeometryHandles {
        &self.lines
    }

    /// Release debug-line geometry
    pub fn release(&mut self, device: &mut dyn GpuDevice, registry: &mut GeometryRegistry) {
        registry.release(device, &mut self.lines);
    }
}
