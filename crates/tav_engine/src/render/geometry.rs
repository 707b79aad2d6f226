//! # Geometry Registry
//!
//! Owns the lifecycle of GPU-side geometry: every drawable gets a vertex
//! array, a vertex buffer, an index buffer and an instance buffer. The four
//! handles are allocated together and released together, so a
//! [`GeometryHandles`] is either fully bound or fully zero.
//!
//! All operations change global binding state on the device. Nothing here
//! leaves a binding behind that callers may rely on.

use crate::backend::{
    BufferId, BufferTarget, BufferUsage, GpuDevice, VertexArrayId, VertexAttribute,
};
use crate::foundation::math::Mat4;
use crate::render::mesh::{MeshData, Vertex, INSTANCE_MATRIX_LOCATION};
use crate::render::RenderError;

/// Bytes of one instance model matrix
pub const INSTANCE_STRIDE: usize = std::mem::size_of::<[f32; 16]>();

/// Attribute configuration requested at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GeometryLayout {
    /// Configure the per-instance matrix attributes
    pub instanced: bool,
    /// Configure the normal attribute
    pub normals: bool,
}

impl GeometryLayout {
    /// Layout for a plain mesh with normals
    pub const STANDARD: Self = Self { instanced: false, normals: true };
    /// Layout for an instanced mesh with normals
    pub const INSTANCED: Self = Self { instanced: true, normals: true };
    /// Layout without normals (sprites, quads, debug lines)
    pub const FLAT: Self = Self { instanced: false, normals: false };

    /// Pick the layout for a mesh drawn `instance_count` times
    pub fn for_mesh(mesh: &MeshData, instance_count: usize) -> Self {
        Self { instanced: instance_count > 1, normals: mesh.has_normals }
    }
}

/// GPU handles of one registered geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GeometryHandles {
    /// Vertex array object
    pub vertex_array: VertexArrayId,
    /// Interleaved vertex buffer
    pub vertex_buffer: BufferId,
    /// Index buffer
    pub index_buffer: BufferId,
    /// Per-instance matrix buffer
    pub instance_buffer: BufferId,
    /// Matrices the instance buffer storage can hold
    pub instance_capacity: usize,
    /// Vertices uploaded
    pub vertex_count: u32,
    /// Indices uploaded
    pub index_count: u32,
}

impl GeometryHandles {
    /// True when every handle is allocated
    pub fn is_bound(&self) -> bool {
        !self.vertex_array.is_null()
            && !self.vertex_buffer.is_null()
            && !self.index_buffer.is_null()
            && !self.instance_buffer.is_null()
    }

    /// True when every handle is zero
    pub fn is_unbound(&self) -> bool {
        self.vertex_array.is_null()
            && self.vertex_buffer.is_null()
            && self.index_buffer.is_null()
            && self.instance_buffer.is_null()
    }
}

/// Creates, refreshes and releases GPU geometry
#[derive(Debug, Default)]
pub struct GeometryRegistry {
    live: usize,
    registered_total: u64,
    released_total: u64,
}

impl GeometryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate handles, upload mesh data once and configure attributes
    ///
    /// # Arguments
    /// * `device` - GPU device owning the context
    /// * `mesh` - Geometry to upload with static-draw intent
    /// * `layout` - Which optional attributes to configure
    ///
    /// # Returns
    /// Fully bound handles, or `RenderError::AllocationFailed` if any handle
    /// came back null. On failure nothing stays allocated.
    pub fn register(
        &mut self,
        device: &mut dyn GpuDevice,
        mesh: &MeshData,
        layout: GeometryLayout,
    ) -> Result<GeometryHandles, RenderError> {
        let mut handles = GeometryHandles {
            vertex_array: device.create_vertex_array(),
            vertex_buffer: device.create_buffer(),
            index_buffer: device.create_buffer(),
            instance_buffer: device.create_buffer(),
            instance_capacity: 0,
            vertex_count: mesh.vertex_count(),
            index_count: mesh.index_count(),
        };

        if !handles.is_bound() {
            log::error!("Geometry registration failed: GPU returned a null handle");
            Self::delete_handles(device, &mut handles);
            return Err(RenderError::AllocationFailed("geometry buffers".to_string()));
        }

        device.bind_vertex_array(handles.vertex_array);

        device.bind_buffer(BufferTarget::Array, handles.vertex_buffer);
        device.buffer_data(BufferTarget::Array, mesh.vertex_bytes(), BufferUsage::StaticDraw);

        device.bind_buffer(BufferTarget::ElementArray, handles.index_buffer);
        if mesh.is_indexed() {
            device.buffer_data(BufferTarget::ElementArray, mesh.index_bytes(), BufferUsage::StaticDraw);
        }

        device.vertex_attribute(&VertexAttribute {
            location: 0,
            components: 3,
            stride: Vertex::STRIDE,
            offset: 0,
            divisor: 0,
        });
        device.vertex_attribute(&VertexAttribute {
            location: 1,
            components: 2,
            stride: Vertex::STRIDE,
            offset: Vertex::TEX_COORD_OFFSET,
            divisor: 0,
        });
        if layout.normals {
            device.vertex_attribute(&VertexAttribute {
                location: 2,
                components: 3,
                stride: Vertex::STRIDE,
                offset: Vertex::NORMAL_OFFSET,
                divisor: 0,
            });
        }

        if layout.instanced {
            device.bind_buffer(BufferTarget::Array, handles.instance_buffer);
            let column = INSTANCE_STRIDE / 4;
            for i in 0..4u32 {
                device.vertex_attribute(&VertexAttribute {
                    location: INSTANCE_MATRIX_LOCATION + i,
                    components: 4,
                    stride: INSTANCE_STRIDE,
                    offset: i as usize * column,
                    divisor: 1,
                });
            }
        }

        device.bind_vertex_array(VertexArrayId::NULL);
        device.bind_buffer(BufferTarget::Array, BufferId::NULL);

        self.live += 1;
        self.registered_total += 1;
        log::trace!(
            "Registered geometry vao={} ({} vertices, {} indices)",
            handles.vertex_array.0,
            handles.vertex_count,
            handles.index_count
        );
        Ok(handles)
    }

    /// Upload per-instance model matrices
    ///
    /// Storage is reallocated only when `matrices` outgrows the current
    /// capacity; otherwise the existing storage is refreshed in place.
    pub fn update_instance_buffer(
        &mut self,
        device: &mut dyn GpuDevice,
        handles: &mut GeometryHandles,
        matrices: &[Mat4],
    ) -> Result<(), RenderError> {
        if !handles.is_bound() {
            return Err(RenderError::UnboundGeometry("instance buffer update".to_string()));
        }
        if matrices.is_empty() {
            return Ok(());
        }

        let floats: Vec<f32> = matrices.iter().flat_map(|m| m.as_slice().iter().copied()).collect();
        let bytes: &[u8] = bytemuck::cast_slice(&floats);

        device.bind_buffer(BufferTarget::Array, handles.instance_buffer);
        if matrices.len() > handles.instance_capacity {
            log::debug!(
                "Growing instance buffer {} from {} to {} matrices",
                handles.instance_buffer.0,
                handles.instance_capacity,
                matrices.len()
            );
            device.buffer_data(BufferTarget::Array, bytes, BufferUsage::DynamicDraw);
            handles.instance_capacity = matrices.len();
        } else {
            device.buffer_sub_data(BufferTarget::Array, 0, bytes);
        }
        device.bind_buffer(BufferTarget::Array, BufferId::NULL);
        Ok(())
    }

    /// Unbind and delete all four handles, zeroing them
    ///
    /// A second call on the same handles is a no-op.
    pub fn release(&mut self, device: &mut dyn GpuDevice, handles: &mut GeometryHandles) {
        if handles.is_unbound() {
            return;
        }
        device.bind_vertex_array(VertexArrayId::NULL);
        device.bind_buffer(BufferTarget::Array, BufferId::NULL);
        device.bind_buffer(BufferTarget::ElementArray, BufferId::NULL);

        Self::delete_handles(device, handles);
        self.live = self.live.saturating_sub(1);
        self.released_total += 1;
    }

    fn delete_handles(device: &mut dyn GpuDevice, handles: &mut GeometryHandles) {
        device.delete_vertex_array(handles.vertex_array);
        device.delete_buffer(handles.vertex_buffer);
        device.delete_buffer(handles.index_buffer);
        device.delete_buffer(handles.instance_buffer);
        *handles = GeometryHandles::default();
    }

    /// Geometries currently registered
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Registrations and releases since startup
    pub fn totals(&self) -> (u64, u64) {
        (self.registered_total, self.released_total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessDevice;

    fn triangle() -> MeshData {
        MeshData::new(
            vec![
                Vertex::from_position([0.0, 0.5, 0.0]),
                Vertex::from_position([-0.5, -0.5, 0.0]),
                Vertex::from_position([0.5, -0.5, 0.0]),
            ],
            vec![0, 1, 2],
        )
    }

    #[test]
    fn test_register_binds_all_handles() {
        let mut device = HeadlessDevice::new();
        let mut registry = GeometryRegistry::new();
        let handles = registry.register(&mut device, &triangle(), GeometryLayout::STANDARD).unwrap();

        assert!(handles.is_bound());
        assert_eq!(handles.index_count, 3);
        assert_eq!(device.live_vertex_arrays(), 1);
        assert_eq!(device.live_buffers(), 3);
        assert_eq!(device.buffer(handles.vertex_buffer).unwrap().capacity, 3 * Vertex::STRIDE);
        assert!(device.attribute(handles.vertex_array, 2).is_some());
        assert!(device.attribute(handles.vertex_array, INSTANCE_MATRIX_LOCATION).is_none());
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn test_instanced_layout_sets_divisors() {
        let mut device = HeadlessDevice::new();
        let mut registry = GeometryRegistry::new();
        let handles = registry.register(&mut device, &triangle(), GeometryLayout::INSTANCED).unwrap();

        for i in 0..4 {
            let attribute = device.attribute(handles.vertex_array, INSTANCE_MATRIX_LOCATION + i).unwrap();
            assert_eq!(attribute.divisor, 1);
            assert_eq!(attribute.components, 4);
            assert_eq!(attribute.offset, i as usize * 16);
        }
        assert_eq!(device.attribute(handles.vertex_array, 0).unwrap().divisor, 0);
    }

    #[test]
    fn test_allocation_failure_leaves_nothing_behind() {
        let mut device = HeadlessDevice::new();
        device.set_fail_allocations(true);
        let mut registry = GeometryRegistry::new();

        let result = registry.register(&mut device, &triangle(), GeometryLayout::STANDARD);
        assert!(matches!(result, Err(RenderError::AllocationFailed(_))));
        assert_eq!(device.live_handles(), 0);
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut device = HeadlessDevice::new();
        let mut registry = GeometryRegistry::new();
        let mut handles = registry.register(&mut device, &triangle(), GeometryLayout::STANDARD).unwrap();

        registry.release(&mut device, &mut handles);
        assert!(handles.is_unbound());
        let after_first = device.live_handles();

        registry.release(&mut device, &mut handles);
        assert!(handles.is_unbound());
        assert_eq!(device.live_handles(), after_first);
        assert_eq!(device.invalid_deletes(), 0);
        assert_eq!(registry.totals(), (1, 1));
    }

    #[test]
    fn test_same_instance_count_does_not_reallocate() {
        let mut device = HeadlessDevice::new();
        let mut registry = GeometryRegistry::new();
        let mut handles = registry.register(&mut device, &triangle(), GeometryLayout::INSTANCED).unwrap();
        let matrices = vec![Mat4::identity(); 10];

        registry.update_instance_buffer(&mut device, &mut handles, &matrices).unwrap();
        registry.update_instance_buffer(&mut device, &mut handles, &matrices).unwrap();

        let record = device.buffer(handles.instance_buffer).unwrap();
        assert_eq!(record.allocations, 1);
        assert_eq!(record.refreshes, 1);
        assert!(record.dynamic);
    }

    #[test]
    fn test_growing_instance_count_reallocates() {
        let mut device = HeadlessDevice::new();
        let mut registry = GeometryRegistry::new();
        let mut handles = registry.register(&mut device, &triangle(), GeometryLayout::INSTANCED).unwrap();

        registry.update_instance_buffer(&mut device, &mut handles, &vec![Mat4::identity(); 10]).unwrap();
        registry.update_instance_buffer(&mut device, &mut handles, &vec![Mat4::identity(); 20]).unwrap();

        let record = device.buffer(handles.instance_buffer).unwrap();
        assert_eq!(record.allocations, 2);
        assert!(record.capacity >= 20 * INSTANCE_STRIDE);
        assert!(handles.instance_capacity >= 20);

        // Shrinking reuses the larger storage.
        registry.update_instance_buffer(&mut device, &mut handles, &vec![Mat4::identity(); 5]).unwrap();
        assert_eq!(device.buffer(handles.instance_buffer).unwrap().allocations, 2);
    }

    #[test]
    fn test_update_on_released_geometry_fails() {
        let mut device = HeadlessDevice::new();
        let mut registry = GeometryRegistry::new();
        let mut handles = GeometryHandles::default();
        let result = registry.update_instance_buffer(&mut device, &mut handles, &[Mat4::identity()]);
        assert!(matches!(result, Err(RenderError::UnboundGeometry(_))));
    }
}
