//! Recording GPU device
//!
//! `HeadlessDevice` performs no rendering. It hands out increasing handles,
//! tracks which ones are alive, counts storage allocations separately from
//! sub-data refreshes and logs every draw. Tests use it to observe exactly
//! what the engine asked of the GPU.

use std::collections::{HashMap, HashSet};

use super::device::{
    BufferId, BufferTarget, BufferUsage, FramebufferId, FramebufferTarget, GpuDevice,
    PrimitiveMode, ProgramBuild, ProgramId, RenderbufferId, TextureId, UniformValue,
    VertexArrayId, VertexAttribute,
};
use crate::assets::TextureImage;

/// A recorded draw call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    /// Vertex array bound at the time of the draw
    pub vertex_array: VertexArrayId,
    /// Program in use at the time of the draw
    pub program: ProgramId,
    /// Primitive mode
    pub mode: PrimitiveMode,
    /// Index or vertex count
    pub count: u32,
    /// Instance count (1 for non-instanced draws)
    pub instances: u32,
}

/// Per-buffer bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferRecord {
    /// Bytes of storage currently allocated
    pub capacity: usize,
    /// Number of storage (re)allocations
    pub allocations: u32,
    /// Number of in-place refreshes
    pub refreshes: u32,
    /// Whether the last allocation used dynamic intent
    pub dynamic: bool,
}

/// GPU device that records instead of rendering
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    next_handle: u32,
    fail_allocations: bool,
    program_diagnostics: Option<String>,
    incomplete_framebuffers: bool,

    vertex_arrays: HashSet<u32>,
    buffers: HashMap<u32, BufferRecord>,
    textures: HashSet<u32>,
    programs: HashSet<u32>,
    framebuffers: HashSet<u32>,
    renderbuffers: HashSet<u32>,

    bound_vertex_array: VertexArrayId,
    bound_buffers: HashMap<BufferTarget, BufferId>,
    bound_framebuffer: FramebufferId,
    current_program: ProgramId,
    attributes: HashMap<(u32, u32), VertexAttribute>,
    uniforms: HashMap<(u32, String), UniformValue>,

    draws: Vec<DrawCall>,
    invalid_deletes: u32,
    invalid_operations: u32,
    clears: u32,
    blits: u32,
    wireframe: bool,
    viewport: (u32, u32),
}

impl HeadlessDevice {
    /// Create a device with no live resources
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent allocation return the null handle
    pub fn set_fail_allocations(&mut self, fail: bool) {
        self.fail_allocations = fail;
    }

    /// Attach diagnostics to every subsequent program build
    pub fn set_program_diagnostics(&mut self, diagnostics: Option<String>) {
        self.program_diagnostics = diagnostics;
    }

    /// Report every framebuffer as incomplete
    pub fn set_incomplete_framebuffers(&mut self, incomplete: bool) {
        self.incomplete_framebuffers = incomplete;
    }

    fn allocate(&mut self) -> u32 {
        if self.fail_allocations {
            log::warn!("HeadlessDevice: simulated allocation failure");
            return 0;
        }
        self.next_handle += 1;
        self.next_handle
    }

    fn forget(live: &mut HashSet<u32>, id: u32, invalid: &mut u32, kind: &str) {
        if id == 0 {
            return;
        }
        if !live.remove(&id) {
            log::error!("HeadlessDevice: delete of dead {} handle {}", kind, id);
            *invalid += 1;
        }
    }

    fn bound_buffer(&self, target: BufferTarget) -> BufferId {
        self.bound_buffers.get(&target).copied().unwrap_or_default()
    }

    fn record_draw(&mut self, mode: PrimitiveMode, count: u32, instances: u32) {
        if self.bound_vertex_array.is_null() {
            log::error!("HeadlessDevice: draw with no vertex array bound");
            self.invalid_operations += 1;
        }
        self.draws.push(DrawCall {
            vertex_array: self.bound_vertex_array,
            program: self.current_program,
            mode,
            count,
            instances,
        });
    }

    /// Number of live vertex arrays
    pub fn live_vertex_arrays(&self) -> usize {
        self.vertex_arrays.len()
    }

    /// Number of live buffers
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Number of live textures
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Number of live programs
    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    /// Number of live framebuffers
    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.len()
    }

    /// Total live handles of every kind
    pub fn live_handles(&self) -> usize {
        self.vertex_arrays.len()
            + self.buffers.len()
            + self.textures.len()
            + self.programs.len()
            + self.framebuffers.len()
            + self.renderbuffers.len()
    }

    /// True if `id` names a live vertex array
    pub fn is_vertex_array_live(&self, id: VertexArrayId) -> bool {
        self.vertex_arrays.contains(&id.0)
    }

    /// Bookkeeping for a buffer, if it is live
    pub fn buffer(&self, id: BufferId) -> Option<&BufferRecord> {
        self.buffers.get(&id.0)
    }

    /// Attribute recorded for `location` on a vertex array
    pub fn attribute(&self, vertex_array: VertexArrayId, location: u32) -> Option<&VertexAttribute> {
        self.attributes.get(&(vertex_array.0, location))
    }

    /// Last value uploaded to a uniform
    pub fn uniform(&self, program: ProgramId, name: &str) -> Option<&UniformValue> {
        self.uniforms.get(&(program.0, name.to_string()))
    }

    /// Every draw recorded so far
    pub fn draws(&self) -> &[DrawCall] {
        &self.draws
    }

    /// Forget recorded draws (typically between frames)
    pub fn clear_draws(&mut self) {
        self.draws.clear();
    }

    /// Deletes of handles that were not live
    pub fn invalid_deletes(&self) -> u32 {
        self.invalid_deletes
    }

    /// Operations issued against missing bindings
    pub fn invalid_operations(&self) -> u32 {
        self.invalid_operations
    }

    /// Number of clears issued
    pub fn clears(&self) -> u32 {
        self.clears
    }

    /// Number of resolve blits issued
    pub fn blits(&self) -> u32 {
        self.blits
    }

    /// Current wireframe state
    pub fn wireframe(&self) -> bool {
        self.wireframe
    }

    /// Current viewport size
    pub fn viewport_size(&self) -> (u32, u32) {
        self.viewport
    }

    /// Currently bound vertex array
    pub fn bound_vertex_array(&self) -> VertexArrayId {
        self.bound_vertex_array
    }
}

impl GpuDevice for HeadlessDevice {
    fn create_vertex_array(&mut self) -> VertexArrayId {
        let id = self.allocate();
        if id != 0 {
            self.vertex_arrays.insert(id);
        }
        VertexArrayId(id)
    }

    fn create_buffer(&mut self) -> BufferId {
        let id = self.allocate();
        if id != 0 {
            self.buffers.insert(id, BufferRecord::default());
        }
        BufferId(id)
    }

    fn delete_vertex_array(&mut self, id: VertexArrayId) {
        Self::forget(&mut self.vertex_arrays, id.0, &mut self.invalid_deletes, "vertex array");
        self.attributes.retain(|(vao, _), _| *vao != id.0);
        if self.bound_vertex_array == id {
            self.bound_vertex_array = VertexArrayId::NULL;
        }
    }

    fn delete_buffer(&mut self, id: BufferId) {
        if id.is_null() {
            return;
        }
        if self.buffers.remove(&id.0).is_none() {
            log::error!("HeadlessDevice: delete of dead buffer handle {}", id.0);
            self.invalid_deletes += 1;
        }
        self.bound_buffers.retain(|_, bound| *bound != id);
    }

    fn bind_vertex_array(&mut self, id: VertexArrayId) {
        if !id.is_null() && !self.vertex_arrays.contains(&id.0) {
            self.invalid_operations += 1;
        }
        self.bound_vertex_array = id;
    }

    fn bind_buffer(&mut self, target: BufferTarget, id: BufferId) {
        if !id.is_null() && !self.buffers.contains_key(&id.0) {
            self.invalid_operations += 1;
        }
        self.bound_buffers.insert(target, id);
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        let bound = self.bound_buffer(target);
        match self.buffers.get_mut(&bound.0) {
            Some(record) => {
                record.capacity = data.len();
                record.allocations += 1;
                record.dynamic = usage == BufferUsage::DynamicDraw;
            }
            None => self.invalid_operations += 1,
        }
    }

    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) {
        let bound = self.bound_buffer(target);
        match self.buffers.get_mut(&bound.0) {
            Some(record) if offset + data.len() <= record.capacity => record.refreshes += 1,
            _ => {
                log::error!("HeadlessDevice: sub-data upload outside buffer storage");
                self.invalid_operations += 1;
            }
        }
    }

    fn vertex_attribute(&mut self, attribute: &VertexAttribute) {
        if self.bound_vertex_array.is_null() || self.bound_buffer(BufferTarget::Array).is_null() {
            self.invalid_operations += 1;
            return;
        }
        self.attributes.insert((self.bound_vertex_array.0, attribute.location), *attribute);
    }

    fn create_texture(&mut self, image: &TextureImage) -> TextureId {
        if image.width == 0 || image.height == 0 {
            return TextureId::NULL;
        }
        let id = self.allocate();
        if id != 0 {
            self.textures.insert(id);
        }
        TextureId(id)
    }

    fn delete_texture(&mut self, id: TextureId) {
        Self::forget(&mut self.textures, id.0, &mut self.invalid_deletes, "texture");
    }

    fn bind_texture(&mut self, _unit: u32, id: TextureId) {
        if !id.is_null() && !self.textures.contains(&id.0) {
            self.invalid_operations += 1;
        }
    }

    fn create_program(&mut self, _vertex_source: &str, _fragment_source: &str) -> ProgramBuild {
        let id = self.allocate();
        if id != 0 {
            self.programs.insert(id);
        }
        ProgramBuild { program: ProgramId(id), diagnostics: self.program_diagnostics.clone() }
    }

    fn delete_program(&mut self, id: ProgramId) {
        Self::forget(&mut self.programs, id.0, &mut self.invalid_deletes, "program");
        self.uniforms.retain(|(program, _), _| *program != id.0);
    }

    fn use_program(&mut self, id: ProgramId) {
        self.current_program = id;
    }

    fn set_uniform(&mut self, program: ProgramId, name: &str, value: &UniformValue) {
        if self.programs.contains(&program.0) {
            self.uniforms.insert((program.0, name.to_string()), *value);
        }
    }

    fn create_framebuffer(&mut self) -> FramebufferId {
        let id = self.allocate();
        if id != 0 {
            self.framebuffers.insert(id);
        }
        FramebufferId(id)
    }

    fn delete_framebuffer(&mut self, id: FramebufferId) {
        Self::forget(&mut self.framebuffers, id.0, &mut self.invalid_deletes, "framebuffer");
        if self.bound_framebuffer == id {
            self.bound_framebuffer = FramebufferId::NULL;
        }
    }

    fn bind_framebuffer(&mut self, _target: FramebufferTarget, id: FramebufferId) {
        self.bound_framebuffer = id;
    }

    fn attach_color_texture(&mut self, width: u32, height: u32, _samples: u32) -> TextureId {
        if width == 0 || height == 0 || self.bound_framebuffer.is_null() {
            self.invalid_operations += 1;
            return TextureId::NULL;
        }
        let id = self.allocate();
        if id != 0 {
            self.textures.insert(id);
        }
        TextureId(id)
    }

    fn attach_depth_stencil(&mut self, width: u32, height: u32, _samples: u32) -> RenderbufferId {
        if width == 0 || height == 0 || self.bound_framebuffer.is_null() {
            self.invalid_operations += 1;
            return RenderbufferId::NULL;
        }
        let id = self.allocate();
        if id != 0 {
            self.renderbuffers.insert(id);
        }
        RenderbufferId(id)
    }

    fn delete_renderbuffer(&mut self, id: RenderbufferId) {
        Self::forget(&mut self.renderbuffers, id.0, &mut self.invalid_deletes, "renderbuffer");
    }

    fn framebuffer_complete(&mut self) -> bool {
        !self.incomplete_framebuffers && !self.bound_framebuffer.is_null()
    }

    fn blit_framebuffer(&mut self, _width: u32, _height: u32) {
        self.blits += 1;
    }

    fn viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    fn clear(&mut self, _color: [f32; 4]) {
        self.clears += 1;
    }

    fn set_depth_test(&mut self, _enabled: bool) {}

    fn set_wireframe(&mut self, enabled: bool) {
        self.wireframe = enabled;
    }

    fn draw_elements(&mut self, mode: PrimitiveMode, index_count: u32) {
        self.record_draw(mode, index_count, 1);
    }

    fn draw_elements_instanced(&mut self, mode: PrimitiveMode, index_count: u32, instance_count: u32) {
        self.record_draw(mode, index_count, instance_count);
    }

    fn draw_arrays(&mut self, mode: PrimitiveMode, vertex_count: u32) {
        self.record_draw(mode, vertex_count, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_unique_and_nonzero() {
        let mut device = HeadlessDevice::new();
        let a = device.create_buffer();
        let b = device.create_buffer();
        assert!(!a.is_null() && !b.is_null());
        assert_ne!(a, b);
    }

    #[test]
    fn test_failed_allocation_returns_null() {
        let mut device = HeadlessDevice::new();
        device.set_fail_allocations(true);
        assert!(device.create_vertex_array().is_null());
        assert_eq!(device.live_handles(), 0);
    }

    #[test]
    fn test_double_delete_is_reported() {
        let mut device = HeadlessDevice::new();
        let buffer = device.create_buffer();
        device.delete_buffer(buffer);
        device.delete_buffer(buffer);
        assert_eq!(device.invalid_deletes(), 1);

        // Deleting the null handle mirrors the driver and is silently ignored.
        device.delete_buffer(BufferId::NULL);
        assert_eq!(device.invalid_deletes(), 1);
    }

    #[test]
    fn test_storage_allocation_vs_refresh() {
        let mut device = HeadlessDevice::new();
        let buffer = device.create_buffer();
        device.bind_buffer(BufferTarget::Array, buffer);
        device.buffer_data(BufferTarget::Array, &[0u8; 64], BufferUsage::DynamicDraw);
        device.buffer_sub_data(BufferTarget::Array, 0, &[1u8; 64]);

        let record = device.buffer(buffer).unwrap();
        assert_eq!(record.allocations, 1);
        assert_eq!(record.refreshes, 1);
        assert!(record.dynamic);
    }
}
