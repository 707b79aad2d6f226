//! OpenGL implementation of the engine's device trait
//!
//! Every call maps onto one or two GL entry points loaded through GLFW. The
//! context must be current on the calling thread for the device's lifetime.

use std::collections::HashMap;
use std::ffi::{c_void, CString};
use std::ptr;

use gl::types::{GLenum, GLint, GLsizei, GLsizeiptr, GLuint};
use tav_engine::assets::{PixelFormat, TextureImage};
use tav_engine::backend::{
    BufferId, BufferTarget, BufferUsage, FramebufferId, FramebufferTarget, GpuDevice, PrimitiveMode, ProgramBuild,
    ProgramId, RenderbufferId, TextureId, UniformValue, VertexArrayId, VertexAttribute,
};

/// Device issuing real GL calls on the current context
#[derive(Debug, Default)]
pub struct GlDevice {
    current_program: ProgramId,
    uniform_locations: HashMap<(ProgramId, String), GLint>,
}

impl GlDevice {
    /// Load GL entry points with `loader` and wrap the current context
    pub fn load<F>(loader: F) -> Self
    where
        F: FnMut(&'static str) -> *const c_void,
    {
        gl::load_with(loader);
        let device = Self::default();
        log::info!("OpenGL {} on {}", device.string(gl::VERSION), device.string(gl::RENDERER));
        device
    }

    fn string(&self, name: GLenum) -> String {
        // SAFETY: glGetString returns a static NUL-terminated string or null.
        unsafe {
            let raw = gl::GetString(name);
            if raw.is_null() {
                return String::from("unknown");
            }
            std::ffi::CStr::from_ptr(raw.cast()).to_string_lossy().into_owned()
        }
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<GLint> {
        let key = (program, name.to_string());
        if let Some(&location) = self.uniform_locations.get(&key) {
            return (location >= 0).then_some(location);
        }
        let c_name = CString::new(name).ok()?;
        // SAFETY: `c_name` outlives the call.
        let location = unsafe { gl::GetUniformLocation(program.0, c_name.as_ptr()) };
        self.uniform_locations.insert(key, location);
        (location >= 0).then_some(location)
    }
}

fn buffer_target(target: BufferTarget) -> GLenum {
    match target {
        BufferTarget::Array => gl::ARRAY_BUFFER,
        BufferTarget::ElementArray => gl::ELEMENT_ARRAY_BUFFER,
    }
}

fn framebuffer_target(target: FramebufferTarget) -> GLenum {
    match target {
        FramebufferTarget::Both => gl::FRAMEBUFFER,
        FramebufferTarget::Read => gl::READ_FRAMEBUFFER,
        FramebufferTarget::Draw => gl::DRAW_FRAMEBUFFER,
    }
}

fn primitive(mode: PrimitiveMode) -> GLenum {
    match mode {
        PrimitiveMode::Triangles => gl::TRIANGLES,
        PrimitiveMode::Lines => gl::LINES,
    }
}

fn pixel_format(format: PixelFormat) -> GLenum {
    match format {
        PixelFormat::Red => gl::RED,
        PixelFormat::RedGreen => gl::RG,
        PixelFormat::Rgb => gl::RGB,
        PixelFormat::Rgba => gl::RGBA,
    }
}

fn compile_stage(kind: GLenum, source: &str) -> (GLuint, Option<String>) {
    let Ok(source) = CString::new(source) else {
        return (0, Some(String::from("shader source contains a NUL byte")));
    };
    // SAFETY: `source` outlives the calls; the log buffer is sized from INFO_LOG_LENGTH.
    unsafe {
        let shader = gl::CreateShader(kind);
        gl::ShaderSource(shader, 1, &source.as_ptr(), ptr::null());
        gl::CompileShader(shader);

        let mut status = GLint::from(gl::FALSE);
        gl::GetShaderiv(shader, gl::COMPILE_STATUS, &mut status);
        if status == GLint::from(gl::TRUE) {
            return (shader, None);
        }
        let mut length = 0;
        gl::GetShaderiv(shader, gl::INFO_LOG_LENGTH, &mut length);
        let mut log = vec![0u8; length.max(1) as usize];
        gl::GetShaderInfoLog(shader, length, ptr::null_mut(), log.as_mut_ptr().cast());
        (shader, Some(String::from_utf8_lossy(&log).trim_end_matches('\0').to_string()))
    }
}

impl GpuDevice for GlDevice {
    fn create_vertex_array(&mut self) -> VertexArrayId {
        let mut id = 0;
        // SAFETY: writes one name into `id`.
        unsafe { gl::GenVertexArrays(1, &mut id) };
        VertexArrayId(id)
    }

    fn create_buffer(&mut self) -> BufferId {
        let mut id = 0;
        // SAFETY: writes one name into `id`.
        unsafe { gl::GenBuffers(1, &mut id) };
        BufferId(id)
    }

    fn delete_vertex_array(&mut self, id: VertexArrayId) {
        if !id.is_null() {
            // SAFETY: reads one name.
            unsafe { gl::DeleteVertexArrays(1, &id.0) };
        }
    }

    fn delete_buffer(&mut self, id: BufferId) {
        if !id.is_null() {
            // SAFETY: reads one name.
            unsafe { gl::DeleteBuffers(1, &id.0) };
        }
    }

    fn bind_vertex_array(&mut self, id: VertexArrayId) {
        unsafe { gl::BindVertexArray(id.0) };
    }

    fn bind_buffer(&mut self, target: BufferTarget, id: BufferId) {
        unsafe { gl::BindBuffer(buffer_target(target), id.0) };
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        let usage = match usage {
            BufferUsage::StaticDraw => gl::STATIC_DRAW,
            BufferUsage::DynamicDraw => gl::DYNAMIC_DRAW,
        };
        // SAFETY: GL copies `data.len()` bytes before returning.
        unsafe { gl::BufferData(buffer_target(target), data.len() as GLsizeiptr, data.as_ptr().cast(), usage) };
    }

    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) {
        // SAFETY: GL copies `data.len()` bytes before returning.
        unsafe {
            gl::BufferSubData(buffer_target(target), offset as isize, data.len() as GLsizeiptr, data.as_ptr().cast());
        }
    }

    fn vertex_attribute(&mut self, attribute: &VertexAttribute) {
        // SAFETY: the offset is a byte offset into the bound array buffer, not a host pointer.
        unsafe {
            gl::EnableVertexAttribArray(attribute.location);
            gl::VertexAttribPointer(
                attribute.location,
                attribute.components as GLint,
                gl::FLOAT,
                gl::FALSE,
                attribute.stride as GLsizei,
                attribute.offset as *const c_void,
            );
            gl::VertexAttribDivisor(attribute.location, attribute.divisor);
        }
    }

    fn create_texture(&mut self, image: &TextureImage) -> TextureId {
        let format = pixel_format(image.format);
        let mut id = 0;
        // SAFETY: `pixels` holds width × height × channels bytes with alignment 1.
        unsafe {
            gl::GenTextures(1, &mut id);
            gl::BindTexture(gl::TEXTURE_2D, id);
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_S, gl::REPEAT as GLint);
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_T, gl::REPEAT as GLint);
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, gl::LINEAR_MIPMAP_LINEAR as GLint);
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, gl::LINEAR as GLint);
            gl::PixelStorei(gl::UNPACK_ALIGNMENT, 1);
            gl::TexImage2D(
                gl::TEXTURE_2D,
                0,
                format as GLint,
                image.width as GLsizei,
                image.height as GLsizei,
                0,
                format,
                gl::UNSIGNED_BYTE,
                image.pixels.as_ptr().cast(),
            );
            gl::GenerateMipmap(gl::TEXTURE_2D);
            gl::BindTexture(gl::TEXTURE_2D, 0);
        }
        TextureId(id)
    }

    fn delete_texture(&mut self, id: TextureId) {
        if !id.is_null() {
            // SAFETY: reads one name.
            unsafe { gl::DeleteTextures(1, &id.0) };
        }
    }

    fn bind_texture(&mut self, unit: u32, id: TextureId) {
        unsafe {
            gl::ActiveTexture(gl::TEXTURE0 + unit);
            gl::BindTexture(gl::TEXTURE_2D, id.0);
        }
    }

    fn create_program(&mut self, vertex_source: &str, fragment_source: &str) -> ProgramBuild {
        let (vertex, vertex_log) = compile_stage(gl::VERTEX_SHADER, vertex_source);
        let (fragment, fragment_log) = compile_stage(gl::FRAGMENT_SHADER, fragment_source);
        let mut diagnostics: Vec<String> = [vertex_log, fragment_log].into_iter().flatten().collect();

        // SAFETY: the log buffer is sized from INFO_LOG_LENGTH.
        let program = unsafe {
            let program = gl::CreateProgram();
            gl::AttachShader(program, vertex);
            gl::AttachShader(program, fragment);
            gl::LinkProgram(program);

            let mut status = GLint::from(gl::FALSE);
            gl::GetProgramiv(program, gl::LINK_STATUS, &mut status);
            if status != GLint::from(gl::TRUE) {
                let mut length = 0;
                gl::GetProgramiv(program, gl::INFO_LOG_LENGTH, &mut length);
                let mut log = vec![0u8; length.max(1) as usize];
                gl::GetProgramInfoLog(program, length, ptr::null_mut(), log.as_mut_ptr().cast());
                diagnostics.push(String::from_utf8_lossy(&log).trim_end_matches('\0').to_string());
            }
            gl::DeleteShader(vertex);
            gl::DeleteShader(fragment);
            program
        };

        ProgramBuild {
            program: ProgramId(program),
            diagnostics: (!diagnostics.is_empty()).then(|| diagnostics.join("\n")),
        }
    }

    fn delete_program(&mut self, id: ProgramId) {
        if id.is_null() {
            return;
        }
        self.uniform_locations.retain(|(program, _), _| *program != id);
        if self.current_program == id {
            self.current_program = ProgramId::NULL;
        }
        unsafe { gl::DeleteProgram(id.0) };
    }

    fn use_program(&mut self, id: ProgramId) {
        self.current_program = id;
        unsafe { gl::UseProgram(id.0) };
    }

    fn set_uniform(&mut self, program: ProgramId, name: &str, value: &UniformValue) {
        let Some(location) = self.uniform_location(program, name) else { return };
        if self.current_program != program {
            self.use_program(program);
        }
        // SAFETY: matrix pointers reference column-major nalgebra storage of the right size.
        unsafe {
            match value {
                UniformValue::Bool(v) => gl::Uniform1i(location, GLint::from(*v)),
                UniformValue::Int(v) => gl::Uniform1i(location, *v),
                UniformValue::Float(v) => gl::Uniform1f(location, *v),
                UniformValue::Vec2(v) => gl::Uniform2f(location, v.x, v.y),
                UniformValue::Vec3(v) => gl::Uniform3f(location, v.x, v.y, v.z),
                UniformValue::Vec4(v) => gl::Uniform4f(location, v.x, v.y, v.z, v.w),
                UniformValue::Mat2(m) => gl::UniformMatrix2fv(location, 1, gl::FALSE, m.as_ptr()),
                UniformValue::Mat3(m) => gl::UniformMatrix3fv(location, 1, gl::FALSE, m.as_ptr()),
                UniformValue::Mat4(m) => gl::UniformMatrix4fv(location, 1, gl::FALSE, m.as_ptr()),
            }
        }
    }

    fn create_framebuffer(&mut self) -> FramebufferId {
        let mut id = 0;
        // SAFETY: writes one name into `id`.
        unsafe { gl::GenFramebuffers(1, &mut id) };
        FramebufferId(id)
    }

    fn delete_framebuffer(&mut self, id: FramebufferId) {
        if !id.is_null() {
            // SAFETY: reads one name.
            unsafe { gl::DeleteFramebuffers(1, &id.0) };
        }
    }

    fn bind_framebuffer(&mut self, target: FramebufferTarget, id: FramebufferId) {
        unsafe { gl::BindFramebuffer(framebuffer_target(target), id.0) };
    }

    fn attach_color_texture(&mut self, width: u32, height: u32, samples: u32) -> TextureId {
        let mut id = 0;
        // SAFETY: storage is allocated without host data.
        unsafe {
            gl::GenTextures(1, &mut id);
            if samples > 1 {
                gl::BindTexture(gl::TEXTURE_2D_MULTISAMPLE, id);
                gl::TexImage2DMultisample(
                    gl::TEXTURE_2D_MULTISAMPLE,
                    samples as GLsizei,
                    gl::RGB,
                    width as GLsizei,
                    height as GLsizei,
                    gl::TRUE,
                );
                gl::BindTexture(gl::TEXTURE_2D_MULTISAMPLE, 0);
                gl::FramebufferTexture2D(gl::FRAMEBUFFER, gl::COLOR_ATTACHMENT0, gl::TEXTURE_2D_MULTISAMPLE, id, 0);
            } else {
                gl::BindTexture(gl::TEXTURE_2D, id);
                gl::TexImage2D(
                    gl::TEXTURE_2D,
                    0,
                    gl::RGB as GLint,
                    width as GLsizei,
                    height as GLsizei,
                    0,
                    gl::RGB,
                    gl::UNSIGNED_BYTE,
                    ptr::null(),
                );
                gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, gl::LINEAR as GLint);
                gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, gl::LINEAR as GLint);
                gl::BindTexture(gl::TEXTURE_2D, 0);
                gl::FramebufferTexture2D(gl::FRAMEBUFFER, gl::COLOR_ATTACHMENT0, gl::TEXTURE_2D, id, 0);
            }
        }
        TextureId(id)
    }

    fn attach_depth_stencil(&mut self, width: u32, height: u32, samples: u32) -> RenderbufferId {
        let mut id = 0;
        // SAFETY: writes one name into `id`; storage is allocated without host data.
        unsafe {
            gl::GenRenderbuffers(1, &mut id);
            gl::BindRenderbuffer(gl::RENDERBUFFER, id);
            if samples > 1 {
                gl::RenderbufferStorageMultisample(
                    gl::RENDERBUFFER,
                    samples as GLsizei,
                    gl::DEPTH24_STENCIL8,
                    width as GLsizei,
                    height as GLsizei,
                );
            } else {
                gl::RenderbufferStorage(gl::RENDERBUFFER, gl::DEPTH24_STENCIL8, width as GLsizei, height as GLsizei);
            }
            gl::BindRenderbuffer(gl::RENDERBUFFER, 0);
            gl::FramebufferRenderbuffer(gl::FRAMEBUFFER, gl::DEPTH_STENCIL_ATTACHMENT, gl::RENDERBUFFER, id);
        }
        RenderbufferId(id)
    }

    fn delete_renderbuffer(&mut self, id: RenderbufferId) {
        if !id.is_null() {
            // SAFETY: reads one name.
            unsafe { gl::DeleteRenderbuffers(1, &id.0) };
        }
    }

    fn framebuffer_complete(&mut self) -> bool {
        unsafe { gl::CheckFramebufferStatus(gl::FRAMEBUFFER) == gl::FRAMEBUFFER_COMPLETE }
    }

    fn blit_framebuffer(&mut self, width: u32, height: u32) {
        let (w, h) = (width as GLint, height as GLint);
        unsafe { gl::BlitFramebuffer(0, 0, w, h, 0, 0, w, h, gl::COLOR_BUFFER_BIT, gl::NEAREST) };
    }

    fn viewport(&mut self, width: u32, height: u32) {
        unsafe { gl::Viewport(0, 0, width as GLsizei, height as GLsizei) };
    }

    fn clear(&mut self, color: [f32; 4]) {
        unsafe {
            gl::ClearColor(color[0], color[1], color[2], color[3]);
            gl::Clear(gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT);
        }
    }

    fn set_depth_test(&mut self, enabled: bool) {
        unsafe {
            if enabled {
                gl::Enable(gl::DEPTH_TEST);
            } else {
                gl::Disable(gl::DEPTH_TEST);
            }
        }
    }

    fn set_wireframe(&mut self, enabled: bool) {
        unsafe { gl::PolygonMode(gl::FRONT_AND_BACK, if enabled { gl::LINE } else { gl::FILL }) };
    }

    fn draw_elements(&mut self, mode: PrimitiveMode, index_count: u32) {
        // SAFETY: indices come from the element buffer captured by the bound vertex array.
        unsafe { gl::DrawElements(primitive(mode), index_count as GLsizei, gl::UNSIGNED_INT, ptr::null()) };
    }

    fn draw_elements_instanced(&mut self, mode: PrimitiveMode, index_count: u32, instance_count: u32) {
        // SAFETY: indices come from the element buffer captured by the bound vertex array.
        unsafe {
            gl::DrawElementsInstanced(
                primitive(mode),
                index_count as GLsizei,
                gl::UNSIGNED_INT,
                ptr::null(),
                instance_count as GLsizei,
            );
        }
    }

    fn draw_arrays(&mut self, mode: PrimitiveMode, vertex_count: u32) {
        unsafe { gl::DrawArrays(primitive(mode), 0, vertex_count as GLsizei) };
    }
}
