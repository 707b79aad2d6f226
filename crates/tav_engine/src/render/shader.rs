//! Shader programs
//!
//! A [`Shader`] remembers where its sources came from so it can be rebuilt in
//! place when the user asks for a reload. Build diagnostics are logged and
//! never fatal: a shader that fails to compile keeps whatever handle the
//! driver returned and the engine keeps running, which is what makes live
//! editing of shader files practical.

use std::path::{Path, PathBuf};

use slotmap::{new_key_type, SlotMap};

use crate::backend::{GpuDevice, ProgramId, UniformValue};
use crate::foundation::math::{Mat2, Mat3, Mat4, Vec2, Vec3, Vec4};
use crate::render::RenderError;

new_key_type! {
    /// Key of a shader in the [`ShaderLibrary`]
    pub struct ShaderKey;
}

/// Where a shader's sources come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderSource {
    /// Vertex and fragment files on disk
    Files {
        /// Vertex stage path
        vertex: PathBuf,
        /// Fragment stage path
        fragment: PathBuf,
    },
    /// Sources compiled into the binary
    Embedded {
        /// Vertex stage source
        vertex: &'static str,
        /// Fragment stage source
        fragment: &'static str,
    },
}

impl ShaderSource {
    fn read(&self) -> Result<(String, String), RenderError> {
        match self {
            Self::Files { vertex, fragment } => Ok((read_stage(vertex)?, read_stage(fragment)?)),
            Self::Embedded { vertex, fragment } => Ok(((*vertex).to_string(), (*fragment).to_string())),
        }
    }
}

fn read_stage(path: &Path) -> Result<String, RenderError> {
    std::fs::read_to_string(path).map_err(|e| {
        log::error!("Failed to read shader source {:?}: {}", path, e);
        RenderError::ShaderSource { path: path.display().to_string(), reason: e.to_string() }
    })
}

/// A linked GPU program
#[derive(Debug)]
pub struct Shader {
    name: String,
    source: ShaderSource,
    program: ProgramId,
}

impl Shader {
    /// Build a program from a source description
    pub fn build(device: &mut dyn GpuDevice, name: impl Into<String>, source: ShaderSource) -> Result<Self, RenderError> {
        let name = name.into();
        let (vertex, fragment) = source.read()?;
        let program = compile(device, &name, &vertex, &fragment);
        Ok(Self { name, source, program })
    }

    /// Build a program from a vertex and a fragment file
    pub fn from_files(
        device: &mut dyn GpuDevice,
        vertex: impl Into<PathBuf>,
        fragment: impl Into<PathBuf>,
    ) -> Result<Self, RenderError> {
        let vertex = vertex.into();
        let name = vertex.file_stem().map_or_else(|| "shader".to_string(), |s| s.to_string_lossy().into_owned());
        Self::build(device, name, ShaderSource::Files { vertex, fragment: fragment.into() })
    }

    /// Debug name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Program handle (may be null after a failed build)
    pub fn program(&self) -> ProgramId {
        self.program
    }

    /// Re-read the sources and rebuild, keeping the old program if the new
    /// build yields no handle
    pub fn reload(&mut self, device: &mut dyn GpuDevice) -> Result<(), RenderError> {
        let (vertex, fragment) = self.source.read()?;
        let program = compile(device, &self.name, &vertex, &fragment);
        if program.is_null() {
            return Ok(());
        }
        device.delete_program(self.program);
        self.program = program;
        log::info!("Reloaded shader '{}'", self.name);
        Ok(())
    }

    /// Delete the program
    pub fn release(&mut self, device: &mut dyn GpuDevice) {
        device.delete_program(self.program);
        self.program = ProgramId::NULL;
    }

    /// Make this program current
    pub fn use_program(&self, device: &mut dyn GpuDevice) {
        device.use_program(self.program);
    }

    /// Upload any uniform value
    pub fn set(&self, device: &mut dyn GpuDevice, name: &str, value: UniformValue) {
        device.set_uniform(self.program, name, &value);
    }

    /// Set a bool uniform
    pub fn set_bool(&self, device: &mut dyn GpuDevice, name: &str, value: bool) {
        self.set(device, name, UniformValue::Bool(value));
    }

    /// Set an int uniform
    pub fn set_int(&self, device: &mut dyn GpuDevice, name: &str, value: i32) {
        self.set(device, name, UniformValue::Int(value));
    }

    /// Set a float uniform
    pub fn set_float(&self, device: &mut dyn GpuDevice, name: &str, value: f32) {
        self.set(device, name, UniformValue::Float(value));
    }

    /// Set a vec2 uniform
    pub fn set_vec2(&self, device: &mut dyn GpuDevice, name: &str, value: Vec2) {
        self.set(device, name, UniformValue::Vec2(value));
    }

    /// Set a vec3 uniform
    pub fn set_vec3(&self, device: &mut dyn GpuDevice, name: &str, value: Vec3) {
        self.set(device, name, UniformValue::Vec3(value));
    }

    /// Set a vec4 uniform
    pub fn set_vec4(&self, device: &mut dyn GpuDevice, name: &str, value: Vec4) {
        self.set(device, name, UniformValue::Vec4(value));
    }

    /// Set a mat2 uniform
    pub fn set_mat2(&self, device: &mut dyn GpuDevice, name: &str, value: Mat2) {
        self.set(device, name, UniformValue::Mat2(value));
    }

    /// Set a mat3 uniform
    pub fn set_mat3(&self, device: &mut dyn GpuDevice, name: &str, value: Mat3) {
        self.set(device, name, UniformValue::Mat3(value));
    }

    /// Set a mat4 uniform
    pub fn set_mat4(&self, device: &mut dyn GpuDevice, name: &str, value: Mat4) {
        self.set(device, name, UniformValue::Mat4(value));
    }
}

fn compile(device: &mut dyn GpuDevice, name: &str, vertex: &str, fragment: &str) -> ProgramId {
    let build = device.create_program(vertex, fragment);
    if let Some(diagnostics) = &build.diagnostics {
        log::error!("Shader '{}' failed to build:\n{}", name, diagnostics);
    }
    if build.program.is_null() {
        log::error!("Shader '{}' has no program handle", name);
    }
    build.program
}

/// Programs the renderer itself depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderRole {
    /// Single-instance draws
    Default,
    /// Instanced draws reading the per-instance matrix attributes
    Instanced,
    /// Anti-alias resolve quad
    AntiAlias,
}

/// Owner of every shader program
#[derive(Debug, Default)]
pub struct ShaderLibrary {
    shaders: SlotMap<ShaderKey, Shader>,
    default: Option<ShaderKey>,
    instanced: Option<ShaderKey>,
    anti_alias: Option<ShaderKey>,
}

impl ShaderLibrary {
    /// Create an empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the built-in programs from `shader_dir`
    ///
    /// Any program whose files cannot be read falls back to the embedded
    /// sources so the engine still starts.
    pub fn load_builtin(device: &mut dyn GpuDevice, shader_dir: &Path) -> Self {
        let mut library = Self::new();
        let specs = [
            (ShaderRole::Default, "shader.vert", "shader.frag", embedded::DEFAULT_VERT, embedded::DEFAULT_FRAG),
            (ShaderRole::Instanced, "instance_shader.vert", "shader.frag", embedded::INSTANCED_VERT, embedded::DEFAULT_FRAG),
            (ShaderRole::AntiAlias, "aa_post.vert", "aa_post.frag", embedded::AA_VERT, embedded::AA_FRAG),
        ];

        for (role, vert, frag, fallback_vert, fallback_frag) in specs {
            let files = ShaderSource::Files { vertex: shader_dir.join(vert), fragment: shader_dir.join(frag) };
            let shader = Shader::build(device, vert, files).or_else(|_| {
                log::warn!("Using embedded sources for {:?} shader", role);
                Shader::build(device, vert, ShaderSource::Embedded { vertex: fallback_vert, fragment: fallback_frag })
            });
            match shader {
                Ok(shader) => {
                    library.insert_role(role, shader);
                }
                Err(e) => log::error!("Built-in {:?} shader unavailable: {}", role, e),
            }
        }
        library
    }

    /// Add a user program
    pub fn insert(&mut self, shader: Shader) -> ShaderKey {
        self.shaders.insert(shader)
    }

    /// Add a program and assign it a built-in role
    pub fn insert_role(&mut self, role: ShaderRole, shader: Shader) -> ShaderKey {
        let key = self.shaders.insert(shader);
        match role {
            ShaderRole::Default => self.default = Some(key),
            ShaderRole::Instanced => self.instanced = Some(key),
            ShaderRole::AntiAlias => self.anti_alias = Some(key),
        }
        key
    }

    /// Look up a program by key
    pub fn get(&self, key: ShaderKey) -> Option<&Shader> {
        self.shaders.get(key)
    }

    /// Look up a built-in program
    pub fn role(&self, role: ShaderRole) -> Option<&Shader> {
        let key = match role {
            ShaderRole::Default => self.default,
            ShaderRole::Instanced => self.instanced,
            ShaderRole::AntiAlias => self.anti_alias,
        }?;
        self.shaders.get(key)
    }

    /// Program for an entity: its own if set, otherwise the built-in for the draw kind
    pub fn resolve(&self, key: Option<ShaderKey>, instanced: bool) -> Result<&Shader, RenderError> {
        if let Some(shader) = key.and_then(|k| self.shaders.get(k)) {
            return Ok(shader);
        }
        let role = if instanced { ShaderRole::Instanced } else { ShaderRole::Default };
        self.role(role).ok_or_else(|| RenderError::MissingShader(format!("{:?}", role)))
    }

    /// Rebuild every program from its sources
    ///
    /// # Returns
    /// Number of programs that could not be re-read
    pub fn reload_all(&mut self, device: &mut dyn GpuDevice) -> usize {
        let mut failures = 0;
        for (_, shader) in &mut self.shaders {
            if let Err(e) = shader.reload(device) {
                log::error!("Reload of '{}' failed: {}", shader.name(), e);
                failures += 1;
            }
        }
        log::info!("Reloaded {} shader(s), {} failure(s)", self.shaders.len(), failures);
        failures
    }

    /// Delete every program
    pub fn release_all(&mut self, device: &mut dyn GpuDevice) {
        for (_, mut shader) in self.shaders.drain() {
            shader.release(device);
        }
        self.default = None;
        self.instanced = None;
        self.anti_alias = None;
    }

    /// Number of programs
    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    /// True when no program is loaded
    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }
}

/// Fallback GLSL sources
mod embedded {
    pub const DEFAULT_VERT: &str = r"#version 460 core
layout (location = 0) in vec3 aPos;
layout (location = 1) in vec2 aTexCoord;
layout (location = 2) in vec3 aNormal;
uniform mat4 model;
uniform mat4 view;
uniform mat4 projection;
out vec2 TexCoord;
void main() {
    gl_Position = projection * view * model * vec4(aPos, 1.0);
    TexCoord = aTexCoord;
}
";

    pub const INSTANCED_VERT: &str = r"#version 460 core
layout (location = 0) in vec3 aPos;
layout (location = 1) in vec2 aTexCoord;
layout (location = 2) in vec3 aNormal;
layout (location = 3) in mat4 aInstanceModel;
uniform mat4 view;
uniform mat4 projection;
out vec2 TexCoord;
void main() {
    gl_Position = projection * view * aInstanceModel * vec4(aPos, 1.0);
    TexCoord = aTexCoord;
}
";

    pub const DEFAULT_FRAG: &str = r"#version 460 core
in vec2 TexCoord;
out vec4 FragColor;
uniform sampler2D texture1;
uniform bool useTexture;
uniform vec3 color;
void main() {
    FragColor = useTexture ? texture(texture1, TexCoord) : vec4(color, 1.0);
}
";

    pub const AA_VERT: &str = r"#version 460 core
layout (location = 0) in vec3 aPos;
layout (location = 1) in vec2 aTexCoord;
out vec2 TexCoord;
void main() {
    gl_Position = vec4(aPos.xy, 0.0, 1.0);
    TexCoord = aTexCoord;
}
";

    pub const AA_FRAG: &str = r"#version 460 core
in vec2 TexCoord;
out vec4 FragColor;
uniform sampler2D screenTexture;
void main() {
    FragColor = texture(screenTexture, TexCoord);
}
";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessDevice;

    #[test]
    fn test_builtin_falls_back_to_embedded_sources() {
        let mut device = HeadlessDevice::new();
        let library = ShaderLibrary::load_builtin(&mut device, Path::new("/no/such/dir"));
        assert_eq!(library.len(), 3);
        assert!(library.role(ShaderRole::AntiAlias).is_some());
        assert_eq!(device.live_programs(), 3);
    }

    #[test]
    fn test_build_diagnostics_are_not_fatal() {
        let mut device = HeadlessDevice::new();
        device.set_program_diagnostics(Some("0:1: syntax error".to_string()));
        let shader = Shader::build(
            &mut device,
            "broken",
            ShaderSource::Embedded { vertex: "bad", fragment: "bad" },
        )
        .unwrap();
        assert!(!shader.program().is_null());
    }

    #[test]
    fn test_reload_replaces_program() {
        let dir = std::env::temp_dir().join(format!("tav_shader_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("s.vert"), "void main() {}").unwrap();
        std::fs::write(dir.join("s.frag"), "void main() {}").unwrap();

        let mut device = HeadlessDevice::new();
        let mut shader = Shader::from_files(&mut device, dir.join("s.vert"), dir.join("s.frag")).unwrap();
        let before = shader.program();
        shader.reload(&mut device).unwrap();

        assert_ne!(shader.program(), before);
        assert_eq!(device.live_programs(), 1);
    }

    #[test]
    fn test_resolve_prefers_entity_shader() {
        let mut device = HeadlessDevice::new();
        let mut library = ShaderLibrary::load_builtin(&mut device, Path::new("/no/such/dir"));
        let custom = Shader::build(&mut device, "custom", ShaderSource::Embedded { vertex: "", fragment: "" }).unwrap();
        let custom_program = custom.program();
        let key = library.insert(custom);

        assert_eq!(library.resolve(Some(key), false).unwrap().program(), custom_program);
        let instanced = library.role(ShaderRole::Instanced).unwrap().program();
        assert_eq!(library.resolve(None, true).unwrap().program(), instanced);
    }

    #[test]
    fn test_uniform_upload() {
        let mut device = HeadlessDevice::new();
        let shader = Shader::build(&mut device, "u", ShaderSource::Embedded { vertex: "", fragment: "" }).unwrap();
        shader.set_vec3(&mut device, "color", Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(
            device.uniform(shader.program(), "color"),
            Some(&UniformValue::Vec3(Vec3::new(1.0, 0.0, 0.0)))
        );
    }
}
