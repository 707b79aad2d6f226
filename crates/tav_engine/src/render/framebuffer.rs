//! Multisampled offscreen target
//!
//! The scene renders into a multisampled framebuffer; [`FrameBufferObject::resolve`]
//! blits it into a single-sample intermediate target and draws that target's
//! colour texture onto the default framebuffer with a full-screen quad.
//! Everything is size dependent, so a resize rebuilds the whole object.

use crate::backend::{FramebufferId, FramebufferTarget, GpuDevice, PrimitiveMode, RenderbufferId, TextureId, VertexArrayId};
use crate::render::geometry::GeometryRegistry;
use crate::render::shader::{ShaderLibrary, ShaderRole};
use crate::render::RenderError;
use crate::scene::entity::{DrawContext, DrawOutcome, Drawable, SceneEntity};
use crate::scene::object::SceneObject;
use crate::scene::primitives;

/// Default multisample count
pub const DEFAULT_SAMPLES: u32 = 4;

/// Anti-alias render target plus its resolve target and screen quad
#[derive(Debug)]
pub struct FrameBufferObject {
    width: u32,
    height: u32,
    samples: u32,
    framebuffer: FramebufferId,
    color_texture: TextureId,
    depth_stencil: RenderbufferId,
    intermediate: FramebufferId,
    screen_texture: TextureId,
    quad: SceneObject,
}

impl FrameBufferObject {
    /// Build both targets and upload the screen quad
    ///
    /// # Returns
    /// `IncompleteFramebuffer` if either target fails its completeness
    /// check, `AllocationFailed` for a null handle. Nothing stays allocated
    /// on failure.
    pub fn create(
        device: &mut dyn GpuDevice,
        registry: &mut GeometryRegistry,
        width: u32,
        height: u32,
        samples: u32,
    ) -> Result<Self, RenderError> {
        let mut fbo = Self {
            width,
            height,
            samples: samples.max(1),
            framebuffer: FramebufferId::NULL,
            color_texture: TextureId::NULL,
            depth_stencil: RenderbufferId::NULL,
            intermediate: FramebufferId::NULL,
            screen_texture: TextureId::NULL,
            quad: primitives::screen_quad(),
        };
        match fbo.build(device, registry) {
            Ok(()) => {
                log::debug!("Anti-alias framebuffer {}x{} ({} samples)", width, height, fbo.samples);
                Ok(fbo)
            }
            Err(e) => {
                log::error!("Anti-alias framebuffer {}x{} failed: {}", width, height, e);
                fbo.release(device, registry);
                Err(e)
            }
        }
    }

    fn build(&mut self, device: &mut dyn GpuDevice, registry: &mut GeometryRegistry) -> Result<(), RenderError> {
        let incomplete = RenderError::IncompleteFramebuffer { width: self.width, height: self.height };

        self.framebuffer = device.create_framebuffer();
        if self.framebuffer.is_null() {
            return Err(RenderError::AllocationFailed("multisample framebuffer".into()));
        }
        device.bind_framebuffer(FramebufferTarget::Both, self.framebuffer);
        self.color_texture = device.attach_color_texture(self.width, self.height, self.samples);
        self.depth_stencil = device.attach_depth_stencil(self.width, self.height, self.samples);
        let complete = device.framebuffer_complete();
        device.bind_framebuffer(FramebufferTarget::Both, FramebufferId::NULL);
        if !complete || self.color_texture.is_null() || self.depth_stencil.is_null() {
            return Err(incomplete);
        }

        self.intermediate = device.create_framebuffer();
        if self.intermediate.is_null() {
            return Err(RenderError::AllocationFailed("resolve framebuffer".into()));
        }
        device.bind_framebuffer(FramebufferTarget::Both, self.intermediate);
        self.screen_texture = device.attach_color_texture(self.width, self.height, 1);
        let complete = device.framebuffer_complete();
        device.bind_framebuffer(FramebufferTarget::Both, FramebufferId::NULL);
        if !complete || self.screen_texture.is_null() {
            return Err(incomplete);
        }

        self.quad.register(device, registry)
    }

    /// Release everything and rebuild at the new size
    pub fn resize(
        &mut self,
        device: &mut dyn GpuDevice,
        registry: &mut GeometryRegistry,
        width: u32,
        height: u32,
    ) -> Result<(), RenderError> {
        self.release(device, registry);
        self.width = width;
        self.height = height;
        match self.build(device, registry) {
            Ok(()) => Ok(()),
            Err(e) => {
                log::error!("Anti-alias framebuffer resize to {}x{} failed: {}", width, height, e);
                self.release(device, registry);
                Err(e)
            }
        }
    }

    /// Direct subsequent draws into the multisampled target
    pub fn begin(&self, device: &mut dyn GpuDevice) {
        device.bind_framebuffer(FramebufferTarget::Both, self.framebuffer);
    }

    /// Blit into the resolve target and draw it to the default framebuffer
    pub fn resolve(&mut self, device: &mut dyn GpuDevice, shaders: &ShaderLibrary) -> Result<DrawOutcome, RenderError> {
        if !self.is_complete() {
            return Ok(DrawOutcome::Skipped);
        }
        device.bind_framebuffer(FramebufferTarget::Read, self.framebuffer);
        device.bind_framebuffer(FramebufferTarget::Draw, self.intermediate);
        device.blit_framebuffer(self.width, self.height);
        device.bind_framebuffer(FramebufferTarget::Both, FramebufferId::NULL);

        let shader = shaders
            .role(ShaderRole::AntiAlias)
            .ok_or_else(|| RenderError::MissingShader(format!("{:?}", ShaderRole::AntiAlias)))?;
        device.set_depth_test(false);
        shader.use_program(device);
        shader.set_int(device, "screenTexture", 0);
        device.bind_texture(0, self.screen_texture);

        let geometry = self.quad.geometry();
        device.bind_vertex_array(geometry.vertex_array);
        device.draw_elements(PrimitiveMode::Triangles, geometry.index_count);
        device.bind_vertex_array(VertexArrayId::NULL);
        device.bind_texture(0, TextureId::NULL);
        device.set_depth_test(true);
        Ok(DrawOutcome::Drawn(1))
    }

    /// Delete every handle; safe to call twice
    pub fn release(&mut self, device: &mut dyn GpuDevice, registry: &mut GeometryRegistry) {
        self.quad.release(device, registry);
        for texture in [&mut self.color_texture, &mut self.screen_texture] {
            if !texture.is_null() {
                device.delete_texture(std::mem::take(texture));
            }
        }
        if !self.depth_stencil.is_null() {
            device.delete_renderbuffer(std::mem::take(&mut self.depth_stencil));
        }
        for framebuffer in [&mut self.framebuffer, &mut self.intermediate] {
            if !framebuffer.is_null() {
                device.delete_framebuffer(std::mem::take(framebuffer));
            }
        }
    }

    /// True when both targets and the quad are resident
    pub fn is_complete(&self) -> bool {
        !self.framebuffer.is_null() && !self.intermediate.is_null() && self.quad.exists()
    }

    /// Current size in pixels
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Multisample count
    pub fn samples(&self) -> u32 {
        self.samples
    }

    /// Resolved colour texture
    pub fn screen_texture(&self) -> TextureId {
        self.screen_texture
    }
}

impl Drawable for FrameBufferObject {
    fn draw(&mut self, ctx: &mut DrawContext<'_>) -> Result<DrawOutcome, RenderError> {
        self.resolve(ctx.device, ctx.shaders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessDevice;
    use std::path::Path;

    #[test]
    fn test_create_and_release() {
        let mut device = HeadlessDevice::new();
        let mut registry = GeometryRegistry::new();
        let mut fbo = FrameBufferObject::create(&mut device, &mut registry, 800, 600, DEFAULT_SAMPLES).unwrap();
        assert!(fbo.is_complete());
        assert_eq!(device.live_framebuffers(), 2);

        fbo.release(&mut device, &mut registry);
        fbo.release(&mut device, &mut registry);
        assert!(!fbo.is_complete());
        assert_eq!(device.live_handles(), 0);
        assert_eq!(device.invalid_deletes(), 0);
    }

    #[test]
    fn test_resize_rebuilds() {
        let mut device = HeadlessDevice::new();
        let mut registry = GeometryRegistry::new();
        let mut fbo = FrameBufferObject::create(&mut device, &mut registry, 800, 600, DEFAULT_SAMPLES).unwrap();
        let before = fbo.screen_texture();

        fbo.resize(&mut device, &mut registry, 1024, 768).unwrap();
        assert_eq!(fbo.size(), (1024, 768));
        assert_ne!(fbo.screen_texture(), before);
        assert_eq!(device.live_framebuffers(), 2);
    }

    #[test]
    fn test_incomplete_target_is_an_error() {
        let mut device = HeadlessDevice::new();
        let mut registry = GeometryRegistry::new();
        device.set_incomplete_framebuffers(true);
        let result = FrameBufferObject::create(&mut device, &mut registry, 800, 600, DEFAULT_SAMPLES);
        assert!(matches!(result, Err(RenderError::IncompleteFramebuffer { width: 800, height: 600 })));
        assert_eq!(device.live_handles(), 0);
    }

    #[test]
    fn test_resolve_blits_and_draws_quad() {
        let mut device = HeadlessDevice::new();
        let mut registry = GeometryRegistry::new();
        let shaders = ShaderLibrary::load_builtin(&mut device, Path::new("missing-shader-dir"));
        let mut fbo = FrameBufferObject::create(&mut device, &mut registry, 800, 600, DEFAULT_SAMPLES).unwrap();

        fbo.begin(&mut device);
        assert_eq!(fbo.resolve(&mut device, &shaders).unwrap(), DrawOutcome::Drawn(1));
        assert_eq!(device.blits(), 1);
        assert_eq!(device.draws().last().map(|d| d.count), Some(6));
    }
}
