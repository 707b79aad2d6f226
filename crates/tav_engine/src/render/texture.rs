//! GPU textures and the shared texture cache
//!
//! Textures are deduplicated by normalized source path. The cache hands out
//! `Rc<Texture>` clones; a texture stays resident while any entity holds a
//! clone and is deleted by [`TextureCache::evict_unused`] once the cache holds
//! the last reference.

use std::cell::Cell;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

use crate::assets::TextureImage;
use crate::backend::{GpuDevice, TextureId};
use crate::render::RenderError;

/// A texture resident on the GPU
#[derive(Debug)]
pub struct Texture {
    id: Cell<TextureId>,
    path: PathBuf,
    width: u32,
    height: u32,
}

impl Texture {
    /// GPU handle; null once released
    pub fn id(&self) -> TextureId {
        self.id.get()
    }

    /// Normalized source path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Dimensions in pixels
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Bind to a sampler unit
    pub fn bind(&self, device: &mut dyn GpuDevice, unit: u32) {
        device.bind_texture(unit, self.id());
    }

    fn release(&self, device: &mut dyn GpuDevice) {
        let id = self.id.replace(TextureId::NULL);
        if !id.is_null() {
            device.delete_texture(id);
        }
    }
}

/// Path-keyed, reference-counted texture store
#[derive(Debug, Default)]
pub struct TextureCache {
    textures: HashMap<PathBuf, Rc<Texture>>,
}

impl TextureCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a texture, decoding and uploading it on first use
    pub fn acquire(&mut self, device: &mut dyn GpuDevice, path: impl AsRef<Path>) -> Result<Rc<Texture>, RenderError> {
        let key = normalize_path(path.as_ref());
        if let Some(texture) = self.textures.get(&key) {
            return Ok(Rc::clone(texture));
        }
        let image = TextureImage::from_file(&key)?;
        self.insert_image(device, key, &image)
    }

    /// Upload an already decoded image under `path`
    pub fn insert_image(
        &mut self,
        device: &mut dyn GpuDevice,
        path: impl AsRef<Path>,
        image: &TextureImage,
    ) -> Result<Rc<Texture>, RenderError> {
        let key = normalize_path(path.as_ref());
        if let Some(texture) = self.textures.get(&key) {
            return Ok(Rc::clone(texture));
        }

        let id = device.create_texture(image);
        if id.is_null() {
            log::error!("Texture upload failed for {:?}", key);
            return Err(RenderError::AllocationFailed(format!("texture {}", key.display())));
        }

        let texture = Rc::new(Texture { id: Cell::new(id), path: key.clone(), width: image.width, height: image.height });
        log::debug!("Cached texture {:?} as {}", key, id.0);
        self.textures.insert(key, Rc::clone(&texture));
        Ok(texture)
    }

    /// Delete every texture no entity references any more
    ///
    /// # Returns
    /// Number of textures released
    pub fn evict_unused(&mut self, device: &mut dyn GpuDevice) -> usize {
        let unused: Vec<PathBuf> = self
            .textures
            .iter()
            .filter(|(_, texture)| Rc::strong_count(texture) == 1)
            .map(|(path, _)| path.clone())
            .collect();

        for path in &unused {
            if let Some(texture) = self.textures.remove(path) {
                texture.release(device);
            }
        }
        unused.len()
    }

    /// Delete every texture, shared or not
    pub fn release_all(&mut self, device: &mut dyn GpuDevice) {
        for (_, texture) in self.textures.drain() {
            texture.release(device);
        }
    }

    /// Number of cached textures
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    /// True when nothing is cached
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// True if `path` is cached
    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.textures.contains_key(&normalize_path(path.as_ref()))
    }
}

/// Canonical form of a path used as the cache key
///
/// Uses the filesystem when the file exists and falls back to lexical
/// clean-up (`.` removed, `..` folded) otherwise.
pub fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessDevice;

    #[test]
    fn test_same_path_is_deduplicated() {
        let mut device = HeadlessDevice::new();
        let mut cache = TextureCache::new();
        let image = TextureImage::solid_color(2, 2, [255; 4]);

        let a = cache.insert_image(&mut device, "assets/./grass.png", &image).unwrap();
        let b = cache.insert_image(&mut device, "assets/models/../grass.png", &image).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
        assert_eq!(device.live_textures(), 1);
    }

    #[test]
    fn test_eviction_waits_for_last_reference() {
        let mut device = HeadlessDevice::new();
        let mut cache = TextureCache::new();
        let image = TextureImage::solid_color(1, 1, [0; 4]);

        let held = cache.insert_image(&mut device, "a.png", &image).unwrap();
        assert_eq!(cache.evict_unused(&mut device), 0);

        drop(held);
        assert_eq!(cache.evict_unused(&mut device), 1);
        assert!(cache.is_empty());
        assert_eq!(device.live_textures(), 0);
    }

    #[test]
    fn test_release_all_zeroes_shared_handles() {
        let mut device = HeadlessDevice::new();
        let mut cache = TextureCache::new();
        let held = cache.insert_image(&mut device, "b.png", &TextureImage::solid_color(1, 1, [0; 4])).unwrap();

        cache.release_all(&mut device);
        assert!(held.id().is_null());
        assert_eq!(device.invalid_deletes(), 0);
    }

    #[test]
    fn test_missing_file_is_reported() {
        let mut device = HeadlessDevice::new();
        let mut cache = TextureCache::new();
        assert!(cache.acquire(&mut device, "missing/texture.png").is_err());
        assert!(cache.is_empty());
    }
}
