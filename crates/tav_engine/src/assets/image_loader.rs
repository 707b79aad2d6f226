//! Image loading utilities for texture data
//!
//! Decodes image files with the `image` crate into tightly packed pixel rows
//! ready for GPU upload. Rows are flipped vertically so the first row is the
//! bottom of the image, matching texture-coordinate origin conventions.

use std::path::Path;

use crate::assets::AssetError;

/// Channel layout of decoded pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// One channel
    Red,
    /// Two channels
    RedGreen,
    /// Three channels
    Rgb,
    /// Four channels
    Rgba,
}

impl PixelFormat {
    /// Map a channel count to a format
    pub fn from_channels(channels: u8) -> Option<Self> {
        match channels {
            1 => Some(Self::Red),
            2 => Some(Self::RedGreen),
            3 => Some(Self::Rgb),
            4 => Some(Self::Rgba),
            _ => None,
        }
    }

    /// Number of channels
    pub fn channels(self) -> usize {
        match self {
            Self::Red => 1,
            Self::RedGreen => 2,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

/// Decoded image ready for GPU upload
#[derive(Debug, Clone, PartialEq)]
pub struct TextureImage {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Channel layout
    pub format: PixelFormat,
    /// Packed pixel data, bottom row first
    pub pixels: Vec<u8>,
}

impl TextureImage {
    /// Load an image from a file path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AssetError> {
        let path_ref = path.as_ref();
        log::debug!("Loading image from: {:?}", path_ref);

        let img = image::open(path_ref).map_err(|e| {
            log::error!("Failed to load texture {:?}: {}", path_ref, e);
            AssetError::Decode { path: path_ref.display().to_string(), reason: e.to_string() }
        })?;

        let image = Self::from_dynamic(img.flipv());
        log::info!("Loaded image {}x{} ({:?}) from {:?}", image.width, image.height, image.format, path_ref);
        Ok(image)
    }

    /// Decode an image held in memory
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AssetError> {
        let img = image::load_from_memory(bytes).map_err(|e| AssetError::Decode {
            path: "<memory>".to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_dynamic(img.flipv()))
    }

    fn from_dynamic(img: image::DynamicImage) -> Self {
        let (width, height) = (img.width(), img.height());
        let (format, pixels) = match img {
            image::DynamicImage::ImageLuma8(buf) => (PixelFormat::Red, buf.into_raw()),
            image::DynamicImage::ImageLumaA8(buf) => (PixelFormat::RedGreen, buf.into_raw()),
            image::DynamicImage::ImageRgb8(buf) => (PixelFormat::Rgb, buf.into_raw()),
            other => (PixelFormat::Rgba, other.to_rgba8().into_raw()),
        };
        Self { width, height, format, pixels }
    }

    /// Create a solid colour image (useful for testing and defaults)
    pub fn solid_color(width: u32, height: u32, color: [u8; 4]) -> Self {
        let pixel_count = (width * height) as usize;
        let mut pixels = Vec::with_capacity(pixel_count * 4);
        for _ in 0..pixel_count {
            pixels.extend_from_slice(&color);
        }
        Self { width, height, format: PixelFormat::Rgba, pixels }
    }
}
