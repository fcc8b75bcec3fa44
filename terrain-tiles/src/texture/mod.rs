//! Decoding of fetched tile payloads into GPU-ready textures.
//!
//! Tiles are drawn as flat quads whose imagery is already resolution-matched
//! by the level selector, so textures use linear filtering in both directions
//! and never generate mipmaps. Pixels are expanded to tightly packed RGBA8 in
//! the sRGB color space.

mod error;

pub use error::TextureError;

/// Texture filtering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// Color space the texel values are encoded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Srgb,
    Linear,
}

/// Sampler configuration attached to a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerDesc {
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub generate_mipmaps: bool,
}

impl SamplerDesc {
    /// Sampler used for every basemap tile.
    pub const TILE: SamplerDesc = SamplerDesc {
        mag_filter: FilterMode::Linear,
        min_filter: FilterMode::Linear,
        generate_mipmaps: false,
    };
}

/// A decoded RGBA8 image ready for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA8 texels, `width * height * 4` bytes.
    pub rgba: Vec<u8>,
    pub sampler: SamplerDesc,
    pub color_space: ColorSpace,
}

impl std::fmt::Debug for TextureImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgba.len())
            .field("sampler", &self.sampler)
            .field("color_space", &self.color_space)
            .finish()
    }
}

/// Decodes an image payload (PNG or JPEG) into a tile texture.
///
/// The format is sniffed from the payload, not taken from the request.
pub fn decode_tile_image(payload: &[u8]) -> Result<TextureImage, TextureError> {
    if payload.is_empty() {
        return Err(TextureError::Empty);
    }

    let image =
        image::load_from_memory(payload).map_err(|e| TextureError::DecodeFailed(e.to_string()))?;
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(TextureError::InvalidDimensions { width, height });
    }

    Ok(TextureImage {
        width,
        height,
        rgba: rgba.into_raw(),
        sampler: SamplerDesc::TILE,
        color_space: ColorSpace::Srgb,
    })
}
