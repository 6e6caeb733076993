//! Texture assets and their import settings.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::ids::TextureId;

/// Sampler wrap mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WrapMode {
    /// Tile the texture.
    Repeat,
    /// Clamp to the edge texel.
    Clamp,
}

/// Compression quality requested from the importer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compression {
    /// Platform default.
    Default,
    /// Highest-quality block compression.
    HighQuality,
}

/// Importer configuration stored alongside a texture.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureImport {
    /// Texel data is sRGB-encoded color.
    pub srgb: bool,
    /// Texture is imported as a tangent-space normal map.
    pub normal_map: bool,
    /// Largest dimension the importer keeps.
    pub max_size: u32,
    /// Sampler wrap mode.
    pub wrap: WrapMode,
    /// Compression quality.
    pub compression: Compression,
}

impl Default for TextureImport {
    fn default() -> Self {
        Self {
            srgb: true,
            normal_map: false,
            max_size: 2048,
            wrap: WrapMode::Repeat,
            compression: Compression::Default,
        }
    }
}

impl TextureImport {
    /// Linear (non-color) data such as masks.
    pub fn linear() -> Self {
        Self {
            srgb: false,
            ..Self::default()
        }
    }

    /// Tangent-space normal map. Always linear.
    pub fn normal_map() -> Self {
        Self {
            srgb: false,
            normal_map: true,
            ..Self::default()
        }
    }

    /// Returns `true` if the importer treats the texels as linear data.
    pub fn is_linear(&self) -> bool {
        !self.srgb || self.normal_map
    }
}

/// A texture asset with decoded RGBA8 texels.
///
/// Image row 0 is the top of the texture; UV `(0, 0)` is its bottom-left corner.
#[derive(Clone, Debug)]
pub struct Texture {
    /// Asset identity.
    pub id: TextureId,
    /// Display name.
    pub name: String,
    /// Decoded texels.
    pub image: RgbaImage,
    /// Importer configuration.
    pub import: TextureImport,
}

impl Texture {
    /// Width and height in texels.
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}
