//! Material values: a shader reference plus per-property overrides.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::ids::{MaterialId, ShaderId, TextureId};
use crate::shader::Shader;

/// Render queue at which the host starts treating geometry as transparent.
pub const TRANSPARENT_QUEUE: i32 = 3000;

/// Render queue assigned to freshly-instantiated materials.
pub const DEFAULT_QUEUE: i32 = 2000;

// ---------------------------------------------------------------------------
// TextureSlot
// ---------------------------------------------------------------------------

/// A texture binding with its UV scale and offset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextureSlot {
    /// Bound texture, or `None` for an empty slot.
    pub texture: Option<TextureId>,
    /// UV scale (tiling).
    pub scale: [f32; 2],
    /// UV offset.
    pub offset: [f32; 2],
}

impl Default for TextureSlot {
    fn default() -> Self {
        Self {
            texture: None,
            scale: [1.0, 1.0],
            offset: [0.0, 0.0],
        }
    }
}

impl TextureSlot {
    /// Binds `texture` with identity scale/offset.
    pub fn bound(texture: TextureId) -> Self {
        Self {
            texture: Some(texture),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// PropertyValue
// ---------------------------------------------------------------------------

/// The value a material holds for one shader property.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    /// Float or range value.
    Float(f32),
    /// RGBA color.
    Color([f32; 4]),
    /// Four-component vector.
    Vector([f32; 4]),
    /// Texture binding.
    Texture(TextureSlot),
}

impl PropertyValue {
    /// Returns the scalar, if this is a float value.
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the four components of a color or vector value.
    pub fn as_color(&self) -> Option<[f32; 4]> {
        match self {
            Self::Color(c) | Self::Vector(c) => Some(*c),
            _ => None,
        }
    }

    /// Returns the texture binding, if this is a texture value.
    pub fn as_texture(&self) -> Option<&TextureSlot> {
        match self {
            Self::Texture(slot) => Some(slot),
            _ => None,
        }
    }

    /// Formats the value for distinctness comparisons: six decimals for
    /// scalars, five per component for colors and vectors.
    pub fn distinct_key(&self) -> String {
        match self {
            Self::Float(v) => format!("{v:.6}"),
            Self::Color(c) | Self::Vector(c) => {
                format!("{:.5},{:.5},{:.5},{:.5}", c[0], c[1], c[2], c[3])
            }
            Self::Texture(slot) => match &slot.texture {
                Some(id) => id.to_string(),
                None => String::new(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Material
// ---------------------------------------------------------------------------

/// A material asset.
///
/// Only overridden properties are stored in `values`; reads through
/// [`Material::value`] fall back to the shader's declared default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Asset identity.
    pub id: MaterialId,
    /// Display name.
    pub name: String,
    /// Shader this material renders with.
    pub shader: ShaderId,
    /// Enabled shader keywords.
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    /// Render queue.
    #[serde(default = "default_queue")]
    pub render_queue: i32,
    /// Shader/material tags such as `RenderType`.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Property overrides by name.
    #[serde(default)]
    pub values: BTreeMap<String, PropertyValue>,
}

fn default_queue() -> i32 {
    DEFAULT_QUEUE
}

impl Material {
    /// Creates an empty material for `shader` (every property at its default).
    pub fn new(id: MaterialId, name: impl Into<String>, shader: ShaderId) -> Self {
        Self {
            id,
            name: name.into(),
            shader,
            keywords: BTreeSet::new(),
            render_queue: DEFAULT_QUEUE,
            tags: BTreeMap::new(),
            values: BTreeMap::new(),
        }
    }

    /// Instantiates a material with every declared property explicitly set to the
    /// shader default.
    pub fn from_shader_defaults(id: MaterialId, shader: &Shader) -> Self {
        let mut material = Self::new(id, format!("{} (defaults)", shader.name), shader.id.clone());
        for prop in &shader.properties {
            material
                .values
                .insert(prop.name.clone(), prop.default.clone());
        }
        material
    }

    /// Returns the value for `name`, falling back to the shader default.
    ///
    /// Returns `None` if the shader does not declare the property and the
    /// material carries no override for it.
    pub fn value<'a>(&'a self, shader: &'a Shader, name: &str) -> Option<&'a PropertyValue> {
        self.values
            .get(name)
            .or_else(|| shader.property(name).map(|p| &p.default))
    }

    /// Sets (overrides) a property value.
    pub fn set_value(&mut self, name: impl Into<String>, value: PropertyValue) {
        self.values.insert(name.into(), value);
    }

    /// Returns the texture binding for `name`, falling back to the shader default.
    pub fn texture_slot<'a>(&'a self, shader: &'a Shader, name: &str) -> Option<&'a TextureSlot> {
        self.value(shader, name).and_then(PropertyValue::as_texture)
    }

    /// A material is transparent when its queue is in the transparent range or
    /// its `RenderType` tag names a transparent or fade mode.
    pub fn is_transparent(&self) -> bool {
        if self.render_queue >= TRANSPARENT_QUEUE {
            return true;
        }
        self.tags.get("RenderType").is_some_and(|tag| {
            let tag = tag.to_ascii_lowercase();
            tag.contains("transparent") || tag.contains("fade")
        })
    }
}
