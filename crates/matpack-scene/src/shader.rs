//! Shader declarations: the ordered list of properties a material can set.

use std::mem;

use serde::{Deserialize, Serialize};

use crate::ids::ShaderId;
use crate::material::PropertyValue;

/// Declared type of a shader property.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum PropertyKind {
    /// 2D texture with per-material scale/offset.
    Texture,
    /// RGBA color.
    Color,
    /// Unbounded scalar.
    Float,
    /// Scalar with an editor slider range.
    Range {
        /// Lower slider bound.
        min: f32,
        /// Upper slider bound.
        max: f32,
    },
    /// Four-component vector.
    Vector,
}

impl PropertyKind {
    /// Returns `true` for texture properties.
    pub fn is_texture(&self) -> bool {
        matches!(self, Self::Texture)
    }

    /// Returns `true` for `Float` and `Range` properties.
    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Float | Self::Range { .. })
    }

    /// Returns `true` if both kinds are the same variant, ignoring range bounds.
    pub fn same_kind(&self, other: &PropertyKind) -> bool {
        mem::discriminant(self) == mem::discriminant(other)
    }

    /// Short lowercase label used in tables and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Texture => "texture",
            Self::Color => "color",
            Self::Float => "float",
            Self::Range { .. } => "range",
            Self::Vector => "vector",
        }
    }
}

/// One declared shader property with its default value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShaderProperty {
    /// Property name as referenced by materials (e.g. `_MainTex`).
    pub name: String,
    /// Declared type.
    pub kind: PropertyKind,
    /// Value a freshly-instantiated material holds.
    pub default: PropertyValue,
}

impl ShaderProperty {
    /// Creates a texture property whose default is an unbound slot.
    pub fn texture(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: PropertyKind::Texture,
            default: PropertyValue::Texture(Default::default()),
        }
    }

    /// Creates a color property.
    pub fn color(name: impl Into<String>, default: [f32; 4]) -> Self {
        Self {
            name: name.into(),
            kind: PropertyKind::Color,
            default: PropertyValue::Color(default),
        }
    }

    /// Creates a float property.
    pub fn float(name: impl Into<String>, default: f32) -> Self {
        Self {
            name: name.into(),
            kind: PropertyKind::Float,
            default: PropertyValue::Float(default),
        }
    }

    /// Creates a range property.
    pub fn range(name: impl Into<String>, min: f32, max: f32, default: f32) -> Self {
        Self {
            name: name.into(),
            kind: PropertyKind::Range { min, max },
            default: PropertyValue::Float(default),
        }
    }

    /// Creates a vector property.
    pub fn vector(name: impl Into<String>, default: [f32; 4]) -> Self {
        Self {
            name: name.into(),
            kind: PropertyKind::Vector,
            default: PropertyValue::Vector(default),
        }
    }
}

/// A shader asset: identity, display name, and declared properties in order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Shader {
    /// Stable identity.
    pub id: ShaderId,
    /// Display name (e.g. `Standard` or `Custom/Toon`).
    pub name: String,
    /// Declared properties, in declaration order.
    pub properties: Vec<ShaderProperty>,
}

impl Shader {
    /// Looks up a property by name.
    pub fn property(&self, name: &str) -> Option<&ShaderProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Returns `true` if the shader declares a property with this name.
    pub fn has_property(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    /// Two shaders are compatible when they declare the same property names with
    /// the same kinds, regardless of order or defaults.
    pub fn is_compatible_with(&self, other: &Shader) -> bool {
        if self.id == other.id {
            return true;
        }
        self.properties.len() == other.properties.len()
            && self.properties.iter().all(|p| {
                other
                    .property(&p.name)
                    .is_some_and(|o| o.kind.same_kind(&p.kind))
            })
    }
}
