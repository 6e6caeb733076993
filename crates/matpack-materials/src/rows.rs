//! Property rows: one shader property's cross-material statistics plus the
//! user's chosen resolution.

use matpack_scene::PropertyKind;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// BakeMode
// ---------------------------------------------------------------------------

/// How a differing scalar/color/vector property is resolved.
///
/// Modes that write into an atlas carry the destination texture property, so a
/// target can only exist when the mode needs one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BakeMode {
    /// Leave the template material's value on the merged material.
    Keep,
    /// Write the shader default onto the merged material.
    #[default]
    ResetToDefault,
    /// Fill each tile of `target` with the material's color.
    BakeColorToTexture {
        /// Destination texture property.
        target: String,
    },
    /// Fill each tile of `target` with the material's scalar as grayscale.
    BakeScalarToGrayscale {
        /// Destination texture property.
        target: String,
    },
    /// Multiply each sampled tile of `target` by the material's color.
    MultiplyColorWithTexture {
        /// Destination texture property.
        target: String,
    },
}

impl BakeMode {
    /// Destination texture property, if the mode writes into an atlas.
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Keep | Self::ResetToDefault => None,
            Self::BakeColorToTexture { target }
            | Self::BakeScalarToGrayscale { target }
            | Self::MultiplyColorWithTexture { target } => Some(target),
        }
    }

    /// Short label used in tables and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Keep => "keep",
            Self::ResetToDefault => "reset",
            Self::BakeColorToTexture { .. } => "bake-color",
            Self::BakeScalarToGrayscale { .. } => "bake-scalar",
            Self::MultiplyColorWithTexture { .. } => "multiply",
        }
    }
}

// ---------------------------------------------------------------------------
// Modifier
// ---------------------------------------------------------------------------

/// Arithmetic applied by a modifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModifierOp {
    /// `value * m`
    Multiply,
    /// `value + m`
    Add,
    /// `value - m`
    Subtract,
}

/// Adjusts a baked value by another scalar property of the same material:
/// `m = source * scale + bias`, optionally clamped to `[0, 1]`, then applied
/// per channel with `op`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    /// Scalar property supplying `m`.
    pub source: String,
    /// Operation.
    pub op: ModifierOp,
    /// Multiplier applied to the source value.
    pub scale: f32,
    /// Offset added after scaling.
    pub bias: f32,
    /// Clamp `m` to `[0, 1]` before applying.
    pub clamp01: bool,
    /// Apply to the alpha channel as well.
    pub include_alpha: bool,
}

impl Modifier {
    /// A plain multiply by `source`.
    pub fn multiply_by(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            op: ModifierOp::Multiply,
            scale: 1.0,
            bias: 0.0,
            clamp01: false,
            include_alpha: false,
        }
    }
}

// ---------------------------------------------------------------------------
// RowStats / RowPlan / PropertyRow
// ---------------------------------------------------------------------------

/// Statistics for a texture property.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureStats {
    /// Materials with a texture bound.
    pub non_null: usize,
    /// Distinct bound texture identities.
    pub distinct: usize,
    /// Distinct scale/offset tuples.
    pub st_distinct: usize,
    /// Holds tangent-space normals.
    pub is_normal_like: bool,
    /// Holds sRGB color data.
    pub is_srgb: bool,
}

/// Scanner output for one row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowStats {
    /// Texture property statistics.
    Texture(TextureStats),
    /// Distinct formatted values across the group (capped).
    Value {
        /// Number of distinct values, at most the collection cap.
        distinct: usize,
    },
}

/// User intent for a row.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RowPlan {
    /// For texture rows: pack into an atlas. For value rows: resolve via `bake`.
    pub do_action: bool,
    /// Resolution for value rows.
    pub bake: BakeMode,
    /// Optional value modifier used by baking modes.
    pub modifier: Option<Modifier>,
    /// Reset the property to its default on the merged material after baking.
    pub reset_after_bake: bool,
    /// Force alpha to 1 before baking a color.
    pub drop_alpha: bool,
}

/// One shader property's diff state within a group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertyRow {
    /// Property name.
    pub name: String,
    /// Declared type.
    pub kind: PropertyKind,
    /// Scanner statistics.
    pub stats: RowStats,
    /// User intent.
    pub plan: RowPlan,
}

impl PropertyRow {
    /// Returns `true` for texture rows.
    pub fn is_texture(&self) -> bool {
        matches!(self.stats, RowStats::Texture(_))
    }

    /// Texture statistics, if this is a texture row.
    pub fn texture_stats(&self) -> Option<&TextureStats> {
        match &self.stats {
            RowStats::Texture(stats) => Some(stats),
            RowStats::Value { .. } => None,
        }
    }

    /// Distinct textures for texture rows, distinct values otherwise.
    pub fn distinct_count(&self) -> usize {
        match &self.stats {
            RowStats::Texture(stats) => stats.distinct,
            RowStats::Value { distinct } => *distinct,
        }
    }

    /// A value row is unresolved when materials disagree and no action is set.
    pub fn is_unresolved(&self) -> bool {
        matches!(self.stats, RowStats::Value { distinct } if distinct > 1) && !self.plan.do_action
    }

    /// Returns `true` when this value row writes into an atlas texture.
    pub fn bakes_into_atlas(&self) -> bool {
        !self.is_texture() && self.plan.do_action && self.plan.bake.target().is_some()
    }

    /// Copies user intent from `other`. Statistics are left untouched.
    pub fn copy_settings_from(&mut self, other: &PropertyRow) {
        self.plan = other.plan.clone();
    }
}
