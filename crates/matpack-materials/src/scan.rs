//! Property scanner: per-property distinctness statistics across a set of
//! materials sharing one shader.

use std::collections::HashSet;

use matpack_scene::{AssetStore, Material, PropertyKind, Shader, ShaderProperty, TextureId};

use crate::rows::{BakeMode, PropertyRow, RowPlan, RowStats, TextureStats};

/// Distinct values collected per scalar/color/vector property. Materials beyond
/// the cap are not inspected.
pub const VALUE_CAP: usize = 64;

/// Name fragments that mark a texture as linear data.
const LINEAR_KEYWORDS: [&str; 8] = [
    "mask",
    "metal",
    "rough",
    "smooth",
    "occlusion",
    "ao",
    "spec",
    "depth",
];

/// Returns `true` if a property name suggests a normal or bump map.
pub fn is_normal_like_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.contains("bump") || lower.contains("normal")
}

/// Returns `true` if a property name suggests non-color data.
pub fn is_linear_data_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    LINEAR_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Emits one row per declared shader property, in declaration order.
pub fn scan_properties<S: AssetStore>(
    shader: &Shader,
    materials: &[&Material],
    store: &S,
) -> Vec<PropertyRow> {
    shader
        .properties
        .iter()
        .map(|prop| match prop.kind {
            PropertyKind::Texture => scan_texture(shader, prop, materials, store),
            _ => scan_value(shader, prop, materials),
        })
        .collect()
}

fn scan_texture<S: AssetStore>(
    shader: &Shader,
    prop: &ShaderProperty,
    materials: &[&Material],
    store: &S,
) -> PropertyRow {
    let mut non_null = 0;
    let mut textures: HashSet<&TextureId> = HashSet::new();
    let mut st: HashSet<String> = HashSet::new();
    let mut imported_normal = false;
    let mut any_srgb = false;
    let mut any_linear = false;

    for material in materials {
        let Some(slot) = material.texture_slot(shader, &prop.name) else {
            continue;
        };
        st.insert(format!(
            "{:.5},{:.5},{:.5},{:.5}",
            slot.scale[0], slot.scale[1], slot.offset[0], slot.offset[1]
        ));
        let Some(id) = &slot.texture else {
            continue;
        };
        non_null += 1;
        textures.insert(id);
        match store.texture(id) {
            Some(texture) => {
                imported_normal |= texture.import.normal_map;
                if texture.import.is_linear() {
                    any_linear = true;
                } else {
                    any_srgb = true;
                }
            }
            None => tracing::warn!("Texture '{id}' bound to '{}' is missing", prop.name),
        }
    }

    let is_normal_like = imported_normal || is_normal_like_name(&prop.name);
    let is_srgb = if is_normal_like || is_linear_data_name(&prop.name) {
        false
    } else {
        any_srgb && !any_linear
    };
    let distinct = textures.len();

    PropertyRow {
        name: prop.name.clone(),
        kind: prop.kind,
        stats: RowStats::Texture(TextureStats {
            non_null,
            distinct,
            st_distinct: st.len(),
            is_normal_like,
            is_srgb,
        }),
        plan: RowPlan {
            do_action: distinct > 1,
            bake: BakeMode::Keep,
            ..RowPlan::default()
        },
    }
}

fn scan_value(shader: &Shader, prop: &ShaderProperty, materials: &[&Material]) -> PropertyRow {
    let mut seen: HashSet<String> = HashSet::new();
    for material in materials {
        if seen.len() >= VALUE_CAP {
            break;
        }
        if let Some(value) = material.value(shader, &prop.name) {
            seen.insert(value.distinct_key());
        }
    }

    PropertyRow {
        name: prop.name.clone(),
        kind: prop.kind,
        stats: RowStats::Value {
            distinct: seen.len(),
        },
        plan: RowPlan {
            do_action: false,
            bake: BakeMode::ResetToDefault,
            ..RowPlan::default()
        },
    }
}
