//! Atlas generator: builds one page of a group into atlas textures plus a
//! merged material.

use image::{Rgba, RgbaImage};
use matpack_scene::{
    AssetStore, Compression, Material, MaterialId, PropertyKind, PropertyValue, Shader, TextureId,
    TextureImport, TextureSlot, WrapMode,
};

use crate::atlas::{AtlasCanvas, AtlasError, AtlasLayout};
use crate::color::{FLAT_NORMAL, WHITE, apply_modifier, color_to_pixel, multiply_pixel};
use crate::defaults::DefaultMaterialCache;
use crate::group::GroupScan;
use crate::rows::{BakeMode, PropertyRow};
use crate::sample::sample_tile;
use crate::scan::is_normal_like_name;
use crate::scratch::ScratchPool;

/// Longest file stem written for an atlas texture.
pub const MAX_STEM_LEN: usize = 90;

/// Replaces every character outside `[A-Za-z0-9_-]` with `_` and truncates to
/// [`MAX_STEM_LEN`] characters.
pub fn sanitize_file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STEM_LEN)
        .collect();
    if stem.is_empty() { "_".to_string() } else { stem }
}

// ---------------------------------------------------------------------------
// Settings / results
// ---------------------------------------------------------------------------

/// Page geometry limits shared by every page of a build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeneratorSettings {
    /// Cell edge in pixels.
    pub cell: u32,
    /// Padding on each side of a tile's content box.
    pub padding: u32,
    /// Largest page texture.
    pub max_atlas_size: u32,
    /// Largest grid dimension.
    pub max_grid: u32,
}

/// Where a page's assets are written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageTarget {
    /// Folder for the page's atlas textures.
    pub folder: String,
    /// Path of the merged material (uniquified on write).
    pub material_path: String,
}

/// One texture property packed into an atlas.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AtlasProperty {
    /// Texture property name.
    pub name: String,
    /// Atlas holds sRGB color.
    pub srgb: bool,
    /// Atlas holds tangent-space normals.
    pub normal_map: bool,
}

/// A written atlas texture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AtlasTexture {
    /// Texture property it is bound to on the merged material.
    pub property: String,
    /// Created texture asset.
    pub texture: TextureId,
}

/// Result of building one page.
#[derive(Clone, Debug, PartialEq)]
pub struct PageBuild {
    /// Page index within the group.
    pub page: usize,
    /// Geometry actually used.
    pub layout: AtlasLayout,
    /// Created merged material.
    pub material: MaterialId,
    /// Created atlas textures, in shader declaration order.
    pub textures: Vec<AtlasTexture>,
    /// Source material of each tile, in tile order.
    pub tiles: Vec<MaterialId>,
}

/// Texture properties that receive an atlas: texture rows marked for packing
/// plus every texture property targeted by an enabled bake rule. Ordered by
/// shader declaration.
pub fn atlas_properties(group: &GroupScan, shader: &Shader) -> Vec<AtlasProperty> {
    let targets: Vec<&str> = group
        .rows
        .iter()
        .filter(|r| r.bakes_into_atlas())
        .filter_map(|r| r.plan.bake.target())
        .collect();

    for target in &targets {
        if !shader
            .property(target)
            .is_some_and(|p| p.kind == PropertyKind::Texture)
        {
            tracing::warn!("Bake target '{target}' is not a texture property of '{}'", shader.name);
        }
    }

    shader
        .properties
        .iter()
        .filter(|p| p.kind == PropertyKind::Texture)
        .filter(|p| {
            targets.contains(&p.name.as_str())
                || group
                    .row(&p.name)
                    .is_some_and(|r| r.is_texture() && r.plan.do_action)
        })
        .map(|p| match group.row(&p.name).and_then(|r| r.texture_stats()) {
            Some(stats) => AtlasProperty {
                name: p.name.clone(),
                srgb: stats.is_srgb && !stats.is_normal_like,
                normal_map: stats.is_normal_like,
            },
            None => AtlasProperty {
                name: p.name.clone(),
                srgb: !is_normal_like_name(&p.name),
                normal_map: is_normal_like_name(&p.name),
            },
        })
        .collect()
}

/// Import settings for an atlas page texture.
pub fn atlas_import(property: &AtlasProperty, layout: &AtlasLayout) -> TextureImport {
    TextureImport {
        srgb: property.srgb && !property.normal_map,
        normal_map: property.normal_map,
        max_size: layout.atlas_size,
        wrap: WrapMode::Clamp,
        compression: Compression::HighQuality,
    }
}

/// Bake rules writing into one atlas property.
struct TileRules<'a> {
    solid: Option<&'a PropertyRow>,
    multiply: Option<&'a PropertyRow>,
}

impl<'a> TileRules<'a> {
    fn for_property(group: &'a GroupScan, property: &str) -> Self {
        let mut rules = Self {
            solid: None,
            multiply: None,
        };
        for row in group.rows.iter().filter(|r| r.bakes_into_atlas()) {
            if row.plan.bake.target() != Some(property) {
                continue;
            }
            match row.plan.bake {
                BakeMode::BakeColorToTexture { .. } | BakeMode::BakeScalarToGrayscale { .. } => {
                    if rules.solid.is_some() {
                        tracing::warn!(
                            "Several solid bakes target '{property}'; keeping the first"
                        );
                    } else {
                        rules.solid = Some(row);
                    }
                }
                BakeMode::MultiplyColorWithTexture { .. } => {
                    if rules.multiply.is_none() {
                        rules.multiply = Some(row);
                    }
                }
                BakeMode::Keep | BakeMode::ResetToDefault => {}
            }
        }
        rules
    }
}

/// The bake rule's color on `material`, alpha dropped on request and passed
/// through the modifier.
fn rule_color(row: &PropertyRow, material: &Material, shader: &Shader) -> Option<[f32; 4]> {
    let value = material.value(shader, &row.name)?;
    let mut color = match value {
        PropertyValue::Float(s) => [*s, *s, *s, 1.0],
        other => other.as_color()?,
    };
    if row.plan.drop_alpha {
        color[3] = 1.0;
    }
    Some(apply_modifier(color, row.plan.modifier.as_ref(), material, shader))
}

/// The bake rule's scalar on `material` as an opaque gray.
fn rule_scalar(row: &PropertyRow, material: &Material, shader: &Shader) -> Option<[f32; 4]> {
    let value = material.value(shader, &row.name)?;
    let s = match value {
        PropertyValue::Float(s) => *s,
        other => other.as_color()?[0],
    };
    let out = apply_modifier([s, s, s, 1.0], row.plan.modifier.as_ref(), material, shader);
    Some([out[0], out[0], out[0], 1.0])
}

// ---------------------------------------------------------------------------
// AtlasGenerator
// ---------------------------------------------------------------------------

/// Builds atlas pages. Owns the per-build default-material cache and scratch
/// targets.
#[derive(Debug)]
pub struct AtlasGenerator {
    settings: GeneratorSettings,
    defaults: DefaultMaterialCache,
    scratch: ScratchPool,
}

impl AtlasGenerator {
    /// Creates a generator for one build.
    pub fn new(settings: GeneratorSettings) -> Self {
        Self {
            settings,
            defaults: DefaultMaterialCache::new(),
            scratch: ScratchPool::new(),
        }
    }

    /// Page geometry limits.
    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    /// Default-material cache shared by every page of the build.
    pub fn defaults(&mut self) -> &mut DefaultMaterialCache {
        &mut self.defaults
    }

    /// Writes the atlases and merged material for `page` of `group`.
    ///
    /// The merged material is a copy of the page's first material with every
    /// atlas property bound to its page texture, and rows marked for reset set
    /// to the shader default.
    pub fn build_page<S: AssetStore>(
        &mut self,
        store: &mut S,
        group: &GroupScan,
        page: usize,
        target: &PageTarget,
    ) -> Result<PageBuild, AtlasError> {
        let entries = group.page_materials(page);
        if entries.is_empty() {
            return Err(AtlasError::EmptyPage(page));
        }
        let shader = store
            .shader(&group.key.shader)
            .cloned()
            .ok_or_else(|| AtlasError::MissingShader(group.key.shader.to_string()))?;
        let materials: Vec<Material> = entries
            .iter()
            .filter_map(|e| {
                let material = store.material(&e.material).cloned();
                if material.is_none() {
                    tracing::warn!("Material '{}' vanished before baking", e.material);
                }
                material
            })
            .collect();
        let Some(template) = materials.first() else {
            return Err(AtlasError::EmptyPage(page));
        };

        let layout = AtlasLayout::for_page(
            materials.len(),
            self.settings.cell,
            self.settings.padding,
            self.settings.max_atlas_size,
            self.settings.max_grid,
        )?;
        let properties = atlas_properties(group, &shader);
        tracing::info!(
            "Baking page {page} of '{}': {} tiles, {}x{} grid, {} px, {} atlas(es)",
            group.plan.output_name,
            materials.len(),
            layout.cols,
            layout.rows,
            layout.atlas_size,
            properties.len()
        );

        let mut images = Vec::with_capacity(properties.len());
        for property in &properties {
            let rules = TileRules::for_property(group, &property.name);
            let mut canvas = AtlasCanvas::new(layout);
            for (tile, material) in materials.iter().enumerate() {
                let content =
                    self.tile_content(&*store, &shader, material, property, &rules, layout.content);
                canvas.write_tile(tile, &content)?;
            }
            images.push(canvas.finish());
        }

        let mut textures = Vec::with_capacity(properties.len());
        for (property, image) in properties.iter().zip(images) {
            let path = store.unique_path(&format!(
                "{}/{}.png",
                target.folder,
                sanitize_file_stem(&property.name)
            ));
            let texture = store.create_texture(&path, image, atlas_import(property, &layout))?;
            tracing::debug!("Wrote atlas '{path}' for '{}'", property.name);
            textures.push(AtlasTexture {
                property: property.name.clone(),
                texture,
            });
        }

        let mut merged = template.clone();
        merged.name = material_name(&target.material_path);
        for atlas in &textures {
            merged.set_value(
                atlas.property.clone(),
                PropertyValue::Texture(TextureSlot::bound(atlas.texture.clone())),
            );
        }
        for row in &group.rows {
            if !resets_after_bake(row) || textures.iter().any(|t| t.property == row.name) {
                continue;
            }
            match self.defaults.default_value(&shader, &row.name) {
                Some(value) => merged.set_value(row.name.clone(), value),
                None => tracing::warn!("No default for '{}' on '{}'", row.name, shader.name),
            }
        }
        let material_path = store.unique_path(&target.material_path);
        let material = store.create_material(&material_path, merged)?;

        Ok(PageBuild {
            page,
            layout,
            material,
            textures,
            tiles: materials.into_iter().map(|m| m.id).collect(),
        })
    }

    fn tile_content<S: AssetStore>(
        &self,
        store: &S,
        shader: &Shader,
        material: &Material,
        property: &AtlasProperty,
        rules: &TileRules<'_>,
        size: u32,
    ) -> RgbaImage {
        if let Some(row) = rules.solid {
            let color = match row.plan.bake {
                BakeMode::BakeScalarToGrayscale { .. } => rule_scalar(row, material, shader),
                _ => rule_color(row, material, shader),
            };
            match color {
                Some(color) => return RgbaImage::from_pixel(size, size, color_to_pixel(color)),
                None => tracing::warn!(
                    "Material '{}' has no usable '{}'; sampling '{}' instead",
                    material.id,
                    row.name,
                    property.name
                ),
            }
        }

        let mut content = self.sample_content(store, shader, material, property, size);
        if let Some(row) = rules.multiply
            && let Some(color) = rule_color(row, material, shader)
        {
            let color = color_to_pixel(color);
            for pixel in content.pixels_mut() {
                *pixel = multiply_pixel(*pixel, color);
            }
        }
        content
    }

    fn sample_content<S: AssetStore>(
        &self,
        store: &S,
        shader: &Shader,
        material: &Material,
        property: &AtlasProperty,
        size: u32,
    ) -> RgbaImage {
        let fallback = |reason: &str| {
            tracing::debug!("Tile '{}' / '{}': {reason}", material.id, property.name);
            let fill: Rgba<u8> = if property.normal_map {
                FLAT_NORMAL
            } else {
                WHITE
            };
            RgbaImage::from_pixel(size, size, fill)
        };

        let Some(slot) = material.texture_slot(shader, &property.name) else {
            return fallback("no texture slot");
        };
        let Some(id) = &slot.texture else {
            return fallback("slot is empty");
        };
        let Some(texture) = store.texture(id) else {
            tracing::warn!("Texture '{id}' is missing; filling tile with a default");
            return fallback("texture missing");
        };
        sample_tile(
            &self.scratch,
            &texture.image,
            slot.scale,
            slot.offset,
            size,
            property.srgb,
        )
    }
}

/// Rows whose property is reset to the shader default on the merged material.
fn resets_after_bake(row: &PropertyRow) -> bool {
    if !row.plan.do_action {
        return false;
    }
    row.plan.reset_after_bake || (!row.is_texture() && row.plan.bake == BakeMode::ResetToDefault)
}

fn material_name(path: &str) -> String {
    let file = path.rsplit('/').next().unwrap_or(path);
    match file.rfind('.') {
        Some(i) if i > 0 => file[..i].to_string(),
        _ => file.to_string(),
    }
}
