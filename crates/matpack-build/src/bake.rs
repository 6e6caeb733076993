//! Bake phase: one group's atlas pages and merged materials.

use matpack_materials::{
    AtlasGenerator, GroupKey, GroupScan, PageBuild, TileUv, apply_sample_overrides,
};
use matpack_scene::{AssetStore, Material, MaterialId, Shader};
use rustc_hash::FxHashMap;

use crate::error::BuildError;
use crate::layout::OutputLayout;
use crate::rollback::RollbackLog;

/// Where one source material landed.
#[derive(Clone, Debug, PartialEq)]
pub struct TilePlacement {
    /// Merged material of the page.
    pub material: MaterialId,
    /// Zero-based page.
    pub page: usize,
    /// Tile on the page.
    pub tile: usize,
    /// UV transform onto the tile's content box.
    pub uv: TileUv,
}

/// Every page baked for one group.
#[derive(Clone, Debug)]
pub struct GroupBuild {
    /// Group that was baked.
    pub key: GroupKey,
    /// Pages in order.
    pub pages: Vec<PageBuild>,
    /// Placement of each source material.
    pub tiles: FxHashMap<MaterialId, TilePlacement>,
}

impl GroupBuild {
    /// Placement of `material`, if it was baked.
    pub fn placement(&self, material: &MaterialId) -> Option<&TilePlacement> {
        self.tiles.get(material)
    }
}

/// Sample material and its shader, resolved once per build.
#[derive(Clone, Debug)]
pub struct SampleSource {
    /// Sample material.
    pub material: Material,
    /// Its shader.
    pub shader: Shader,
}

impl SampleSource {
    /// Resolves `id` in `store`. Missing material or shader yields `None`.
    pub fn resolve<S: AssetStore>(store: &S, id: &MaterialId) -> Option<Self> {
        let material = store.material(id)?.clone();
        let shader = store.shader(&material.shader)?.clone();
        Some(Self { material, shader })
    }
}

/// Bakes every page of `group`. Each created asset is recorded in `log` as soon
/// as it exists, so a failure on a later page still leaves earlier pages
/// auditable.
pub fn bake_group<S: AssetStore>(
    generator: &mut AtlasGenerator,
    store: &mut S,
    group: &GroupScan,
    layout: &OutputLayout,
    sample: Option<&SampleSource>,
    log: &mut RollbackLog,
) -> Result<GroupBuild, BuildError> {
    let mut build = GroupBuild {
        key: group.key.clone(),
        pages: Vec::with_capacity(group.page_count),
        tiles: FxHashMap::default(),
    };

    for page in 0..group.page_count {
        let target = layout.page_target(group, page);
        let built = generator.build_page(store, group, page, &target)?;
        for texture in &built.textures {
            log.record_asset(texture.texture.as_str());
        }
        log.record_asset(built.material.as_str());

        if let Some(sample) = sample {
            override_from_sample(store, group, &built.material, sample)?;
        }

        for (tile, source) in built.tiles.iter().enumerate() {
            let uv = built.layout.uv_transform(tile)?;
            build.tiles.insert(
                source.clone(),
                TilePlacement {
                    material: built.material.clone(),
                    page,
                    tile,
                    uv,
                },
            );
        }
        build.pages.push(built);
    }

    tracing::info!(
        "Baked '{}': {} page(s), {} tile(s)",
        group.plan.output_name,
        build.pages.len(),
        build.tiles.len()
    );
    Ok(build)
}

fn override_from_sample<S: AssetStore>(
    store: &mut S,
    group: &GroupScan,
    merged_id: &MaterialId,
    sample: &SampleSource,
) -> Result<(), BuildError> {
    let (Some(mut merged), Some(shader)) = (
        store.material(merged_id).cloned(),
        store.shader(&group.key.shader).cloned(),
    ) else {
        tracing::warn!("Merged material '{merged_id}' vanished before sample overrides");
        return Ok(());
    };
    let copied = apply_sample_overrides(
        group,
        &mut merged,
        &shader,
        &sample.material,
        &sample.shader,
    );
    if copied.is_empty() {
        return Ok(());
    }
    tracing::debug!(
        "Copied {} value(s) from sample '{}' onto '{merged_id}'",
        copied.len(),
        sample.material.id
    );
    store.update_material(merged)?;
    Ok(())
}
