//! Material grouping, diffing, and atlas generation: property scanning, group
//! plans with merge/unmerge and profile persistence, and atlas page baking with
//! bleed padding and color-space-aware resampling.

mod atlas;
mod color;
mod defaults;
mod diff;
mod generator;
mod group;
mod plan;
mod profile;
mod rows;
mod sample;
mod scan;
mod scratch;

pub use atlas::{
    AtlasCanvas, AtlasError, AtlasLayout, TileRect, TileUv, calculate_optimal_grid, extend_edges,
};
pub use color::{
    FLAT_NORMAL, WHITE, apply_modifier, linear_to_srgb, modifier_value, multiply_fixed,
    srgb_to_linear,
};
pub use defaults::DefaultMaterialCache;
pub use diff::{PolicyDecision, apply_sample_overrides, decide, has_unresolved, unresolved_rows};
pub use generator::{
    AtlasGenerator, AtlasProperty, AtlasTexture, GeneratorSettings, MAX_STEM_LEN, PageBuild,
    PageTarget, atlas_properties, sanitize_file_stem,
};
pub use group::{
    GroupKey, GroupPlan, GroupScan, MaterialEntry, SurfaceSlot, group_materials, keywords_hash,
    page_count,
};
pub use plan::{
    MergeError, apply_merge_keys, carry_forward, copy_group_plans, copy_row_settings,
    merge_groups, unmerge,
};
pub use profile::{GroupProfile, PlanProfile, ProfileError, ProfileKey, RowProfile};
pub use rows::{BakeMode, Modifier, ModifierOp, PropertyRow, RowPlan, RowStats, TextureStats};
pub use sample::sample_tile;
pub use scan::{VALUE_CAP, is_linear_data_name, is_normal_like_name, scan_properties};
pub use scratch::{ScratchPool, ScratchTarget};
