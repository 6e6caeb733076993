//! Mesh remapping: rebuilds a mesh so each submesh samples its atlas tile,
//! optionally merging submeshes that share a material, and caches results per
//! unique configuration.

mod cache;
mod merge;
mod remap;

pub use cache::{RemapCache, remap_signature};
pub use merge::{MergeMap, build_merge_map};
pub use remap::{RemapError, SubmeshUvTransform, remap_mesh};
