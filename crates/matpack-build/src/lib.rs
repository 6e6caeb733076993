//! Build orchestration for material atlasing.
//!
//! A build runs `validate → bake → apply → log`:
//!
//! 1. [`BuildSettings::validate`] rejects bad settings before anything is written.
//! 2. Each enabled, policy-eligible group is baked into atlas pages and merged
//!    materials. A failing group is reported and skipped.
//! 3. The root (or a clone of it) is re-scanned, the user's plans are carried
//!    onto the fresh groups, and every surface bound to a baked material gets
//!    the merged material and a remapped mesh.
//! 4. A [`RollbackLog`] records every created asset and every rebinding, so
//!    [`rollback`] can undo the build later.

mod apply;
mod bake;
mod builder;
mod error;
mod layout;
mod rollback;
mod settings;

#[cfg(test)]
mod scenarios;

pub use apply::{
    ApplyOutcome, PlacementMap, SurfaceRemap, apply_to_surfaces, collect_placements, plan_surface,
};
pub use bake::{GroupBuild, SampleSource, TilePlacement, bake_group};
pub use builder::{BuildReport, Builder, rollback};
pub use error::{BuildError, ValidationError};
pub use layout::{LOG_FILE, MESH_FOLDER, OutputLayout};
pub use rollback::{RollbackEntry, RollbackError, RollbackLog, RollbackReport};
pub use settings::{BuildSettings, CLONE_SUFFIX, MIN_ATLAS_SIZE};
