//! Build orchestration: validate, bake enabled groups, apply to the scene, log.

use std::fmt;

use matpack_config::DiffPolicy;
use matpack_materials::{
    AtlasGenerator, GroupScan, PolicyDecision, carry_forward, decide, group_materials, page_count,
    unresolved_rows,
};
use matpack_mesh::RemapCache;
use matpack_scene::{AssetStore, NodeId, Scene};

use crate::apply::{apply_to_surfaces, collect_placements};
use crate::bake::{GroupBuild, SampleSource, bake_group};
use crate::error::{BuildError, ValidationError};
use crate::layout::OutputLayout;
use crate::rollback::{RollbackLog, RollbackReport};
use crate::settings::{BuildSettings, CLONE_SUFFIX};

/// Consolidated summary of one build.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Groups baked.
    pub processed: usize,
    /// Groups disabled, ineligible, or skipped by the diff policy.
    pub skipped: usize,
    /// Groups whose bake failed.
    pub failed: usize,
    /// Surfaces rebound to merged materials.
    pub surfaces_updated: usize,
    /// Surfaces that could not be rebound.
    pub surfaces_failed: usize,
    /// Remapped meshes created.
    pub meshes_created: usize,
    /// Assets created, meshes included.
    pub assets_created: usize,
    /// Root the build was applied to.
    pub applied_root: Option<NodeId>,
    /// Rollback log document.
    pub log_path: String,
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "groups: {} processed, {} skipped, {} failed",
            self.processed, self.skipped, self.failed
        )?;
        writeln!(
            f,
            "surfaces: {} updated, {} failed",
            self.surfaces_updated, self.surfaces_failed
        )?;
        writeln!(
            f,
            "assets: {} created ({} meshes)",
            self.assets_created, self.meshes_created
        )?;
        write!(f, "rollback log: {}", self.log_path)
    }
}

/// Runs builds with one settings snapshot.
#[derive(Clone, Debug)]
pub struct Builder {
    settings: BuildSettings,
}

impl Builder {
    /// Creates a builder.
    pub fn new(settings: BuildSettings) -> Self {
        Self { settings }
    }

    /// Settings of this builder.
    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// Scans the root (or whole scene) into groups with default plans.
    pub fn scan<S: AssetStore>(&self, scene: &Scene, store: &S) -> Vec<GroupScan> {
        group_materials(
            scene,
            self.settings.root,
            store,
            &self.settings.grouping,
            self.settings.tiles_per_page(),
        )
    }

    /// Builds `planned` groups into atlases and applies them to the scene.
    ///
    /// Settings are validated before anything is written. The rollback log is
    /// created next, then every group is baked independently: a failing group
    /// is counted and skipped. Surfaces are rebound from a fresh scan of the
    /// applied root carrying the plans of `planned`.
    pub fn run<S: AssetStore>(
        &self,
        scene: &mut Scene,
        store: &mut S,
        planned: &[GroupScan],
    ) -> Result<BuildReport, BuildError> {
        let settings = &self.settings;
        settings.validate(scene)?;

        let layout = OutputLayout::new(&settings.output_dir);
        let log_path = store.unique_path(&layout.log_path());
        let mut log = RollbackLog::new(settings.root);
        log.save(store, &log_path)?;
        tracing::info!("Build started; rollback log at '{log_path}'");

        let mut report = BuildReport {
            log_path: log_path.clone(),
            ..BuildReport::default()
        };
        let sample = self.resolve_sample(store);
        let mut generator = AtlasGenerator::new(settings.generator_settings());
        let mut builds: Vec<GroupBuild> = Vec::new();

        for planned_group in planned {
            let Some(group) = self.prepare(planned_group) else {
                report.skipped += 1;
                continue;
            };
            let group_sample = match decide(&group, settings.diff_policy) {
                PolicyDecision::Skip => {
                    let rows: Vec<&str> = unresolved_rows(&group).map(|r| r.name.as_str()).collect();
                    tracing::warn!(
                        "Skipping '{}': unresolved differences in {}",
                        group.plan.output_name,
                        rows.join(", ")
                    );
                    report.skipped += 1;
                    continue;
                }
                PolicyDecision::Build => None,
                PolicyDecision::BuildWithSample => {
                    if sample.is_none() {
                        tracing::warn!(
                            "No sample material for '{}'; keeping first material's values",
                            group.plan.output_name
                        );
                    }
                    sample.as_ref()
                }
            };

            match bake_group(&mut generator, store, &group, &layout, group_sample, &mut log) {
                Ok(build) => {
                    report.processed += 1;
                    builds.push(build);
                }
                Err(err) => {
                    tracing::warn!("Group '{}' failed: {err}", group.plan.output_name);
                    report.failed += 1;
                }
            }
            if let Err(err) = log.save(store, &log_path) {
                tracing::warn!("Could not update rollback log: {err}");
            }
        }

        if !builds.is_empty() {
            let applied_root = self.applied_root(scene)?;
            log.applied_root_id = applied_root;
            report.applied_root = applied_root;

            let fresh = group_materials(
                scene,
                applied_root,
                &*store,
                &settings.grouping,
                settings.tiles_per_page(),
            );
            let fresh = carry_forward(planned, fresh, &*store);
            let (placements, surfaces) = collect_placements(&fresh, &builds);

            let mut cache = RemapCache::new();
            let outcome = apply_to_surfaces(
                scene,
                store,
                &surfaces,
                &placements,
                &layout,
                &mut cache,
                settings.merge_submeshes,
                &mut log,
            );
            report.surfaces_updated = outcome.surfaces_updated;
            report.surfaces_failed = outcome.surfaces_failed;
            report.meshes_created = cache.len();
        }

        report.assets_created = log.created_assets.len();
        log.save(store, &log_path)?;
        tracing::info!(
            "Build finished: {} processed, {} skipped, {} failed, {} surface(s) updated",
            report.processed,
            report.skipped,
            report.failed,
            report.surfaces_updated
        );
        Ok(report)
    }

    /// Re-pages a planned group for the current grid, or `None` when it must
    /// not be built.
    fn prepare(&self, planned: &GroupScan) -> Option<GroupScan> {
        if !planned.plan.enabled {
            tracing::debug!("Group '{}' is disabled", planned.plan.output_name);
            return None;
        }
        if !planned.is_merge_eligible() {
            tracing::info!(
                "Group '{}' has a single material; nothing to atlas",
                planned.plan.output_name
            );
            return None;
        }
        let mut group = planned.clone();
        group.tiles_per_page = self.settings.tiles_per_page();
        group.page_count = page_count(group.material_count(), group.tiles_per_page);
        Some(group)
    }

    fn resolve_sample<S: AssetStore>(&self, store: &S) -> Option<SampleSource> {
        if self.settings.diff_policy != DiffPolicy::UseSampleMaterial {
            return None;
        }
        let id = self.settings.sample_material.as_ref()?;
        let sample = SampleSource::resolve(store, id);
        if sample.is_none() {
            tracing::warn!("Sample material '{id}' or its shader is missing");
        }
        sample
    }

    fn applied_root(&self, scene: &mut Scene) -> Result<Option<NodeId>, BuildError> {
        if !self.settings.clone_on_apply {
            return Ok(self.settings.root);
        }
        let root = self.settings.root.ok_or(ValidationError::MissingRoot)?;
        let clone = scene
            .clone_subtree(root, CLONE_SUFFIX)
            .ok_or(BuildError::CloneFailed(root))?;
        tracing::info!("Applying build to clone {clone} of {root}");
        Ok(Some(clone))
    }
}

/// Loads the rollback log at `log_path` and restores the bindings it recorded.
pub fn rollback<S: AssetStore>(
    scene: &mut Scene,
    store: &S,
    log_path: &str,
) -> Result<RollbackReport, BuildError> {
    let log = RollbackLog::load(store, log_path)?;
    Ok(log.replay(scene))
}
