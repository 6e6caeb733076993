//! Apply phase: rebinding surfaces to merged materials and remapped meshes.

use matpack_materials::GroupScan;
use matpack_mesh::{
    MergeMap, RemapCache, SubmeshUvTransform, build_merge_map, remap_mesh, remap_signature,
};
use matpack_scene::{AssetStore, MaterialId, Mesh, MeshId, NodeId, Scene, SubMesh};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::bake::{GroupBuild, TilePlacement};
use crate::error::BuildError;
use crate::layout::OutputLayout;
use crate::rollback::{RollbackEntry, RollbackLog};

/// Tile placement of every baked material, across all groups of a build.
pub type PlacementMap = FxHashMap<MaterialId, TilePlacement>;

/// Collects placements for the enabled groups of a fresh scan that were baked,
/// and the surfaces using them in scan order.
pub fn collect_placements(fresh: &[GroupScan], builds: &[GroupBuild]) -> (PlacementMap, Vec<NodeId>) {
    let mut placements = PlacementMap::default();
    let mut surfaces = Vec::new();
    let mut seen = FxHashSet::default();
    for group in fresh.iter().filter(|g| g.plan.enabled) {
        let Some(build) = builds.iter().find(|b| b.key == group.key) else {
            continue;
        };
        for entry in &group.materials {
            let Some(placement) = build.placement(&entry.material) else {
                continue;
            };
            placements.insert(entry.material.clone(), placement.clone());
            for user in &entry.users {
                if seen.insert(user.surface) {
                    surfaces.push(user.surface);
                }
            }
        }
    }
    (placements, surfaces)
}

/// How one surface changes.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceRemap {
    /// Material slots after the build.
    pub materials: Vec<Option<MaterialId>>,
    /// UV transforms of the submeshes bound to baked materials.
    pub transforms: Vec<SubmeshUvTransform>,
    /// Submesh merge, when any submeshes end up sharing a merged material.
    pub merge: Option<MergeMap>,
}

/// Plans the rebinding of a surface with `materials` over `submeshes`.
///
/// Submesh `i` renders slot `i`; submeshes past the last slot render the last
/// slot. Returns `None` when no submesh is bound to a baked material.
pub fn plan_surface(
    materials: &[Option<MaterialId>],
    submeshes: &[SubMesh],
    placements: &PlacementMap,
    merge_submeshes: bool,
) -> Option<SurfaceRemap> {
    let last = materials.len().checked_sub(1)?;
    let slot_of = |submesh: usize| submesh.min(last);
    let placed: Vec<Option<&TilePlacement>> = materials
        .iter()
        .map(|m| m.as_ref().and_then(|id| placements.get(id)))
        .collect();

    let transforms: Vec<SubmeshUvTransform> = (0..submeshes.len())
        .filter_map(|s| {
            placed[slot_of(s)].map(|p| SubmeshUvTransform {
                submesh: s,
                scale: p.uv.scale,
                offset: p.uv.offset,
            })
        })
        .collect();
    if transforms.is_empty() {
        return None;
    }

    let mut after: Vec<Option<MaterialId>> = materials
        .iter()
        .zip(&placed)
        .map(|(before, p)| match p {
            Some(p) => Some(p.material.clone()),
            None => before.clone(),
        })
        .collect();

    let mut merge = None;
    if merge_submeshes && submeshes.len() > 1 {
        let candidates: Vec<_> = submeshes
            .iter()
            .enumerate()
            .map(|(s, sub)| (placed[slot_of(s)].map(|p| p.material.clone()), sub.topology))
            .collect();
        let map = build_merge_map(&candidates);
        if !map.is_identity() {
            let mut merged_slots = vec![None; map.destination_count()];
            for (s, &d) in map.destinations().iter().enumerate().rev() {
                merged_slots[d] = after[slot_of(s)].clone();
            }
            after = merged_slots;
            merge = Some(map);
        }
    }

    Some(SurfaceRemap {
        materials: after,
        transforms,
        merge,
    })
}

/// Counts from one apply pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Surfaces rebound.
    pub surfaces_updated: usize,
    /// Surfaces that could not be rebound.
    pub surfaces_failed: usize,
}

/// Rebinds every surface in `surfaces` whose slots hold baked materials.
///
/// Failures are per surface: the surface keeps its bindings, the failure is
/// logged, and the pass continues.
#[allow(clippy::too_many_arguments)]
pub fn apply_to_surfaces<S: AssetStore>(
    scene: &mut Scene,
    store: &mut S,
    surfaces: &[NodeId],
    placements: &PlacementMap,
    layout: &OutputLayout,
    cache: &mut RemapCache,
    merge_submeshes: bool,
    log: &mut RollbackLog,
) -> ApplyOutcome {
    let mut outcome = ApplyOutcome::default();
    for &surface in surfaces {
        let Some(renderer) = scene.node(surface).and_then(|n| n.renderer.clone()) else {
            continue;
        };
        let Some(mesh_id) = renderer.mesh.clone() else {
            tracing::debug!("Surface {surface} has no mesh");
            continue;
        };
        let Some(mesh) = store.mesh(&mesh_id).cloned() else {
            tracing::warn!("Surface {surface}: mesh '{mesh_id}' is missing; left unchanged");
            outcome.surfaces_failed += 1;
            continue;
        };
        let Some(plan) =
            plan_surface(&renderer.materials, &mesh.submeshes, placements, merge_submeshes)
        else {
            continue;
        };

        let new_mesh = match remap_cached(store, cache, &mesh, &plan, layout, log) {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!("Surface {surface}: {err}");
                outcome.surfaces_failed += 1;
                continue;
            }
        };

        if let Some(r) = scene.node_mut(surface).and_then(|n| n.renderer.as_mut()) {
            r.materials = plan.materials.clone();
            r.mesh = Some(new_mesh.clone());
        }
        log.record_surface(RollbackEntry {
            surface_id: surface,
            before_materials: renderer.materials,
            after_materials: plan.materials,
            before_mesh: Some(mesh_id),
            after_mesh: Some(new_mesh),
        });
        outcome.surfaces_updated += 1;
    }
    outcome
}

fn remap_cached<S: AssetStore>(
    store: &mut S,
    cache: &mut RemapCache,
    mesh: &Mesh,
    plan: &SurfaceRemap,
    layout: &OutputLayout,
    log: &mut RollbackLog,
) -> Result<MeshId, BuildError> {
    let signature = remap_signature(&plan.transforms, plan.merge.as_ref());
    let (id, _) = cache.get_or_try_insert(&mesh.id, signature, || {
        let remapped =
            remap_mesh(mesh, &plan.transforms, plan.merge.as_ref()).map_err(|source| {
                BuildError::Remap {
                    mesh: mesh.id.clone(),
                    source,
                }
            })?;
        let path = store.unique_path(&layout.mesh_path(&mesh.name));
        let id = store.create_mesh(&path, remapped)?;
        log.record_asset(path);
        Ok::<_, BuildError>(id)
    })?;
    Ok(id)
}
