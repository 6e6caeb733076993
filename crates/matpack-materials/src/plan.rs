//! Plan state carried between scans: row/group setting copies, and explicit
//! merging of sibling groups.
//!
//! Groups and rows are rebuilt from scratch on every scan. User intent survives
//! by being copied onto the fresh structures by structural key: property name
//! for rows, [`GroupKey`] for groups.

use matpack_scene::AssetStore;
use thiserror::Error;

use crate::group::{GroupKey, GroupScan, MaterialEntry};
use crate::rows::PropertyRow;

/// Errors returned when fusing groups.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MergeError {
    /// Merging needs at least two groups.
    #[error("merging needs at least two groups, got {0}")]
    TooFewGroups(usize),

    /// A single-material group was offered for merging.
    #[error("group '{0}' has a single material and cannot be merged")]
    NotEligible(String),

    /// A group's shader declares different properties from the merge root.
    #[error("shader '{child}' is not compatible with merge root shader '{root}'")]
    Incompatible {
        /// Root shader name.
        root: String,
        /// Offending shader name.
        child: String,
    },

    /// A group's shader could not be resolved.
    #[error("shader '{0}' is missing")]
    MissingShader(String),
}

/// Copies user intent from `from` onto rows of `to` with the same property name.
/// Returns the number of rows updated.
pub fn copy_row_settings(from: &[PropertyRow], to: &mut [PropertyRow]) -> usize {
    let mut copied = 0;
    for row in to.iter_mut() {
        if let Some(src) = from.iter().find(|r| r.name == row.name) {
            row.copy_settings_from(src);
            copied += 1;
        }
    }
    copied
}

/// Copies group plans and row settings from `from` onto groups of `to` with the
/// same key. Single-material groups stay disabled.
pub fn copy_group_plans(from: &[GroupScan], to: &mut [GroupScan]) {
    for group in to.iter_mut() {
        if let Some(src) = from.iter().find(|g| g.key == group.key) {
            group.plan = src.plan.clone();
            copy_row_settings(&src.rows, &mut group.rows);
        }
        if !group.is_merge_eligible() {
            group.plan.enabled = false;
        }
    }
}

/// Carries the plan of a previous scan onto a fresh scan, re-applying merges.
///
/// Member groups of merged groups restore their own plans (including the merge
/// key) first; the fresh groups are then re-merged and the merged groups restore
/// the plan the user edited on the merged result.
pub fn carry_forward<S: AssetStore>(
    previous: &[GroupScan],
    fresh: Vec<GroupScan>,
    store: &S,
) -> Vec<GroupScan> {
    let members: Vec<GroupScan> = previous
        .iter()
        .flat_map(|g| {
            if g.is_merged() {
                g.children.clone()
            } else {
                vec![g.clone()]
            }
        })
        .collect();

    let mut fresh = fresh;
    copy_group_plans(&members, &mut fresh);
    let mut merged = apply_merge_keys(fresh, store);

    let merged_previous: Vec<GroupScan> =
        previous.iter().filter(|g| g.is_merged()).cloned().collect();
    for group in merged.iter_mut().filter(|g| g.is_merged()) {
        if let Some(src) = merged_previous.iter().find(|g| g.key == group.key) {
            group.plan = src.plan.clone();
            copy_row_settings(&src.rows, &mut group.rows);
        }
    }
    merged
}

/// Fuses `groups` into one synthetic group rooted at the first group.
///
/// Materials are unioned by identity (usage lists unioned), rows are recomputed
/// from the merged material set, then the first group's row settings are copied
/// onto the result.
pub fn merge_groups<S: AssetStore>(
    groups: Vec<GroupScan>,
    store: &S,
) -> Result<GroupScan, MergeError> {
    if groups.len() < 2 {
        return Err(MergeError::TooFewGroups(groups.len()));
    }
    let root = &groups[0];
    let root_shader = store
        .shader(&root.key.shader)
        .ok_or_else(|| MergeError::MissingShader(root.key.shader.to_string()))?;

    for group in &groups {
        if !group.is_merge_eligible() {
            return Err(MergeError::NotEligible(group.folder_stem()));
        }
        let shader = store
            .shader(&group.key.shader)
            .ok_or_else(|| MergeError::MissingShader(group.key.shader.to_string()))?;
        if !root_shader.is_compatible_with(shader) {
            return Err(MergeError::Incompatible {
                root: root_shader.name.clone(),
                child: shader.name.clone(),
            });
        }
    }

    let mut materials: Vec<MaterialEntry> = Vec::new();
    for group in &groups {
        for entry in &group.materials {
            match materials.iter_mut().find(|e| e.material == entry.material) {
                Some(existing) => {
                    for user in &entry.users {
                        if !existing.users.contains(user) {
                            existing.users.push(*user);
                        }
                    }
                }
                None => materials.push(entry.clone()),
            }
        }
    }

    let mut merged = GroupScan {
        key: root.key.clone(),
        shader_name: root.shader_name.clone(),
        transparent: root.transparent,
        materials,
        tiles_per_page: root.tiles_per_page,
        page_count: 0,
        rows: Vec::new(),
        plan: root.plan.clone(),
        children: Vec::new(),
    };
    merged.rescan(store);
    copy_row_settings(&root.rows, &mut merged.rows);
    merged.plan.enabled = true;
    merged.children = groups;

    tracing::info!(
        "Merged {} groups into '{}' ({} materials)",
        merged.children.len(),
        merged.plan.output_name,
        merged.material_count()
    );
    Ok(merged)
}

/// Restores the original independent groups of a merged group. A group that was
/// never merged is returned as-is.
pub fn unmerge(group: GroupScan) -> Vec<GroupScan> {
    if group.is_merged() {
        group.children
    } else {
        vec![group]
    }
}

/// Fuses every set of merge-eligible groups sharing a merge key. The merged
/// group takes the position of its first member. Sets that cannot be merged are
/// left as independent groups.
pub fn apply_merge_keys<S: AssetStore>(groups: Vec<GroupScan>, store: &S) -> Vec<GroupScan> {
    let mut order: Vec<Vec<GroupScan>> = Vec::new();
    let mut slots: Vec<(String, usize)> = Vec::new();

    for group in groups {
        let key = match &group.plan.merge_key {
            Some(k) if group.is_merge_eligible() && !group.is_merged() => k.clone(),
            _ => {
                order.push(vec![group]);
                continue;
            }
        };
        match slots.iter().find(|(k, _)| *k == key) {
            Some((_, index)) => order[*index].push(group),
            None => {
                slots.push((key, order.len()));
                order.push(vec![group]);
            }
        }
    }

    let mut out = Vec::with_capacity(order.len());
    for members in order {
        if members.len() < 2 {
            out.extend(members);
            continue;
        }
        let keys: Vec<GroupKey> = members.iter().map(|g| g.key.clone()).collect();
        match merge_groups(members.clone(), store) {
            Ok(merged) => out.push(merged),
            Err(err) => {
                tracing::warn!("Cannot merge {} groups ({keys:?}): {err}", keys.len());
                out.extend(members);
            }
        }
    }
    out
}
