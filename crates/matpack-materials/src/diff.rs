//! Unresolved-difference detection and the build-time policy applied to it.

use matpack_config::DiffPolicy;
use matpack_scene::{Material, Shader};

use crate::group::GroupScan;
use crate::rows::PropertyRow;

/// Outcome of checking a group against the unresolved-difference policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Build the group.
    Build,
    /// Build, then copy unresolved values from the sample material.
    BuildWithSample,
    /// Skip the group.
    Skip,
}

/// Rows whose materials disagree with no resolution chosen.
pub fn unresolved_rows(group: &GroupScan) -> impl Iterator<Item = &PropertyRow> {
    group.rows.iter().filter(|r| r.is_unresolved())
}

/// Returns `true` if any row of the group is unresolved.
pub fn has_unresolved(group: &GroupScan) -> bool {
    unresolved_rows(group).next().is_some()
}

/// Applies `policy` to `group`.
pub fn decide(group: &GroupScan, policy: DiffPolicy) -> PolicyDecision {
    if !has_unresolved(group) {
        return PolicyDecision::Build;
    }
    match policy {
        DiffPolicy::StopIfUnresolved => PolicyDecision::Skip,
        DiffPolicy::ProceedWithFirst => PolicyDecision::Build,
        DiffPolicy::UseSampleMaterial => PolicyDecision::BuildWithSample,
    }
}

/// Copies every unresolved row's value from `sample` onto `merged`, for
/// properties declared on both shaders. Returns the names that were copied.
pub fn apply_sample_overrides(
    group: &GroupScan,
    merged: &mut Material,
    merged_shader: &Shader,
    sample: &Material,
    sample_shader: &Shader,
) -> Vec<String> {
    let mut copied = Vec::new();
    for row in unresolved_rows(group) {
        if !merged_shader.has_property(&row.name) || !sample_shader.has_property(&row.name) {
            tracing::debug!(
                "Sample material '{}' does not share property '{}'",
                sample.id,
                row.name
            );
            continue;
        }
        let Some(value) = sample.value(sample_shader, &row.name) else {
            continue;
        };
        merged.set_value(row.name.clone(), value.clone());
        copied.push(row.name.clone());
    }
    copied
}
