//! Submesh merge maps.

use matpack_scene::{MaterialId, Topology};
use rustc_hash::FxHashMap;

use crate::remap::RemapError;

/// Assigns every source submesh a destination submesh. Destinations are dense:
/// `0..destination_count()` each receive at least one source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeMap {
    destinations: Vec<usize>,
    count: usize,
}

impl MergeMap {
    /// Keeps every submesh as its own destination.
    pub fn identity(submeshes: usize) -> Self {
        Self {
            destinations: (0..submeshes).collect(),
            count: submeshes,
        }
    }

    /// Validates an explicit source-to-destination assignment.
    pub fn from_destinations(destinations: Vec<usize>) -> Result<Self, RemapError> {
        let count = destinations.iter().max().map_or(0, |m| m + 1);
        let mut used = vec![false; count];
        for &d in &destinations {
            used[d] = true;
        }
        if let Some(gap) = used.iter().position(|u| !u) {
            return Err(RemapError::SparseMergeMap { destination: gap });
        }
        Ok(Self {
            destinations,
            count,
        })
    }

    /// Destination of source submesh `submesh`.
    pub fn destination(&self, submesh: usize) -> Option<usize> {
        self.destinations.get(submesh).copied()
    }

    /// Destination per source submesh.
    pub fn destinations(&self) -> &[usize] {
        &self.destinations
    }

    /// Number of source submeshes covered.
    pub fn source_count(&self) -> usize {
        self.destinations.len()
    }

    /// Number of destination submeshes.
    pub fn destination_count(&self) -> usize {
        self.count
    }

    /// Returns `true` if no submeshes are merged.
    pub fn is_identity(&self) -> bool {
        self.destinations.iter().enumerate().all(|(i, &d)| i == d)
    }
}

/// Builds a merge map from each submesh's merge candidate material and topology.
///
/// Submeshes with the same `(material, topology)` share the destination of the
/// first such submesh. A submesh without a candidate (`None`) always keeps its
/// own destination. Destinations are numbered in first-appearance order.
pub fn build_merge_map(candidates: &[(Option<MaterialId>, Topology)]) -> MergeMap {
    let mut seen: FxHashMap<(&MaterialId, Topology), usize> = FxHashMap::default();
    let mut destinations = Vec::with_capacity(candidates.len());
    let mut next = 0;
    for (material, topology) in candidates {
        let dest = match material {
            Some(material) => *seen.entry((material, *topology)).or_insert_with(|| {
                next += 1;
                next - 1
            }),
            None => {
                next += 1;
                next - 1
            }
        };
        destinations.push(dest);
    }
    MergeMap {
        destinations,
        count: next,
    }
}
