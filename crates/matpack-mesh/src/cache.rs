//! Per-build cache of remapped meshes, so each unique (mesh, transforms, merge
//! map) configuration produces at most one mesh asset.

use std::fmt::Write as _;

use matpack_scene::MeshId;
use rustc_hash::FxHashMap;

use crate::merge::MergeMap;
use crate::remap::SubmeshUvTransform;

/// Serializes transforms (sorted by submesh) and the merge map into a cache
/// key. Floats are written in shortest round-trip form, so equal inputs give
/// equal signatures.
pub fn remap_signature(transforms: &[SubmeshUvTransform], merge: Option<&MergeMap>) -> String {
    let mut sorted: Vec<&SubmeshUvTransform> = transforms.iter().collect();
    sorted.sort_by_key(|t| t.submesh);

    let mut out = String::new();
    for t in sorted {
        let _ = write!(
            out,
            "{}:{:?},{:?}+{:?},{:?};",
            t.submesh, t.scale.x, t.scale.y, t.offset.x, t.offset.y
        );
    }
    if let Some(map) = merge.filter(|m| !m.is_identity()) {
        out.push_str("|m");
        for d in map.destinations() {
            let _ = write!(out, ",{d}");
        }
    }
    out
}

/// Remapped meshes created in one build, keyed by source mesh and signature.
#[derive(Debug, Default)]
pub struct RemapCache {
    entries: FxHashMap<(MeshId, String), MeshId>,
}

impl RemapCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a previously created mesh.
    pub fn get(&self, source: &MeshId, signature: &str) -> Option<&MeshId> {
        self.entries.get(&(source.clone(), signature.to_string()))
    }

    /// Returns the cached mesh or creates it with `create`. The flag is `true`
    /// when `create` ran.
    pub fn get_or_try_insert<E>(
        &mut self,
        source: &MeshId,
        signature: String,
        create: impl FnOnce() -> Result<MeshId, E>,
    ) -> Result<(MeshId, bool), E> {
        let key = (source.clone(), signature);
        if let Some(hit) = self.entries.get(&key) {
            tracing::debug!("Reusing remapped mesh '{hit}' for '{source}'");
            return Ok((hit.clone(), false));
        }
        let created = create()?;
        self.entries.insert(key, created.clone());
        Ok((created, true))
    }

    /// Number of cached meshes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn t(submesh: usize, x: f32) -> SubmeshUvTransform {
        SubmeshUvTransform {
            submesh,
            scale: Vec2::splat(0.5),
            offset: Vec2::new(x, 0.0),
        }
    }

    #[test]
    fn test_signature_is_order_independent_and_exact() {
        let a = remap_signature(&[t(0, 0.1), t(1, 0.5)], None);
        let b = remap_signature(&[t(1, 0.5), t(0, 0.1)], None);
        assert_eq!(a, b);
        assert_ne!(a, remap_signature(&[t(0, 0.1), t(1, 0.500001)], None));
    }

    #[test]
    fn test_signature_includes_non_identity_merge() {
        let base = remap_signature(&[t(0, 0.0)], None);
        let identity = MergeMap::identity(2);
        assert_eq!(remap_signature(&[t(0, 0.0)], Some(&identity)), base);
        let merged = MergeMap::from_destinations(vec![0, 0]).unwrap();
        let sig = remap_signature(&[t(0, 0.0)], Some(&merged));
        assert!(sig.ends_with("|m,0,0"));
    }

    #[test]
    fn test_cache_creates_once_per_key() {
        let mut cache = RemapCache::new();
        let source = MeshId::new("a.mesh");
        let mut calls = 0;
        let mut created = Vec::new();
        for _ in 0..3 {
            let (id, fresh) = cache
                .get_or_try_insert::<()>(&source, "sig".to_string(), || {
                    calls += 1;
                    Ok(MeshId::new("out.mesh"))
                })
                .unwrap();
            assert_eq!(id, MeshId::new("out.mesh"));
            created.push(fresh);
        }
        assert_eq!(created, vec![true, false, false]);
        assert_eq!(calls, 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&source, "sig").is_some());
        assert!(cache.get(&source, "other").is_none());

        let failed = cache.get_or_try_insert(&source, "bad".to_string(), || Err("boom"));
        assert_eq!(failed, Err("boom"));
        assert_eq!(cache.len(), 1);
    }
}
