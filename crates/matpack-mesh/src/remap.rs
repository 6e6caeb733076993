//! Rebuilds a mesh with per-submesh UV transforms and an optional submesh merge.
//!
//! Vertices are deduplicated per submesh: every original vertex a submesh
//! references becomes one new vertex for that submesh. A vertex shared by two
//! submeshes is emitted once for each, so each copy can carry its own UV
//! transform. Only UV channel 0 is transformed.

use glam::Vec2;
use matpack_scene::{
    BlendShape, BlendShapeFrame, IndexFormat, MAX_U16_VERTICES, Mesh, SubMesh, UV_CHANNELS,
};
use thiserror::Error;

use crate::merge::MergeMap;

/// Errors returned by [`remap_mesh`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RemapError {
    /// A submesh references a vertex the mesh does not have.
    #[error("submesh {submesh} references vertex {index} but the mesh has {vertex_count}")]
    IndexOutOfRange {
        /// Offending submesh.
        submesh: usize,
        /// Offending index.
        index: u32,
        /// Source vertex count.
        vertex_count: usize,
    },

    /// A transform names a submesh the mesh does not have.
    #[error("transform for submesh {submesh} but the mesh has {count} submeshes")]
    NoSuchSubmesh {
        /// Requested submesh.
        submesh: usize,
        /// Source submesh count.
        count: usize,
    },

    /// The merge map does not cover every source submesh.
    #[error("merge map covers {got} submeshes, mesh has {expected}")]
    MergeMapLength {
        /// Source submesh count.
        expected: usize,
        /// Entries in the merge map.
        got: usize,
    },

    /// A merge map leaves a destination submesh without sources.
    #[error("merge map leaves destination submesh {destination} empty")]
    SparseMergeMap {
        /// First empty destination.
        destination: usize,
    },
}

/// Affine UV remap `uv' = uv * scale + offset` for one submesh.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SubmeshUvTransform {
    /// Source submesh index.
    pub submesh: usize,
    /// Scale.
    pub scale: Vec2,
    /// Offset.
    pub offset: Vec2,
}

impl SubmeshUvTransform {
    /// Maps a UV into the tile.
    pub fn apply(&self, uv: [f32; 2]) -> [f32; 2] {
        (Vec2::from(uv) * self.scale + self.offset).into()
    }

    /// Maps a tile UV back to the source UV.
    pub fn invert(&self, uv: [f32; 2]) -> [f32; 2] {
        ((Vec2::from(uv) - self.offset) / self.scale).into()
    }
}

/// Copies `attr` through `origin` if it is fully populated, else returns empty.
fn carry<T: Copy>(attr: &[T], vertex_count: usize, origin: &[u32]) -> Vec<T> {
    if attr.len() != vertex_count || vertex_count == 0 {
        return Vec::new();
    }
    origin.iter().map(|&i| attr[i as usize]).collect()
}

/// Builds a new mesh from `source`.
///
/// Submeshes with a transform get their UV0 remapped; others keep their UVs.
/// With a merge map, index lists of submeshes sharing a destination are
/// concatenated in source order and the destination takes the first source's
/// topology. The result switches to 32-bit indices above 65535 vertices.
pub fn remap_mesh(
    source: &Mesh,
    transforms: &[SubmeshUvTransform],
    merge: Option<&MergeMap>,
) -> Result<Mesh, RemapError> {
    let vertex_count = source.vertex_count();
    let submesh_count = source.submesh_count();

    let mut per_submesh: Vec<Option<&SubmeshUvTransform>> = vec![None; submesh_count];
    for t in transforms {
        let slot = per_submesh
            .get_mut(t.submesh)
            .ok_or(RemapError::NoSuchSubmesh {
                submesh: t.submesh,
                count: submesh_count,
            })?;
        *slot = Some(t);
    }

    let identity;
    let merge = match merge {
        Some(map) => {
            if map.source_count() != submesh_count {
                return Err(RemapError::MergeMapLength {
                    expected: submesh_count,
                    got: map.source_count(),
                });
            }
            map
        }
        None => {
            identity = MergeMap::identity(submesh_count);
            &identity
        }
    };

    // origin[k] is the source vertex of new vertex k; owner[k] its submesh.
    let mut origin: Vec<u32> = Vec::new();
    let mut owner: Vec<usize> = Vec::new();
    let mut destinations: Vec<Option<SubMesh>> = vec![None; merge.destination_count()];
    let mut memo: Vec<u32> = vec![u32::MAX; vertex_count];

    for (s, submesh) in source.submeshes.iter().enumerate() {
        memo.fill(u32::MAX);
        let mut indices = Vec::with_capacity(submesh.indices.len());
        for &index in &submesh.indices {
            let slot = memo
                .get_mut(index as usize)
                .ok_or(RemapError::IndexOutOfRange {
                    submesh: s,
                    index,
                    vertex_count,
                })?;
            if *slot == u32::MAX {
                *slot = origin.len() as u32;
                origin.push(index);
                owner.push(s);
            }
            indices.push(*slot);
        }

        let dest = merge.destination(s).unwrap_or(s);
        match &mut destinations[dest] {
            Some(existing) => existing.indices.extend(indices),
            empty => {
                *empty = Some(SubMesh {
                    indices,
                    topology: submesh.topology,
                })
            }
        }
    }

    let mut mesh = Mesh::new(source.id.clone(), source.name.clone());
    mesh.positions = carry(&source.positions, vertex_count, &origin);
    mesh.normals = carry(&source.normals, vertex_count, &origin);
    mesh.tangents = carry(&source.tangents, vertex_count, &origin);
    mesh.colors = carry(&source.colors, vertex_count, &origin);
    mesh.colors32 = carry(&source.colors32, vertex_count, &origin);
    for channel in 0..UV_CHANNELS {
        mesh.uvs[channel] = carry(&source.uvs[channel], vertex_count, &origin);
    }
    if !mesh.uvs[0].is_empty() {
        for (uv, &s) in mesh.uvs[0].iter_mut().zip(&owner) {
            if let Some(t) = per_submesh[s] {
                *uv = t.apply(*uv);
            }
        }
    }
    mesh.bone_weights = carry(&source.bone_weights, vertex_count, &origin);
    mesh.bind_poses = source.bind_poses.clone();
    mesh.submeshes = destinations
        .into_iter()
        .enumerate()
        .map(|(d, sub)| sub.ok_or(RemapError::SparseMergeMap { destination: d }))
        .collect::<Result<_, _>>()?;
    mesh.index_format = if origin.len() > MAX_U16_VERTICES {
        IndexFormat::U32
    } else {
        source.index_format
    };
    mesh.blend_shapes = source
        .blend_shapes
        .iter()
        .map(|shape| BlendShape {
            name: shape.name.clone(),
            frames: shape
                .frames
                .iter()
                .map(|frame| BlendShapeFrame {
                    weight: frame.weight,
                    delta_vertices: carry(&frame.delta_vertices, vertex_count, &origin),
                    delta_normals: carry(&frame.delta_normals, vertex_count, &origin),
                    delta_tangents: carry(&frame.delta_tangents, vertex_count, &origin),
                })
                .collect(),
        })
        .collect();

    tracing::debug!(
        "Remapped mesh '{}': {} -> {} vertices, {} -> {} submeshes",
        source.name,
        vertex_count,
        mesh.vertex_count(),
        submesh_count,
        mesh.submesh_count()
    );
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::build_merge_map;
    use matpack_scene::{MaterialId, MeshId, Topology};

    /// Two quads sharing an edge (vertices 1 and 2), one per submesh, plus an
    /// unreferenced vertex 6.
    fn two_quads() -> Mesh {
        let mut mesh = Mesh::new(MeshId::new("quads.mesh"), "quads");
        mesh.positions = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [2.0, 0.0, 0.0],
            [2.0, 1.0, 0.0],
            [9.0, 9.0, 9.0],
        ];
        mesh.normals = vec![[0.0, 0.0, 1.0]; 7];
        mesh.uvs[0] = vec![
            [0.0, 0.0],
            [1.0, 0.0],
            [1.0, 1.0],
            [0.0, 1.0],
            [0.0, 0.0],
            [0.0, 1.0],
            [0.5, 0.5],
        ];
        mesh.uvs[1] = vec![[0.25, 0.25]; 7];
        mesh.submeshes = vec![
            SubMesh::triangles(vec![0, 1, 2, 0, 2, 3]),
            SubMesh::triangles(vec![1, 4, 5, 1, 5, 2]),
        ];
        mesh
    }

    fn transform(submesh: usize) -> SubmeshUvTransform {
        SubmeshUvTransform {
            submesh,
            scale: Vec2::splat(0.25),
            offset: Vec2::new(0.5, 0.75),
        }
    }

    #[test]
    fn test_dedup_counts_referenced_vertices_per_submesh() {
        let source = two_quads();
        let out = remap_mesh(&source, &[], None).unwrap();
        // 4 + 4 referenced, vertex 6 dropped, 1 and 2 emitted once per submesh.
        assert_eq!(out.vertex_count(), 8);
        assert_eq!(out.submeshes[0].indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(out.submeshes[1].indices, vec![4, 5, 6, 4, 6, 7]);
        assert_eq!(out.positions[4], [1.0, 0.0, 0.0]);
        let expected: Vec<[f32; 2]> = [0, 1, 2, 3, 1, 4, 5, 2]
            .iter()
            .map(|&i| source.uvs[0][i])
            .collect();
        assert_eq!(out.uvs[0], expected);
        assert_eq!(out.normals.len(), 8);
    }

    #[test]
    fn test_single_submesh_output_never_grows() {
        let mut source = two_quads();
        source.submeshes.truncate(1);
        let out = remap_mesh(&source, &[], None).unwrap();
        assert_eq!(out.vertex_count(), 4);
        assert!(out.vertex_count() <= source.vertex_count());
    }

    #[test]
    fn test_only_transformed_submesh_uv0_changes() {
        let source = two_quads();
        let out = remap_mesh(&source, &[transform(1)], None).unwrap();
        // Submesh 0 vertices keep their UVs.
        assert_eq!(&out.uvs[0][..4], &source.uvs[0][..4]);
        // Submesh 1 vertex 1 -> (1, 0) * 0.25 + (0.5, 0.75).
        assert_eq!(out.uvs[0][4], [0.75, 0.75]);
        // UV1 is carried untouched.
        assert!(out.uvs[1].iter().all(|uv| *uv == [0.25, 0.25]));
    }

    #[test]
    fn test_uv_inverse_round_trip() {
        let t = SubmeshUvTransform {
            submesh: 0,
            scale: Vec2::new(0.2421875, 0.2421875),
            offset: Vec2::new(0.00390625, 0.50390625),
        };
        for uv in [[0.0, 0.0], [1.0, 1.0], [0.3, 0.7], [-0.5, 2.25]] {
            let back = t.invert(t.apply(uv));
            assert!((back[0] - uv[0]).abs() < 1e-5 && (back[1] - uv[1]).abs() < 1e-5);
        }
    }

    #[test]
    fn test_sparse_attributes_are_dropped() {
        let mut source = two_quads();
        source.tangents = vec![[1.0, 0.0, 0.0, 1.0]; 3];
        source.colors32 = vec![[255; 4]; 7];
        let out = remap_mesh(&source, &[], None).unwrap();
        assert!(out.tangents.is_empty());
        assert_eq!(out.colors32.len(), out.vertex_count());
        assert!(out.colors.is_empty());
        assert!(out.uvs[2].is_empty());
    }

    #[test]
    fn test_merge_concatenates_index_lists() {
        let source = two_quads();
        let map = build_merge_map(&[
            (Some(MaterialId::new("atlas.mat")), Topology::Triangles),
            (Some(MaterialId::new("atlas.mat")), Topology::Triangles),
        ]);
        let out = remap_mesh(&source, &[transform(0), transform(1)], Some(&map)).unwrap();
        assert_eq!(out.submesh_count(), 1);
        assert_eq!(
            out.submeshes[0].indices.len(),
            source.submeshes[0].indices.len() + source.submeshes[1].indices.len()
        );

        let none = build_merge_map(&[(None, Topology::Triangles), (None, Topology::Triangles)]);
        let out = remap_mesh(&source, &[], Some(&none)).unwrap();
        assert_eq!(out.submesh_count(), source.submesh_count());
    }

    #[test]
    fn test_merge_keeps_first_topology() {
        let mut source = two_quads();
        source.submeshes[1].topology = Topology::Quads;
        let map = MergeMap::from_destinations(vec![0, 0]).unwrap();
        let out = remap_mesh(&source, &[], Some(&map)).unwrap();
        assert_eq!(out.submeshes[0].topology, Topology::Triangles);
    }

    #[test]
    fn test_wide_indices_above_u16_limit() {
        let count = MAX_U16_VERTICES + 10;
        let mut source = Mesh::new(MeshId::new("big.mesh"), "big");
        source.positions = vec![[0.0; 3]; count];
        source.submeshes = vec![SubMesh {
            indices: (0..count as u32).collect(),
            topology: Topology::Points,
        }];
        source.index_format = IndexFormat::U16;
        let out = remap_mesh(&source, &[], None).unwrap();
        assert_eq!(out.index_format, IndexFormat::U32);

        source.submeshes[0].indices.truncate(100);
        let out = remap_mesh(&source, &[], None).unwrap();
        assert_eq!(out.index_format, IndexFormat::U16);
    }

    #[test]
    fn test_blend_shapes_follow_new_vertices() {
        let mut source = two_quads();
        source.blend_shapes = vec![BlendShape {
            name: "smile".to_string(),
            frames: vec![
                BlendShapeFrame {
                    weight: 50.0,
                    delta_vertices: (0..7).map(|i| [i as f32, 0.0, 0.0]).collect(),
                    delta_normals: Vec::new(),
                    delta_tangents: Vec::new(),
                },
                BlendShapeFrame {
                    weight: 100.0,
                    delta_vertices: (0..7).map(|i| [0.0, i as f32, 0.0]).collect(),
                    delta_normals: vec![[0.0; 3]; 7],
                    delta_tangents: Vec::new(),
                },
            ],
        }];
        let out = remap_mesh(&source, &[], None).unwrap();
        let shape = &out.blend_shapes[0];
        assert_eq!(shape.name, "smile");
        assert_eq!(shape.frames[0].weight, 50.0);
        assert_eq!(shape.frames[1].weight, 100.0);
        let xs: Vec<f32> = shape.frames[0].delta_vertices.iter().map(|d| d[0]).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0, 1.0, 4.0, 5.0, 2.0]);
        assert_eq!(shape.frames[1].delta_normals.len(), 8);
        assert!(shape.frames[0].delta_normals.is_empty());
    }

    #[test]
    fn test_invalid_inputs() {
        let mut source = two_quads();
        assert!(matches!(
            remap_mesh(&source, &[transform(5)], None),
            Err(RemapError::NoSuchSubmesh { submesh: 5, count: 2 })
        ));
        let map = MergeMap::identity(3);
        assert!(matches!(
            remap_mesh(&source, &[], Some(&map)),
            Err(RemapError::MergeMapLength { expected: 2, got: 3 })
        ));
        source.submeshes[0].indices.push(42);
        assert!(matches!(
            remap_mesh(&source, &[], None),
            Err(RemapError::IndexOutOfRange { index: 42, .. })
        ));
    }
}
