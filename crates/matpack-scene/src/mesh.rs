//! Indexed meshes with submeshes, optional vertex attributes, and blend shapes.
//!
//! Optional attribute arrays are either empty or exactly `vertex_count()` long.
//! A partially populated array is treated as absent by consumers.

use serde::{Deserialize, Serialize};

use crate::ids::MeshId;

/// Largest vertex count addressable with 16-bit indices.
pub const MAX_U16_VERTICES: usize = u16::MAX as usize;

/// Number of UV channels a mesh can carry.
pub const UV_CHANNELS: usize = 4;

/// Primitive topology of a submesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topology {
    /// Triangle list.
    Triangles,
    /// Quad list.
    Quads,
    /// Line list.
    Lines,
    /// Line strip.
    LineStrip,
    /// Point list.
    Points,
}

/// Index buffer element width.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexFormat {
    /// 16-bit indices.
    U16,
    /// 32-bit indices.
    U32,
}

/// One draw range of a mesh, bound to one material slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubMesh {
    /// Indices into the mesh vertex arrays.
    pub indices: Vec<u32>,
    /// Primitive topology.
    pub topology: Topology,
}

impl SubMesh {
    /// Creates a triangle-list submesh.
    pub fn triangles(indices: Vec<u32>) -> Self {
        Self {
            indices,
            topology: Topology::Triangles,
        }
    }
}

/// Up to four bone influences for one vertex.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoneWeight {
    /// Bone indices.
    pub bones: [u32; 4],
    /// Matching weights.
    pub weights: [f32; 4],
}

/// One keyframe of a blend shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlendShapeFrame {
    /// Frame weight (typically 0..100).
    pub weight: f32,
    /// Per-vertex position deltas.
    pub delta_vertices: Vec<[f32; 3]>,
    /// Per-vertex normal deltas.
    pub delta_normals: Vec<[f32; 3]>,
    /// Per-vertex tangent deltas.
    pub delta_tangents: Vec<[f32; 3]>,
}

/// A named blend shape (morph target).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlendShape {
    /// Shape name.
    pub name: String,
    /// Frames in ascending weight order.
    pub frames: Vec<BlendShapeFrame>,
}

/// A mesh asset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    /// Asset identity.
    pub id: MeshId,
    /// Display name.
    pub name: String,
    /// Vertex positions. Defines the vertex count.
    pub positions: Vec<[f32; 3]>,
    /// Vertex normals.
    #[serde(default)]
    pub normals: Vec<[f32; 3]>,
    /// Vertex tangents (w = handedness).
    #[serde(default)]
    pub tangents: Vec<[f32; 4]>,
    /// Floating-point vertex colors.
    #[serde(default)]
    pub colors: Vec<[f32; 4]>,
    /// 8-bit vertex colors.
    #[serde(default)]
    pub colors32: Vec<[u8; 4]>,
    /// UV channels 0..4.
    #[serde(default)]
    pub uvs: [Vec<[f32; 2]>; UV_CHANNELS],
    /// Skinning weights.
    #[serde(default)]
    pub bone_weights: Vec<BoneWeight>,
    /// Bind pose matrices (column-major). Not per-vertex.
    #[serde(default)]
    pub bind_poses: Vec<[[f32; 4]; 4]>,
    /// Submeshes in material-slot order.
    pub submeshes: Vec<SubMesh>,
    /// Index buffer format.
    pub index_format: IndexFormat,
    /// Blend shapes in source order.
    #[serde(default)]
    pub blend_shapes: Vec<BlendShape>,
}

impl Mesh {
    /// Creates an empty 16-bit mesh.
    pub fn new(id: MeshId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            positions: Vec::new(),
            normals: Vec::new(),
            tangents: Vec::new(),
            colors: Vec::new(),
            colors32: Vec::new(),
            uvs: Default::default(),
            bone_weights: Vec::new(),
            bind_poses: Vec::new(),
            submeshes: Vec::new(),
            index_format: IndexFormat::U16,
            blend_shapes: Vec::new(),
        }
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of submeshes.
    pub fn submesh_count(&self) -> usize {
        self.submeshes.len()
    }

    /// Returns `true` if a per-vertex attribute array of length `len` is fully
    /// populated for this mesh.
    pub fn is_full(&self, len: usize) -> bool {
        len > 0 && len == self.vertex_count()
    }

    /// Total index count across all submeshes.
    pub fn index_count(&self) -> usize {
        self.submeshes.iter().map(|s| s.indices.len()).sum()
    }
}
