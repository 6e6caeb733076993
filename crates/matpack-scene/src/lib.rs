//! Host scene model: shaders, materials, textures, meshes, scene nodes, and the
//! asset store interface the atlas engine reads from and writes into.
//!
//! The rendering host (editor, engine runtime, or a project on disk) is an
//! external collaborator. Everything the engine needs from it is expressed by the
//! plain data types in this crate plus the [`AssetStore`] trait.

mod ids;
mod material;
mod mesh;
mod project;
mod scene;
mod shader;
mod store;
mod texture;

pub use ids::{MaterialId, MeshId, NodeId, ShaderId, TextureId};
pub use material::{DEFAULT_QUEUE, Material, PropertyValue, TRANSPARENT_QUEUE, TextureSlot};
pub use mesh::{
    BlendShape, BlendShapeFrame, BoneWeight, IndexFormat, MAX_U16_VERTICES, Mesh, SubMesh, Topology,
    UV_CHANNELS,
};
pub use project::{Project, TextureRecord};
pub use scene::{Node, Renderer, Scene};
pub use shader::{PropertyKind, Shader, ShaderProperty};
pub use store::{AssetError, AssetLibrary, AssetStore};
pub use texture::{Compression, Texture, TextureImport, WrapMode};
