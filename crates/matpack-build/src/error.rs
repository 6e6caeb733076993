use matpack_materials::AtlasError;
use matpack_mesh::RemapError;
use matpack_scene::{AssetError, MeshId, NodeId};
use thiserror::Error;

use crate::rollback::RollbackError;

/// Settings rejected before a build touches any asset.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The atlas is smaller than [`crate::MIN_ATLAS_SIZE`].
    #[error("atlas size {size} is below the minimum of {min}")]
    AtlasTooSmall {
        /// Requested size.
        size: u32,
        /// Minimum accepted size.
        min: u32,
    },

    /// The grid must hold at least one tile.
    #[error("grid must be at least 1")]
    ZeroGrid,

    /// Padding leaves no room for tile content.
    #[error("cell of {cell} px leaves no content after {padding} px padding")]
    NoContent {
        /// Cell edge.
        cell: u32,
        /// Padding per side.
        padding: u32,
    },

    /// The output folder is empty.
    #[error("output folder is empty")]
    EmptyOutput,

    /// Cloning was requested without a root to clone.
    #[error("cloning on apply needs a root object")]
    MissingRoot,

    /// The root object is not in the scene.
    #[error("root object {0} does not exist")]
    RootNotFound(NodeId),

    /// The sample-material policy has no sample configured.
    #[error("the use-sample-material policy needs a sample material")]
    MissingSample,
}

/// Errors raised by a build or a rollback.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Settings were rejected; nothing was written.
    #[error("invalid build settings: {0}")]
    Validation(#[from] ValidationError),

    /// An asset could not be read or written.
    #[error(transparent)]
    Asset(#[from] AssetError),

    /// Atlas baking failed.
    #[error(transparent)]
    Atlas(#[from] AtlasError),

    /// A mesh could not be remapped.
    #[error("failed to remap mesh '{mesh}': {source}")]
    Remap {
        /// Source mesh.
        mesh: MeshId,
        /// Underlying error.
        #[source]
        source: RemapError,
    },

    /// The rollback log could not be written or read.
    #[error(transparent)]
    Log(#[from] RollbackError),

    /// Cloning the root produced nothing.
    #[error("failed to clone root object {0}")]
    CloneFailed(NodeId),
}
