//! Typed identifiers for assets and scene nodes.
//!
//! Asset identifiers are project-relative paths (`Materials/Brick.mat`), which
//! keeps them stable across sessions and human-readable in logs. Shader ids are
//! GUID-like strings so a shader can be found again after it is renamed.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! asset_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Creates an identifier from any string-like value.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

asset_id!(
    /// Identity of a shader asset (GUID-like, survives renames).
    ShaderId
);
asset_id!(
    /// Identity of a texture asset (its project-relative path).
    TextureId
);
asset_id!(
    /// Identity of a material asset (its project-relative path).
    MaterialId
);
asset_id!(
    /// Identity of a mesh asset (its project-relative path).
    MeshId
);

/// Identity of a node in the [`crate::Scene`] hierarchy.
///
/// A node carrying a renderer is a *surface*; its `NodeId` is the surface
/// identity recorded in rollback logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
