//! Rollback log: the before/after bindings of every surface a build touched and
//! every asset it created, stored as a RON document next to the build output.
//!
//! A log is self-contained. Replaying it against a scene needs no state from
//! the build session that wrote it.

use matpack_scene::{AssetError, AssetStore, MaterialId, MeshId, NodeId, Scene};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while saving or loading a rollback log.
#[derive(Debug, Error)]
pub enum RollbackError {
    /// RON serialization failed.
    #[error("failed to serialize rollback log: {0}")]
    Serialize(#[from] ron::Error),

    /// RON parsing failed.
    #[error("failed to parse rollback log: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Reading or writing the log document failed.
    #[error(transparent)]
    Asset(#[from] AssetError),
}

/// Bindings of one surface before and after a build.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackEntry {
    /// Surface identity.
    pub surface_id: NodeId,
    /// Material slots before the build.
    pub before_materials: Vec<Option<MaterialId>>,
    /// Material slots after the build.
    pub after_materials: Vec<Option<MaterialId>>,
    /// Mesh before the build.
    pub before_mesh: Option<MeshId>,
    /// Mesh after the build.
    pub after_mesh: Option<MeshId>,
}

/// Durable record of one build run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RollbackLog {
    /// Root the build scanned.
    pub source_root_id: Option<NodeId>,
    /// Root the build was applied to (the clone, when cloning).
    pub applied_root_id: Option<NodeId>,
    /// Touched surfaces in apply order.
    pub entries: Vec<RollbackEntry>,
    /// Every asset path the build created, in creation order.
    pub created_assets: Vec<String>,
}

/// Outcome of replaying a log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RollbackReport {
    /// Surfaces restored.
    pub restored: usize,
    /// Entries whose surface no longer exists or has no renderer.
    pub skipped: usize,
}

impl RollbackLog {
    /// Starts a log for a build of `source_root`.
    pub fn new(source_root: Option<NodeId>) -> Self {
        Self {
            source_root_id: source_root,
            ..Self::default()
        }
    }

    /// Records an asset the build created.
    pub fn record_asset(&mut self, path: impl Into<String>) {
        self.created_assets.push(path.into());
    }

    /// Records a surface rebinding.
    pub fn record_surface(&mut self, entry: RollbackEntry) {
        self.entries.push(entry);
    }

    /// Restores every logged surface's pre-build materials and mesh.
    ///
    /// Entries are replayed newest first so a surface logged twice ends in its
    /// earliest state. Missing surfaces are skipped.
    pub fn replay(&self, scene: &mut Scene) -> RollbackReport {
        let mut report = RollbackReport::default();
        for entry in self.entries.iter().rev() {
            let Some(renderer) = scene
                .node_mut(entry.surface_id)
                .and_then(|n| n.renderer.as_mut())
            else {
                tracing::warn!("Rollback: surface {} no longer exists", entry.surface_id);
                report.skipped += 1;
                continue;
            };
            renderer.materials = entry.before_materials.clone();
            renderer.mesh = entry.before_mesh.clone();
            report.restored += 1;
        }
        tracing::info!(
            "Rollback restored {} surface(s), skipped {}",
            report.restored,
            report.skipped
        );
        report
    }

    /// Serializes to pretty RON.
    pub fn to_ron(&self) -> Result<String, RollbackError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::new(),
        )?)
    }

    /// Parses RON.
    pub fn from_ron(text: &str) -> Result<Self, RollbackError> {
        Ok(ron::from_str(text)?)
    }

    /// Writes the log as a document in `store`, replacing any previous save.
    pub fn save<S: AssetStore>(&self, store: &mut S, path: &str) -> Result<(), RollbackError> {
        store.write_document(path, &self.to_ron()?)?;
        tracing::debug!(
            "Saved rollback log '{path}' ({} entries, {} assets)",
            self.entries.len(),
            self.created_assets.len()
        );
        Ok(())
    }

    /// Loads a log document from `store`.
    pub fn load<S: AssetStore>(store: &S, path: &str) -> Result<Self, RollbackError> {
        Self::from_ron(&store.read_document(path)?)
    }
}
