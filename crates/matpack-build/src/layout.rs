//! Output folder layout.
//!
//! ```text
//! <output>/
//!   <shader>_RQ<rq>_KW<hash>_T<t>/
//!     <property>.png ...         single-page group
//!     <name>.mat
//!     Page_01/ Page_02/ ...      multi-page group: one folder per page
//!       <property>.png ...
//!       <name>_P01.mat
//!   _Meshes/
//!     <mesh>.mesh
//!   BuildLog.ron
//! ```

use matpack_materials::{GroupScan, PageTarget, sanitize_file_stem};

/// Shared folder for remapped meshes.
pub const MESH_FOLDER: &str = "_Meshes";

/// File name of the rollback log.
pub const LOG_FILE: &str = "BuildLog.ron";

/// Maps groups and pages to asset paths under one output folder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputLayout {
    root: String,
}

impl OutputLayout {
    /// Creates a layout rooted at `output_dir`.
    pub fn new(output_dir: &str) -> Self {
        Self {
            root: output_dir.trim_end_matches('/').to_string(),
        }
    }

    /// Output folder.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Folder holding every page of `group`.
    pub fn group_folder(&self, group: &GroupScan) -> String {
        format!("{}/{}", self.root, sanitize_file_stem(&group.folder_stem()))
    }

    /// Where page `page` (zero-based) of `group` is written.
    pub fn page_target(&self, group: &GroupScan, page: usize) -> PageTarget {
        let group_folder = self.group_folder(group);
        let name = sanitize_file_stem(&group.plan.output_name);
        if group.page_count > 1 {
            let n = page + 1;
            PageTarget {
                folder: format!("{group_folder}/Page_{n:02}"),
                material_path: format!("{group_folder}/Page_{n:02}/{name}_P{n:02}.mat"),
            }
        } else {
            PageTarget {
                material_path: format!("{group_folder}/{name}.mat"),
                folder: group_folder,
            }
        }
    }

    /// Path for a remapped copy of a mesh named `mesh_name`. Not uniquified.
    pub fn mesh_path(&self, mesh_name: &str) -> String {
        format!(
            "{}/{MESH_FOLDER}/{}_Atlased.mesh",
            self.root,
            sanitize_file_stem(mesh_name)
        )
    }

    /// Path of the rollback log. Not uniquified.
    pub fn log_path(&self) -> String {
        format!("{}/{LOG_FILE}", self.root)
    }
}
