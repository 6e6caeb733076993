//! On-disk project: a `project.ron` manifest plus the asset files it lists.
//!
//! Layout under the project root:
//!
//! ```text
//! project.ron              shaders (inline), asset lists, scene
//! <texture>.png            texels
//! <texture>.png.import.ron import settings
//! <material>.mat           RON-encoded Material
//! <mesh>.mesh              RON-encoded Mesh
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ids::{MaterialId, MeshId, TextureId};
use crate::material::Material;
use crate::mesh::Mesh;
use crate::scene::Scene;
use crate::shader::Shader;
use crate::store::{AssetError, AssetLibrary, file_stem};
use crate::texture::{Texture, TextureImport};

/// Manifest file name.
pub const MANIFEST_FILE: &str = "project.ron";

/// Manifest entry for a texture.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TextureRecord {
    /// Project-relative path of the image.
    pub id: TextureId,
    /// Import settings. Falls back to the `.import.ron` side file, then defaults.
    #[serde(default)]
    pub import: Option<TextureImport>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct Manifest {
    shaders: Vec<Shader>,
    textures: Vec<TextureRecord>,
    materials: Vec<MaterialId>,
    meshes: Vec<MeshId>,
    scene: Scene,
}

/// A loaded project: its asset library and scene.
#[derive(Debug)]
pub struct Project {
    /// All assets, rooted at the project directory when loaded from disk.
    pub library: AssetLibrary,
    /// Scene hierarchy.
    pub scene: Scene,
}

impl Project {
    /// Creates an empty in-memory project.
    pub fn in_memory() -> Self {
        Self {
            library: AssetLibrary::new(),
            scene: Scene::new(),
        }
    }

    /// Loads `project.ron` and every asset it lists from `root`.
    pub fn load(root: &Path) -> Result<Self, AssetError> {
        let manifest: Manifest = read_ron(root, MANIFEST_FILE)?;
        let mut library = AssetLibrary::rooted(root);

        for shader in manifest.shaders {
            library.add_shader(shader);
        }
        for record in manifest.textures {
            let path = record.id.as_str();
            let full = root.join(path);
            let image = image::open(&full)
                .map_err(|source| AssetError::Image {
                    path: path.to_string(),
                    source,
                })?
                .to_rgba8();
            let import = match record.import {
                Some(import) => import,
                None => {
                    let side = format!("{path}{}", crate::store::IMPORT_SUFFIX);
                    if root.join(&side).exists() {
                        read_ron(root, &side)?
                    } else {
                        TextureImport::default()
                    }
                }
            };
            library.add_texture(Texture {
                name: file_stem(path),
                id: record.id,
                image,
                import,
            });
        }
        for id in manifest.materials {
            let mut material: Material = read_ron(root, id.as_str())?;
            material.id = id;
            library.add_material(material);
        }
        for id in manifest.meshes {
            let mut mesh: Mesh = read_ron(root, id.as_str())?;
            mesh.id = id;
            library.add_mesh(mesh);
        }

        tracing::info!(
            "Loaded project from {} ({} nodes)",
            root.display(),
            manifest.scene.len()
        );
        Ok(Self {
            library,
            scene: manifest.scene,
        })
    }

    /// Writes `project.ron` listing every asset currently in the library.
    ///
    /// Asset files themselves are written by the library when created; this only
    /// rewrites the manifest.
    pub fn save_manifest(&self, root: &Path) -> Result<PathBuf, AssetError> {
        let manifest = Manifest {
            shaders: self.library.shaders().cloned().collect(),
            textures: self
                .library
                .textures()
                .map(|t| TextureRecord {
                    id: t.id.clone(),
                    import: Some(t.import.clone()),
                })
                .collect(),
            materials: self.library.materials().map(|m| m.id.clone()).collect(),
            meshes: self.library.meshes().map(|m| m.id.clone()).collect(),
            scene: self.scene.clone(),
        };
        let path = root.join(MANIFEST_FILE);
        let text = ron::ser::to_string_pretty(&manifest, ron::ser::PrettyConfig::new()).map_err(
            |source| AssetError::Serialize {
                path: MANIFEST_FILE.to_string(),
                source,
            },
        )?;
        std::fs::write(&path, text).map_err(|source| AssetError::Io {
            path: MANIFEST_FILE.to_string(),
            source,
        })?;
        Ok(path)
    }
}

fn read_ron<T: serde::de::DeserializeOwned>(root: &Path, path: &str) -> Result<T, AssetError> {
    let text = std::fs::read_to_string(root.join(path)).map_err(|source| AssetError::Io {
        path: path.to_string(),
        source,
    })?;
    ron::from_str(&text).map_err(|source| AssetError::Parse {
        path: path.to_string(),
        source,
    })
}
