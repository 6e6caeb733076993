//! The asset store interface and its in-memory / on-disk implementation.
//!
//! The atlas engine never touches the filesystem directly. It reads source
//! assets and creates new ones through [`AssetStore`], which a host can back with
//! its own asset database.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use thiserror::Error;

use crate::ids::{MaterialId, MeshId, ShaderId, TextureId};
use crate::material::Material;
use crate::mesh::Mesh;
use crate::shader::Shader;
use crate::texture::{Texture, TextureImport};

/// Suffix of the RON side file that stores a texture's import settings.
pub const IMPORT_SUFFIX: &str = ".import.ron";

// ---------------------------------------------------------------------------
// AssetError
// ---------------------------------------------------------------------------

/// Errors raised while reading or writing assets. Every variant names the
/// offending asset path.
#[derive(Debug, Error)]
pub enum AssetError {
    /// Filesystem read or write failed.
    #[error("i/o error at '{path}': {source}")]
    Io {
        /// Asset path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Image encode or decode failed.
    #[error("image error at '{path}': {source}")]
    Image {
        /// Asset path.
        path: String,
        /// Underlying error.
        #[source]
        source: image::ImageError,
    },

    /// RON serialization failed.
    #[error("failed to serialize '{path}': {source}")]
    Serialize {
        /// Asset path.
        path: String,
        /// Underlying error.
        #[source]
        source: ron::Error,
    },

    /// RON parsing failed.
    #[error("failed to parse '{path}': {source}")]
    Parse {
        /// Asset path.
        path: String,
        /// Underlying error.
        #[source]
        source: ron::error::SpannedError,
    },

    /// An asset already exists at the requested path.
    #[error("asset already exists at '{0}'")]
    AlreadyExists(String),

    /// No asset exists at the requested path.
    #[error("asset not found: '{0}'")]
    NotFound(String),
}

// ---------------------------------------------------------------------------
// AssetStore
// ---------------------------------------------------------------------------

/// Read/create access to project assets.
///
/// Asset paths are project-relative, use `/` separators, and double as asset
/// identities.
pub trait AssetStore {
    /// Looks up a shader by identity.
    fn shader(&self, id: &ShaderId) -> Option<&Shader>;

    /// Looks up a shader by display name.
    fn shader_by_name(&self, name: &str) -> Option<&Shader>;

    /// Looks up a material.
    fn material(&self, id: &MaterialId) -> Option<&Material>;

    /// Looks up a texture.
    fn texture(&self, id: &TextureId) -> Option<&Texture>;

    /// Looks up a mesh.
    fn mesh(&self, id: &MeshId) -> Option<&Mesh>;

    /// Returns `true` if any asset or document occupies `path`.
    fn exists(&self, path: &str) -> bool;

    /// Returns `path` if free, otherwise the first free `"<stem> N.<ext>"`
    /// variant counting from 1.
    fn unique_path(&self, path: &str) -> String {
        if !self.exists(path) {
            return path.to_string();
        }
        let (dir, file) = match path.rfind('/') {
            Some(i) => (&path[..=i], &path[i + 1..]),
            None => ("", path),
        };
        let (stem, ext) = match file.rfind('.') {
            Some(i) if i > 0 => (&file[..i], &file[i..]),
            _ => (file, ""),
        };
        let mut n = 1u32;
        loop {
            let candidate = format!("{dir}{stem} {n}{ext}");
            if !self.exists(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Saves an image as a new texture asset with the given import settings.
    fn create_texture(
        &mut self,
        path: &str,
        image: RgbaImage,
        import: TextureImport,
    ) -> Result<TextureId, AssetError>;

    /// Saves a new material asset. The material's id is replaced by `path`.
    fn create_material(&mut self, path: &str, material: Material)
    -> Result<MaterialId, AssetError>;

    /// Overwrites an existing material asset.
    fn update_material(&mut self, material: Material) -> Result<(), AssetError>;

    /// Saves a new mesh asset. The mesh's id is replaced by `path`.
    fn create_mesh(&mut self, path: &str, mesh: Mesh) -> Result<MeshId, AssetError>;

    /// Creates or overwrites a text document (logs, profiles).
    fn write_document(&mut self, path: &str, contents: &str) -> Result<(), AssetError>;

    /// Reads a text document.
    fn read_document(&self, path: &str) -> Result<String, AssetError>;
}

// ---------------------------------------------------------------------------
// AssetLibrary
// ---------------------------------------------------------------------------

/// Keeps every asset in memory and, when rooted on disk, mirrors each created
/// asset to `<root>/<path>` as it is created.
#[derive(Debug, Default)]
pub struct AssetLibrary {
    root: Option<PathBuf>,
    shaders: BTreeMap<ShaderId, Shader>,
    textures: BTreeMap<TextureId, Texture>,
    materials: BTreeMap<MaterialId, Material>,
    meshes: BTreeMap<MeshId, Mesh>,
    documents: BTreeMap<String, String>,
}

impl AssetLibrary {
    /// Creates an in-memory library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a library that persists created assets under `root`.
    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            ..Self::default()
        }
    }

    /// Directory created assets are written to, if any.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Registers a shader.
    pub fn add_shader(&mut self, shader: Shader) {
        self.shaders.insert(shader.id.clone(), shader);
    }

    /// Registers an existing texture without writing it.
    pub fn add_texture(&mut self, texture: Texture) {
        self.textures.insert(texture.id.clone(), texture);
    }

    /// Registers an existing material without writing it.
    pub fn add_material(&mut self, material: Material) {
        self.materials.insert(material.id.clone(), material);
    }

    /// Registers an existing mesh without writing it.
    pub fn add_mesh(&mut self, mesh: Mesh) {
        self.meshes.insert(mesh.id.clone(), mesh);
    }

    /// Iterates shaders in id order.
    pub fn shaders(&self) -> impl Iterator<Item = &Shader> {
        self.shaders.values()
    }

    /// Iterates textures in id order.
    pub fn textures(&self) -> impl Iterator<Item = &Texture> {
        self.textures.values()
    }

    /// Iterates materials in id order.
    pub fn materials(&self) -> impl Iterator<Item = &Material> {
        self.materials.values()
    }

    /// Iterates meshes in id order.
    pub fn meshes(&self) -> impl Iterator<Item = &Mesh> {
        self.meshes.values()
    }

    /// Iterates document paths in order.
    pub fn documents(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(String::as_str)
    }

    fn disk_path(&self, path: &str) -> Option<PathBuf> {
        self.root.as_ref().map(|root| root.join(path))
    }

    fn write_file(&self, path: &str, bytes: &[u8]) -> Result<(), AssetError> {
        let Some(full) = self.disk_path(path) else {
            return Ok(());
        };
        let io_err = |source| AssetError::Io {
            path: path.to_string(),
            source,
        };
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(&full, bytes).map_err(io_err)
    }

    fn write_ron<T: serde::Serialize>(&self, path: &str, value: &T) -> Result<(), AssetError> {
        if self.root.is_none() {
            return Ok(());
        }
        let text = ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::new()).map_err(
            |source| AssetError::Serialize {
                path: path.to_string(),
                source,
            },
        )?;
        self.write_file(path, text.as_bytes())
    }

    fn ensure_free(&self, path: &str) -> Result<(), AssetError> {
        if self.exists(path) {
            return Err(AssetError::AlreadyExists(path.to_string()));
        }
        Ok(())
    }
}

impl AssetStore for AssetLibrary {
    fn shader(&self, id: &ShaderId) -> Option<&Shader> {
        self.shaders.get(id)
    }

    fn shader_by_name(&self, name: &str) -> Option<&Shader> {
        self.shaders.values().find(|s| s.name == name)
    }

    fn material(&self, id: &MaterialId) -> Option<&Material> {
        self.materials.get(id)
    }

    fn texture(&self, id: &TextureId) -> Option<&Texture> {
        self.textures.get(id)
    }

    fn mesh(&self, id: &MeshId) -> Option<&Mesh> {
        self.meshes.get(id)
    }

    fn exists(&self, path: &str) -> bool {
        self.textures.contains_key(&TextureId::new(path))
            || self.materials.contains_key(&MaterialId::new(path))
            || self.meshes.contains_key(&MeshId::new(path))
            || self.documents.contains_key(path)
            || self.disk_path(path).is_some_and(|p| p.exists())
    }

    fn create_texture(
        &mut self,
        path: &str,
        image: RgbaImage,
        import: TextureImport,
    ) -> Result<TextureId, AssetError> {
        self.ensure_free(path)?;
        if let Some(full) = self.disk_path(path) {
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent).map_err(|source| AssetError::Io {
                    path: path.to_string(),
                    source,
                })?;
            }
            image.save(&full).map_err(|source| AssetError::Image {
                path: path.to_string(),
                source,
            })?;
            self.write_ron(&format!("{path}{IMPORT_SUFFIX}"), &import)?;
        }
        let id = TextureId::new(path);
        let name = file_stem(path);
        tracing::debug!("Created texture '{path}' ({}x{})", image.width(), image.height());
        self.textures.insert(
            id.clone(),
            Texture {
                id: id.clone(),
                name,
                image,
                import,
            },
        );
        Ok(id)
    }

    fn create_material(
        &mut self,
        path: &str,
        mut material: Material,
    ) -> Result<MaterialId, AssetError> {
        self.ensure_free(path)?;
        material.id = MaterialId::new(path);
        self.write_ron(path, &material)?;
        tracing::debug!("Created material '{path}'");
        let id = material.id.clone();
        self.materials.insert(id.clone(), material);
        Ok(id)
    }

    fn update_material(&mut self, material: Material) -> Result<(), AssetError> {
        if !self.materials.contains_key(&material.id) {
            return Err(AssetError::NotFound(material.id.to_string()));
        }
        self.write_ron(material.id.as_str(), &material)?;
        self.materials.insert(material.id.clone(), material);
        Ok(())
    }

    fn create_mesh(&mut self, path: &str, mut mesh: Mesh) -> Result<MeshId, AssetError> {
        self.ensure_free(path)?;
        mesh.id = MeshId::new(path);
        self.write_ron(path, &mesh)?;
        tracing::debug!("Created mesh '{path}' ({} vertices)", mesh.vertex_count());
        let id = mesh.id.clone();
        self.meshes.insert(id.clone(), mesh);
        Ok(id)
    }

    fn write_document(&mut self, path: &str, contents: &str) -> Result<(), AssetError> {
        self.write_file(path, contents.as_bytes())?;
        self.documents.insert(path.to_string(), contents.to_string());
        Ok(())
    }

    fn read_document(&self, path: &str) -> Result<String, AssetError> {
        if let Some(text) = self.documents.get(path) {
            return Ok(text.clone());
        }
        match self.disk_path(path) {
            Some(full) if full.exists() => {
                std::fs::read_to_string(full).map_err(|source| AssetError::Io {
                    path: path.to_string(),
                    source,
                })
            }
            _ => Err(AssetError::NotFound(path.to_string())),
        }
    }
}

/// File name without directory or extension.
pub(crate) fn file_stem(path: &str) -> String {
    let file = path.rsplit('/').next().unwrap_or(path);
    match file.rfind('.') {
        Some(i) if i > 0 => file[..i].to_string(),
        _ => file.to_string(),
    }
}
