//! Per-build cache of default-parameter materials, keyed by shader.

use matpack_scene::{Material, MaterialId, PropertyValue, Shader, ShaderId};
use rustc_hash::FxHashMap;

/// Default-parameter materials instantiated at most once per shader.
#[derive(Debug, Default)]
pub struct DefaultMaterialCache {
    by_shader: FxHashMap<ShaderId, Material>,
}

impl DefaultMaterialCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The default material for `shader`, instantiated on first use.
    pub fn material(&mut self, shader: &Shader) -> &Material {
        self.by_shader.entry(shader.id.clone()).or_insert_with(|| {
            tracing::debug!("Instantiating default material for shader '{}'", shader.name);
            Material::from_shader_defaults(
                MaterialId::new(format!("{}#defaults", shader.id)),
                shader,
            )
        })
    }

    /// Default value of `property` on `shader`.
    pub fn default_value(&mut self, shader: &Shader, property: &str) -> Option<PropertyValue> {
        let material = self.material(shader);
        material.value(shader, property).cloned()
    }

    /// Shaders cached so far.
    pub fn len(&self) -> usize {
        self.by_shader.len()
    }

    /// Returns `true` if nothing has been cached.
    pub fn is_empty(&self) -> bool {
        self.by_shader.is_empty()
    }
}
