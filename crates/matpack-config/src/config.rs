//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Name of the configuration file inside the config directory.
pub const CONFIG_FILE: &str = "matpack.ron";

/// Top-level builder configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Atlas page geometry.
    pub atlas: AtlasConfig,
    /// Which material traits split groups.
    pub grouping: GroupingConfig,
    /// Output and policy settings.
    pub build: BuildConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Atlas page geometry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AtlasConfig {
    /// Maximum atlas width and height in pixels.
    pub atlas_size: u32,
    /// Maximum number of tiles per atlas row and column.
    pub grid: u32,
    /// Bleed border around each tile in pixels.
    pub padding: u32,
}

/// Grouping toggles. A disabled toggle stops that trait from splitting groups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GroupingConfig {
    /// Split by enabled shader keyword set.
    pub by_keywords: bool,
    /// Split by render queue.
    pub by_render_queue: bool,
    /// Split opaque from transparent materials.
    pub by_transparency: bool,
}

/// What to do with a group whose materials still differ in a value the plan does
/// not resolve.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
pub enum DiffPolicy {
    /// Skip the group at build time.
    #[default]
    StopIfUnresolved,
    /// Bake with the first material's values.
    ProceedWithFirst,
    /// Bake, then copy unresolved values from a sample material.
    UseSampleMaterial,
}

/// Output and policy settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BuildConfig {
    /// Project-relative folder receiving generated assets.
    pub output_dir: String,
    /// Apply to a clone of the root instead of the root itself.
    pub clone_on_apply: bool,
    /// Unresolved-difference policy.
    pub diff_policy: DiffPolicy,
    /// Material supplying values for [`DiffPolicy::UseSampleMaterial`].
    pub sample_material: Option<String>,
    /// Merge submeshes that end up sharing a merged material.
    pub merge_submeshes: bool,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            atlas_size: 2048,
            grid: 4,
            padding: 8,
        }
    }
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            by_keywords: true,
            by_render_queue: true,
            by_transparency: true,
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            output_dir: "MatpackOutput".to_string(),
            clone_on_apply: true,
            diff_policy: DiffPolicy::StopIfUnresolved,
            sample_material: None,
            merge_submeshes: true,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Platform configuration directory for the builder (`<config>/matpack`).
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("matpack"))
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let config = read_config(&config_path)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `matpack.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(|source| ConfigError::Io {
            path: config_dir.to_path_buf(),
            source,
        })?;

        let config_path = config_dir.join(CONFIG_FILE);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);
        let serialized = ron::ser::to_string_pretty(self, pretty)?;

        std::fs::write(&config_path, serialized).map_err(|source| ConfigError::Io {
            path: config_path.clone(),
            source,
        })
    }

    /// Re-reads the file: returns `Some(new_config)` if it changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let new_config = read_config(&config_dir.join(CONFIG_FILE))?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ron::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
