//! Build settings snapshot and validation.

use matpack_config::{Config, DiffPolicy, GroupingConfig};
use matpack_materials::GeneratorSettings;
use matpack_scene::{MaterialId, NodeId, Scene};

use crate::error::ValidationError;

/// Smallest atlas edge a build accepts.
pub const MIN_ATLAS_SIZE: u32 = 64;

/// Suffix appended to the name of a cloned root.
pub const CLONE_SUFFIX: &str = "_Atlased";

/// Everything one build reads from the configuration, captured up front so a
/// build never observes a config change halfway through.
#[derive(Clone, Debug, PartialEq)]
pub struct BuildSettings {
    /// Page edge in pixels.
    pub atlas_size: u32,
    /// Tiles per page row and column.
    pub grid: u32,
    /// Bleed padding per tile side.
    pub padding: u32,
    /// Output folder, project-relative.
    pub output_dir: String,
    /// Apply to a clone of the root instead of the root itself.
    pub clone_on_apply: bool,
    /// Unresolved-difference policy.
    pub diff_policy: DiffPolicy,
    /// Sample material for [`DiffPolicy::UseSampleMaterial`].
    pub sample_material: Option<MaterialId>,
    /// Merge submeshes that end up sharing a merged material.
    pub merge_submeshes: bool,
    /// Grouping toggles used for the apply-time re-scan.
    pub grouping: GroupingConfig,
    /// Scanned root, or the whole scene when `None`.
    pub root: Option<NodeId>,
}

impl BuildSettings {
    /// Snapshots `config` for a build rooted at `root`.
    pub fn from_config(config: &Config, root: Option<NodeId>) -> Self {
        Self {
            atlas_size: config.atlas.atlas_size,
            grid: config.atlas.grid,
            padding: config.atlas.padding,
            output_dir: config.build.output_dir.trim_end_matches('/').to_string(),
            clone_on_apply: config.build.clone_on_apply,
            diff_policy: config.build.diff_policy,
            sample_material: config
                .build
                .sample_material
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(MaterialId::new),
            merge_submeshes: config.build.merge_submeshes,
            grouping: config.grouping.clone(),
            root,
        }
    }

    /// Edge of one grid cell.
    pub fn cell(&self) -> u32 {
        self.atlas_size.checked_div(self.grid).unwrap_or(0)
    }

    /// Edge of a tile's content box, `None` when padding consumes the cell.
    pub fn content(&self) -> Option<u32> {
        self.cell()
            .checked_sub(self.padding.saturating_mul(2))
            .filter(|c| *c > 0)
    }

    /// Tiles on one page.
    pub fn tiles_per_page(&self) -> usize {
        (self.grid as usize).pow(2)
    }

    /// Page geometry for the atlas generator.
    pub fn generator_settings(&self) -> GeneratorSettings {
        GeneratorSettings {
            cell: self.cell(),
            padding: self.padding,
            max_atlas_size: self.atlas_size,
            max_grid: self.grid,
        }
    }

    /// Checks the settings against `scene`. Runs before any write.
    pub fn validate(&self, scene: &Scene) -> Result<(), ValidationError> {
        if self.clone_on_apply && self.root.is_none() {
            return Err(ValidationError::MissingRoot);
        }
        if let Some(root) = self.root
            && !scene.contains(root)
        {
            return Err(ValidationError::RootNotFound(root));
        }
        if self.atlas_size < MIN_ATLAS_SIZE {
            return Err(ValidationError::AtlasTooSmall {
                size: self.atlas_size,
                min: MIN_ATLAS_SIZE,
            });
        }
        if self.grid == 0 {
            return Err(ValidationError::ZeroGrid);
        }
        if self.content().is_none() {
            return Err(ValidationError::NoContent {
                cell: self.cell(),
                padding: self.padding,
            });
        }
        if self.output_dir.trim().is_empty() {
            return Err(ValidationError::EmptyOutput);
        }
        if self.diff_policy == DiffPolicy::UseSampleMaterial && self.sample_material.is_none() {
            return Err(ValidationError::MissingSample);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> BuildSettings {
        BuildSettings::from_config(&Config::default(), None)
    }

    #[test]
    fn test_defaults_are_valid_without_clone() {
        let mut s = settings();
        s.clone_on_apply = false;
        assert_eq!(s.validate(&Scene::new()), Ok(()));
        assert_eq!(s.cell(), 512);
        assert_eq!(s.content(), Some(496));
        assert_eq!(s.tiles_per_page(), 16);
    }

    #[test]
    fn test_clone_requires_root() {
        let mut scene = Scene::new();
        let mut s = settings();
        s.clone_on_apply = true;
        assert_eq!(s.validate(&scene), Err(ValidationError::MissingRoot));

        s.root = Some(NodeId(42));
        assert_eq!(s.validate(&scene), Err(ValidationError::RootNotFound(NodeId(42))));

        s.root = Some(scene.add_node("root", None, None));
        assert_eq!(s.validate(&scene), Ok(()));
    }

    #[test]
    fn test_geometry_limits() {
        let scene = Scene::new();
        let mut s = settings();
        s.clone_on_apply = false;

        s.atlas_size = 32;
        assert!(matches!(
            s.validate(&scene),
            Err(ValidationError::AtlasTooSmall { size: 32, .. })
        ));

        s.atlas_size = 256;
        s.grid = 0;
        assert_eq!(s.validate(&scene), Err(ValidationError::ZeroGrid));

        s.grid = 4;
        s.padding = 32;
        assert_eq!(
            s.validate(&scene),
            Err(ValidationError::NoContent {
                cell: 64,
                padding: 32
            })
        );
    }

    #[test]
    fn test_output_and_sample_checks() {
        let scene = Scene::new();
        let mut s = settings();
        s.clone_on_apply = false;
        s.output_dir = "  ".to_string();
        assert_eq!(s.validate(&scene), Err(ValidationError::EmptyOutput));

        s.output_dir = "Out".to_string();
        s.diff_policy = DiffPolicy::UseSampleMaterial;
        assert_eq!(s.validate(&scene), Err(ValidationError::MissingSample));
        s.sample_material = Some(MaterialId::new("Sample.mat"));
        assert_eq!(s.validate(&scene), Ok(()));
    }

    #[test]
    fn test_from_config_trims_output_and_empty_sample() {
        let mut config = Config::default();
        config.build.output_dir = "Generated/Atlas/".to_string();
        config.build.sample_material = Some(String::new());
        let s = BuildSettings::from_config(&config, None);
        assert_eq!(s.output_dir, "Generated/Atlas");
        assert_eq!(s.sample_material, None);
    }
}
