//! Plan profiles: the user's grouping toggles, atlas settings, policy, and
//! per-group/per-row plan state, persisted as RON so a later session can
//! rebuild equivalent plans.
//!
//! Groups are keyed by shader GUID *and* name so a profile still applies when
//! a shader asset moved. Resolution order: GUID, then name, then any scanned
//! group whose keyword/queue/transparency key matches.

use matpack_config::{AtlasConfig, Config, DiffPolicy, GroupingConfig};
use matpack_scene::{AssetError, AssetStore, ShaderId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::group::{GroupKey, GroupPlan, GroupScan};
use crate::plan::apply_merge_keys;
use crate::rows::{BakeMode, Modifier, PropertyRow, RowPlan};

/// Errors raised while saving or loading a profile.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// RON serialization failed.
    #[error("failed to serialize profile: {0}")]
    Serialize(#[from] ron::Error),

    /// RON parsing failed.
    #[error("failed to parse profile: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Reading or writing the profile document failed.
    #[error(transparent)]
    Asset(#[from] AssetError),
}

// ---------------------------------------------------------------------------
// Profile types
// ---------------------------------------------------------------------------

/// Group identity that survives a shader asset being moved or renamed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileKey {
    /// Shader identity when captured.
    pub shader_guid: String,
    /// Shader display name when captured.
    pub shader_name: String,
    /// Keyword-set hash.
    pub keywords_hash: u64,
    /// Render queue.
    pub render_queue: i32,
    /// Transparency class.
    pub transparency: u8,
}

/// Persisted row intent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RowProfile {
    /// Property name.
    pub name: String,
    /// See [`RowPlan::do_action`].
    pub do_action: bool,
    /// See [`RowPlan::bake`].
    pub bake: BakeMode,
    /// See [`RowPlan::modifier`].
    #[serde(default)]
    pub modifier: Option<Modifier>,
    /// See [`RowPlan::reset_after_bake`].
    #[serde(default)]
    pub reset_after_bake: bool,
    /// See [`RowPlan::drop_alpha`].
    #[serde(default)]
    pub drop_alpha: bool,
}

impl RowProfile {
    fn capture(row: &PropertyRow) -> Self {
        Self {
            name: row.name.clone(),
            do_action: row.plan.do_action,
            bake: row.plan.bake.clone(),
            modifier: row.plan.modifier.clone(),
            reset_after_bake: row.plan.reset_after_bake,
            drop_alpha: row.plan.drop_alpha,
        }
    }

    fn plan(&self) -> RowPlan {
        RowPlan {
            do_action: self.do_action,
            bake: self.bake.clone(),
            modifier: self.modifier.clone(),
            reset_after_bake: self.reset_after_bake,
            drop_alpha: self.drop_alpha,
        }
    }
}

/// Persisted group plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupProfile {
    /// Group identity.
    pub key: ProfileKey,
    /// Profile of a merged group (applied after merge keys are re-applied).
    #[serde(default)]
    pub merged: bool,
    /// See [`GroupPlan::enabled`].
    pub enabled: bool,
    /// See [`GroupPlan::output_name`].
    pub output_name: String,
    /// See [`GroupPlan::merge_key`].
    #[serde(default)]
    pub merge_key: Option<String>,
    /// Row intents by property name.
    #[serde(default)]
    pub rows: Vec<RowProfile>,
}

impl GroupProfile {
    fn capture<S: AssetStore>(group: &GroupScan, merged: bool, store: &S) -> Self {
        let shader_name = store
            .shader(&group.key.shader)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| group.shader_name.clone());
        Self {
            key: ProfileKey {
                shader_guid: group.key.shader.to_string(),
                shader_name,
                keywords_hash: group.key.keywords_hash,
                render_queue: group.key.render_queue,
                transparency: group.key.transparency,
            },
            merged,
            enabled: group.plan.enabled,
            output_name: group.plan.output_name.clone(),
            merge_key: group.plan.merge_key.clone(),
            rows: group.rows.iter().map(RowProfile::capture).collect(),
        }
    }

    fn restore(&self, group: &mut GroupScan) {
        group.plan = GroupPlan {
            enabled: self.enabled && group.is_merge_eligible(),
            output_name: self.output_name.clone(),
            merge_key: self.merge_key.clone(),
        };
        for row in &mut group.rows {
            if let Some(saved) = self.rows.iter().find(|r| r.name == row.name) {
                row.plan = saved.plan();
            }
        }
    }
}

/// Everything needed to rebuild a plan in a later session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanProfile {
    /// Grouping toggles.
    pub grouping: GroupingConfig,
    /// Atlas geometry.
    pub atlas: AtlasConfig,
    /// Unresolved-difference policy.
    pub diff_policy: DiffPolicy,
    /// Sample material for [`DiffPolicy::UseSampleMaterial`].
    pub sample_material: Option<String>,
    /// Group plans.
    pub groups: Vec<GroupProfile>,
}

impl PlanProfile {
    /// Captures settings from `config` and the plan of every scanned group.
    /// Member groups of a merged group are captured alongside it.
    pub fn capture<S: AssetStore>(config: &Config, groups: &[GroupScan], store: &S) -> Self {
        let mut profiles = Vec::new();
        for group in groups {
            if group.is_merged() {
                for child in &group.children {
                    profiles.push(GroupProfile::capture(child, false, store));
                }
                profiles.push(GroupProfile::capture(group, true, store));
            } else {
                profiles.push(GroupProfile::capture(group, false, store));
            }
        }
        Self {
            grouping: config.grouping.clone(),
            atlas: config.atlas.clone(),
            diff_policy: config.build.diff_policy,
            sample_material: config.build.sample_material.clone(),
            groups: profiles,
        }
    }

    /// Writes the profile's settings into `config`.
    pub fn apply_settings(&self, config: &mut Config) {
        config.grouping = self.grouping.clone();
        config.atlas = self.atlas.clone();
        config.build.diff_policy = self.diff_policy;
        config.build.sample_material = self.sample_material.clone();
    }

    /// Restores group and row plans onto a fresh scan, then re-applies merge
    /// keys and restores merged-group plans. Profiles whose group cannot be
    /// resolved are skipped.
    pub fn apply<S: AssetStore>(&self, groups: Vec<GroupScan>, store: &S) -> Vec<GroupScan> {
        let mut groups = groups;
        let mut restored = 0;
        for profile in self.groups.iter().filter(|p| !p.merged) {
            let Some(key) = resolve_key(&profile.key, &groups, store) else {
                tracing::warn!(
                    "Profile group '{}' ({}) matches nothing in the scan",
                    profile.output_name,
                    profile.key.shader_name
                );
                continue;
            };
            if let Some(group) = groups.iter_mut().find(|g| g.key == key) {
                profile.restore(group);
                restored += 1;
            }
        }

        let mut groups = apply_merge_keys(groups, store);
        for profile in self.groups.iter().filter(|p| p.merged) {
            let Some(key) = resolve_key(&profile.key, &groups, store) else {
                continue;
            };
            if let Some(group) = groups.iter_mut().find(|g| g.key == key && g.is_merged()) {
                profile.restore(group);
                restored += 1;
            }
        }
        tracing::info!("Restored {restored} of {} group plan(s)", self.groups.len());
        groups
    }

    /// Serializes to pretty RON.
    pub fn to_ron(&self) -> Result<String, ProfileError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::new(),
        )?)
    }

    /// Parses RON.
    pub fn from_ron(text: &str) -> Result<Self, ProfileError> {
        Ok(ron::from_str(text)?)
    }

    /// Saves as a document in `store`.
    pub fn save<S: AssetStore>(&self, store: &mut S, path: &str) -> Result<(), ProfileError> {
        store.write_document(path, &self.to_ron()?)?;
        tracing::info!("Saved plan profile to '{path}'");
        Ok(())
    }

    /// Loads a document from `store`.
    pub fn load<S: AssetStore>(store: &S, path: &str) -> Result<Self, ProfileError> {
        Self::from_ron(&store.read_document(path)?)
    }
}

/// Resolves a persisted key to a scanned [`GroupKey`].
fn resolve_key<S: AssetStore>(
    key: &ProfileKey,
    groups: &[GroupScan],
    store: &S,
) -> Option<GroupKey> {
    let with_shader = |shader: ShaderId| GroupKey {
        shader,
        keywords_hash: key.keywords_hash,
        render_queue: key.render_queue,
        transparency: key.transparency,
    };

    if let Some(shader) = store.shader(&ShaderId::new(key.shader_guid.as_str())) {
        return Some(with_shader(shader.id.clone()));
    }
    if let Some(shader) = store.shader_by_name(&key.shader_name) {
        tracing::debug!("Shader '{}' resolved by name", key.shader_name);
        return Some(with_shader(shader.id.clone()));
    }

    let candidates: Vec<&GroupScan> = groups
        .iter()
        .filter(|g| {
            g.key.keywords_hash == key.keywords_hash
                && g.key.render_queue == key.render_queue
                && g.key.transparency == key.transparency
        })
        .collect();
    let found = match candidates.iter().find(|g| g.shader_name == key.shader_name) {
        Some(g) => Some(*g),
        None if candidates.len() == 1 => Some(candidates[0]),
        None => None,
    };
    found.map(|g| {
        tracing::debug!("Shader '{}' re-derived from scanned materials", key.shader_name);
        g.key.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::group_materials;
    use matpack_scene::{
        AssetLibrary, Material, MaterialId, NodeId, PropertyValue, Renderer, Scene, Shader,
        ShaderProperty,
    };

    fn shader(id: &str, name: &str) -> Shader {
        Shader {
            id: ShaderId::new(id),
            name: name.to_string(),
            properties: vec![
                ShaderProperty::texture("_MainTex"),
                ShaderProperty::color("_Color", [1.0; 4]),
            ],
        }
    }

    fn project(shader_id: &str, shader_name: &str) -> (AssetLibrary, Scene, NodeId) {
        let mut lib = AssetLibrary::new();
        lib.add_shader(shader(shader_id, shader_name));
        let specs = [
            ("a.mat", 2000, 0.0),
            ("b.mat", 2000, 1.0),
            ("c.mat", 2450, 0.5),
            ("d.mat", 2450, 0.2),
        ];
        for (name, queue, g) in specs {
            let mut m = Material::new(MaterialId::new(name), name, ShaderId::new(shader_id));
            m.render_queue = queue;
            m.set_value("_Color", PropertyValue::Color([g, g, g, 1.0]));
            lib.add_material(m);
        }
        let mut scene = Scene::new();
        let root = scene.add_node("root", None, None);
        scene.add_node(
            "s",
            Some(root),
            Some(Renderer {
                mesh: None,
                materials: ["a.mat", "b.mat", "c.mat", "d.mat"]
                    .iter()
                    .map(|m| Some(MaterialId::new(*m)))
                    .collect(),
            }),
        );
        (lib, scene, root)
    }

    fn scan(lib: &AssetLibrary, scene: &Scene, root: NodeId) -> Vec<GroupScan> {
        group_materials(scene, Some(root), lib, &GroupingConfig::default(), 16)
    }

    fn edited(lib: &AssetLibrary, scene: &Scene, root: NodeId) -> Vec<GroupScan> {
        let mut groups = scan(lib, scene, root);
        groups[0].plan.output_name = "Props".to_string();
        let color = groups[0].row_mut("_Color").unwrap();
        color.plan.do_action = true;
        color.plan.bake = BakeMode::BakeColorToTexture {
            target: "_MainTex".to_string(),
        };
        color.plan.drop_alpha = true;
        groups[1].plan.enabled = false;
        groups
    }

    #[test]
    fn test_capture_round_trips_through_ron() {
        let (lib, scene, root) = project("guid-lit", "Lit");
        let groups = edited(&lib, &scene, root);
        let mut config = Config::default();
        config.build.diff_policy = DiffPolicy::ProceedWithFirst;
        let profile = PlanProfile::capture(&config, &groups, &lib);
        assert_eq!(profile.groups.len(), 2);
        assert_eq!(profile.groups[0].key.shader_guid, "guid-lit");

        let text = profile.to_ron().unwrap();
        let back = PlanProfile::from_ron(&text).unwrap();
        assert_eq!(back, profile);

        let mut restored = Config::default();
        back.apply_settings(&mut restored);
        assert_eq!(restored.build.diff_policy, DiffPolicy::ProceedWithFirst);
    }

    #[test]
    fn test_apply_restores_plans_on_fresh_scan() {
        let (lib, scene, root) = project("guid-lit", "Lit");
        let profile = PlanProfile::capture(&Config::default(), &edited(&lib, &scene, root), &lib);

        let fresh = profile.apply(scan(&lib, &scene, root), &lib);
        assert_eq!(fresh[0].plan.output_name, "Props");
        let color = fresh[0].row("_Color").unwrap();
        assert!(color.plan.do_action);
        assert!(color.plan.drop_alpha);
        assert!(!fresh[1].plan.enabled);
    }

    #[test]
    fn test_apply_resolves_moved_shader_by_name() {
        let (lib, scene, root) = project("guid-lit", "Lit");
        let profile = PlanProfile::capture(&Config::default(), &edited(&lib, &scene, root), &lib);

        let (moved, scene, root) = project("guid-new", "Lit");
        let fresh = profile.apply(scan(&moved, &scene, root), &moved);
        assert_eq!(fresh[0].key.shader, ShaderId::new("guid-new"));
        assert_eq!(fresh[0].plan.output_name, "Props");
    }

    #[test]
    fn test_apply_re_derives_key_from_scan() {
        let (lib, scene, root) = project("guid-lit", "Lit");
        let profile = PlanProfile::capture(&Config::default(), &edited(&lib, &scene, root), &lib);

        let (renamed, scene, root) = project("guid-other", "Lit (renamed)");
        let fresh = profile.apply(scan(&renamed, &scene, root), &renamed);
        assert_eq!(fresh[0].plan.output_name, "Props");
        assert!(fresh[0].row("_Color").unwrap().plan.do_action);
    }

    #[test]
    fn test_merged_groups_round_trip() {
        let (lib, scene, root) = project("guid-lit", "Lit");
        let mut groups = scan(&lib, &scene, root);
        groups[0].plan.merge_key = Some("all".to_string());
        groups[1].plan.merge_key = Some("all".to_string());
        let mut merged = apply_merge_keys(groups, &lib);
        assert_eq!(merged.len(), 1);
        merged[0].plan.output_name = "Everything".to_string();

        let profile = PlanProfile::capture(&Config::default(), &merged, &lib);
        assert_eq!(profile.groups.len(), 3);
        assert!(profile.groups[2].merged);

        let fresh = profile.apply(scan(&lib, &scene, root), &lib);
        assert_eq!(fresh.len(), 1);
        assert!(fresh[0].is_merged());
        assert_eq!(fresh[0].plan.output_name, "Everything");
        assert_eq!(fresh[0].material_count(), 4);
    }

    #[test]
    fn test_save_and_load_document() {
        let (mut lib, scene, root) = project("guid-lit", "Lit");
        let groups = scan(&lib, &scene, root);
        let profile = PlanProfile::capture(&Config::default(), &groups, &lib);
        profile.save(&mut lib, "Profiles/plan.ron").unwrap();
        assert_eq!(PlanProfile::load(&lib, "Profiles/plan.ron").unwrap(), profile);
        assert!(matches!(
            PlanProfile::load(&lib, "missing.ron"),
            Err(ProfileError::Asset(AssetError::NotFound(_)))
        ));
    }
}
