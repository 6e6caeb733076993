//! Grouping: partitions the materials used under a scene root into groups of
//! interchangeable materials and computes each group's property rows.

use std::collections::BTreeSet;
use std::hash::Hasher;

use matpack_config::GroupingConfig;
use matpack_scene::{AssetStore, Material, MaterialId, NodeId, Scene, ShaderId};
use rustc_hash::{FxHashMap, FxHasher};
use serde::{Deserialize, Serialize};

use crate::rows::PropertyRow;
use crate::scan::scan_properties;

// ---------------------------------------------------------------------------
// GroupKey
// ---------------------------------------------------------------------------

/// Identifies one material group for a given set of grouping toggles.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    /// Shader identity.
    pub shader: ShaderId,
    /// Order-independent hash of the keyword set, 0 when keywords are ignored.
    pub keywords_hash: u64,
    /// Render queue, 0 when queues are ignored.
    pub render_queue: i32,
    /// 1 for transparent, 0 for opaque or when transparency is ignored.
    pub transparency: u8,
}

impl GroupKey {
    /// Derives the key for `material` under `options`.
    pub fn for_material(material: &Material, options: &GroupingConfig) -> Self {
        Self {
            shader: material.shader.clone(),
            keywords_hash: if options.by_keywords {
                keywords_hash(&material.keywords)
            } else {
                0
            },
            render_queue: if options.by_render_queue {
                material.render_queue
            } else {
                0
            },
            transparency: if options.by_transparency && material.is_transparent() {
                1
            } else {
                0
            },
        }
    }
}

/// Hash of a keyword set. Sets are iterated in sorted order, so insertion order
/// never changes the result. The empty set hashes to 0.
pub fn keywords_hash(keywords: &BTreeSet<String>) -> u64 {
    if keywords.is_empty() {
        return 0;
    }
    let mut hasher = FxHasher::default();
    for keyword in keywords {
        hasher.write(keyword.as_bytes());
        hasher.write_u8(0xff);
    }
    hasher.finish()
}

// ---------------------------------------------------------------------------
// MaterialEntry / GroupScan
// ---------------------------------------------------------------------------

/// One material slot on one surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceSlot {
    /// Surface node.
    pub surface: NodeId,
    /// Material slot index on the surface's renderer.
    pub slot: usize,
}

/// A distinct material and every surface slot using it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaterialEntry {
    /// Material identity.
    pub material: MaterialId,
    /// Users in scan order.
    pub users: Vec<SurfaceSlot>,
}

/// User-editable plan state of a group.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupPlan {
    /// Build this group.
    pub enabled: bool,
    /// Base name of the merged material(s).
    pub output_name: String,
    /// Groups sharing a merge key may be fused into one.
    pub merge_key: Option<String>,
}

/// A scanned group: materials, layout, rows, and plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupScan {
    /// Grouping key.
    pub key: GroupKey,
    /// Shader display name.
    pub shader_name: String,
    /// Materials are transparent.
    pub transparent: bool,
    /// Distinct materials in first-use order.
    pub materials: Vec<MaterialEntry>,
    /// Tiles on one atlas page.
    pub tiles_per_page: usize,
    /// Atlas pages needed for all materials.
    pub page_count: usize,
    /// One row per declared shader property.
    pub rows: Vec<PropertyRow>,
    /// User plan.
    pub plan: GroupPlan,
    /// Original groups when this group is a merge of siblings.
    pub children: Vec<GroupScan>,
}

impl GroupScan {
    /// Number of distinct materials.
    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    /// Returns `true` if this group was produced by merging siblings.
    pub fn is_merged(&self) -> bool {
        !self.children.is_empty()
    }

    /// A single-material group gains nothing from atlasing.
    pub fn is_merge_eligible(&self) -> bool {
        self.materials.len() > 1
    }

    /// Looks up a row by property name.
    pub fn row(&self, name: &str) -> Option<&PropertyRow> {
        self.rows.iter().find(|r| r.name == name)
    }

    /// Looks up a row by property name, mutably.
    pub fn row_mut(&mut self, name: &str) -> Option<&mut PropertyRow> {
        self.rows.iter_mut().find(|r| r.name == name)
    }

    /// Materials placed on `page`, in tile order.
    pub fn page_materials(&self, page: usize) -> &[MaterialEntry] {
        let start = (page * self.tiles_per_page).min(self.materials.len());
        let end = (start + self.tiles_per_page).min(self.materials.len());
        &self.materials[start..end]
    }

    /// Recomputes rows and page layout from the current material list.
    /// User intent on rows is reset to scanner defaults.
    pub fn rescan<S: AssetStore>(&mut self, store: &S) {
        self.page_count = page_count(self.materials.len(), self.tiles_per_page);
        let Some(shader) = store.shader(&self.key.shader) else {
            tracing::warn!("Shader '{}' is missing; group has no rows", self.key.shader);
            self.rows.clear();
            return;
        };
        let materials: Vec<&Material> = self
            .materials
            .iter()
            .filter_map(|entry| store.material(&entry.material))
            .collect();
        self.rows = scan_properties(shader, &materials, store);
    }

    /// Folder-safe stem identifying this group: `<shader>_RQ<rq>_KW<hash>_T<0|1>`.
    pub fn folder_stem(&self) -> String {
        format!(
            "{}_RQ{}_KW{:016x}_T{}",
            self.shader_name, self.key.render_queue, self.key.keywords_hash, self.key.transparency
        )
    }
}

/// `ceil(materials / tiles_per_page)`.
pub fn page_count(materials: usize, tiles_per_page: usize) -> usize {
    if tiles_per_page == 0 {
        return 0;
    }
    materials.div_ceil(tiles_per_page)
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// Scans every material slot on surfaces under `root` (the whole scene when
/// `None`) and returns the groups in first-appearance order.
///
/// Slots with an empty binding, a missing material, or a missing shader are
/// skipped with a warning.
pub fn group_materials<S: AssetStore>(
    scene: &Scene,
    root: Option<NodeId>,
    store: &S,
    options: &GroupingConfig,
    tiles_per_page: usize,
) -> Vec<GroupScan> {
    let mut groups: Vec<GroupScan> = Vec::new();
    let mut by_key: FxHashMap<GroupKey, usize> = FxHashMap::default();

    for surface in scene.surfaces_under(root) {
        let Some(renderer) = scene.node(surface).and_then(|n| n.renderer.as_ref()) else {
            continue;
        };
        for (slot, binding) in renderer.materials.iter().enumerate() {
            let Some(material_id) = binding else {
                continue;
            };
            let Some(material) = store.material(material_id) else {
                tracing::warn!("Surface {surface} slot {slot}: material '{material_id}' is missing");
                continue;
            };
            let Some(shader) = store.shader(&material.shader) else {
                tracing::warn!(
                    "Material '{material_id}' uses missing shader '{}'",
                    material.shader
                );
                continue;
            };

            let key = GroupKey::for_material(material, options);
            let index = *by_key.entry(key.clone()).or_insert_with(|| {
                groups.push(GroupScan {
                    key,
                    shader_name: shader.name.clone(),
                    transparent: material.is_transparent(),
                    materials: Vec::new(),
                    tiles_per_page,
                    page_count: 0,
                    rows: Vec::new(),
                    plan: GroupPlan::default(),
                    children: Vec::new(),
                });
                groups.len() - 1
            });

            let group = &mut groups[index];
            let user = SurfaceSlot { surface, slot };
            match group.materials.iter_mut().find(|e| &e.material == material_id) {
                Some(entry) => {
                    if !entry.users.contains(&user) {
                        entry.users.push(user);
                    }
                }
                None => group.materials.push(MaterialEntry {
                    material: material_id.clone(),
                    users: vec![user],
                }),
            }
        }
    }

    for group in &mut groups {
        group.rescan(store);
        group.plan = GroupPlan {
            enabled: group.is_merge_eligible(),
            output_name: default_output_name(group),
            merge_key: None,
        };
    }

    tracing::info!("Grouped materials into {} group(s)", groups.len());
    groups
}

fn default_output_name(group: &GroupScan) -> String {
    let shader = group
        .shader_name
        .rsplit('/')
        .next()
        .unwrap_or(&group.shader_name);
    format!("{shader}_Atlas")
}

#[cfg(test)]
mod tests {
    use super::*;
    use matpack_scene::{AssetLibrary, Renderer, Shader, ShaderProperty};

    fn lit() -> Shader {
        Shader {
            id: ShaderId::new("lit"),
            name: "Custom/Lit".to_string(),
            properties: vec![
                ShaderProperty::texture("_MainTex"),
                ShaderProperty::color("_Color", [1.0; 4]),
            ],
        }
    }

    fn library(materials: Vec<Material>) -> AssetLibrary {
        let mut lib = AssetLibrary::new();
        lib.add_shader(lit());
        for m in materials {
            lib.add_material(m);
        }
        lib
    }

    fn material(name: &str) -> Material {
        Material::new(MaterialId::new(name), name, ShaderId::new("lit"))
    }

    fn surface(scene: &mut Scene, parent: NodeId, mats: &[&str]) -> NodeId {
        scene.add_node(
            "s",
            Some(parent),
            Some(Renderer {
                mesh: None,
                materials: mats.iter().map(|m| Some(MaterialId::new(*m))).collect(),
            }),
        )
    }

    #[test]
    fn test_keywords_hash_is_order_independent() {
        let a: BTreeSet<String> = ["B", "A"].iter().map(|s| s.to_string()).collect();
        let b: BTreeSet<String> = ["A", "B"].iter().map(|s| s.to_string()).collect();
        let c: BTreeSet<String> = ["AB"].iter().map(|s| s.to_string()).collect();
        assert_eq!(keywords_hash(&a), keywords_hash(&b));
        assert_ne!(keywords_hash(&a), keywords_hash(&c));
        assert_eq!(keywords_hash(&BTreeSet::new()), 0);
    }

    #[test]
    fn test_group_key_respects_toggles() {
        let mut m = material("m");
        m.keywords.insert("_NORMALMAP".to_string());
        m.render_queue = 3100;

        let all = GroupKey::for_material(&m, &GroupingConfig::default());
        assert_ne!(all.keywords_hash, 0);
        assert_eq!(all.render_queue, 3100);
        assert_eq!(all.transparency, 1);

        let none = GroupKey::for_material(
            &m,
            &GroupingConfig {
                by_keywords: false,
                by_render_queue: false,
                by_transparency: false,
            },
        );
        assert_eq!(none.keywords_hash, 0);
        assert_eq!(none.render_queue, 0);
        assert_eq!(none.transparency, 0);
    }

    #[test]
    fn test_grouping_splits_by_queue_and_accumulates_users() {
        let a = material("a.mat");
        let b = material("b.mat");
        let mut c = material("c.mat");
        c.render_queue = 2450;
        let lib = library(vec![a, b, c]);

        let mut scene = Scene::new();
        let root = scene.add_node("root", None, None);
        let s1 = surface(&mut scene, root, &["a.mat", "c.mat"]);
        let s2 = surface(&mut scene, root, &["a.mat", "b.mat"]);

        let groups = group_materials(&scene, Some(root), &lib, &GroupingConfig::default(), 4);
        assert_eq!(groups.len(), 2);

        let main = &groups[0];
        assert_eq!(main.key.render_queue, 2000);
        assert_eq!(main.material_count(), 2);
        assert_eq!(main.materials[0].material, MaterialId::new("a.mat"));
        assert_eq!(
            main.materials[0].users,
            vec![
                SurfaceSlot { surface: s1, slot: 0 },
                SurfaceSlot { surface: s2, slot: 0 }
            ]
        );
        assert_eq!(main.page_count, 1);
        assert_eq!(main.rows.len(), 2);
        assert!(main.plan.enabled);
        assert_eq!(main.plan.output_name, "Lit_Atlas");

        let cutout = &groups[1];
        assert_eq!(cutout.material_count(), 1);
        assert!(!cutout.plan.enabled);
        assert!(!cutout.is_merge_eligible());
    }

    #[test]
    fn test_missing_material_and_shader_are_skipped() {
        let mut orphan = material("orphan.mat");
        orphan.shader = ShaderId::new("gone");
        let lib = library(vec![material("a.mat"), orphan]);

        let mut scene = Scene::new();
        let root = scene.add_node("root", None, None);
        surface(&mut scene, root, &["a.mat", "missing.mat", "orphan.mat"]);

        let groups = group_materials(&scene, None, &lib, &GroupingConfig::default(), 4);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].material_count(), 1);
    }

    #[test]
    fn test_page_count_and_page_materials() {
        assert_eq!(page_count(0, 4), 0);
        assert_eq!(page_count(4, 4), 1);
        assert_eq!(page_count(5, 4), 2);

        let names: Vec<String> = (0..5).map(|i| format!("m{i}.mat")).collect();
        let lib = library(names.iter().map(|n| material(n)).collect());
        let mut scene = Scene::new();
        let root = scene.add_node("root", None, None);
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        surface(&mut scene, root, &refs);

        let groups = group_materials(&scene, None, &lib, &GroupingConfig::default(), 4);
        let group = &groups[0];
        assert_eq!(group.page_count, 2);
        assert_eq!(group.page_materials(0).len(), 4);
        assert_eq!(group.page_materials(1).len(), 1);
        assert_eq!(group.page_materials(1)[0].material, MaterialId::new("m4.mat"));
        assert!(group.page_materials(2).is_empty());
    }

    #[test]
    fn test_folder_stem() {
        let lib = library(vec![material("a.mat")]);
        let mut scene = Scene::new();
        let root = scene.add_node("root", None, None);
        surface(&mut scene, root, &["a.mat"]);
        let groups = group_materials(&scene, None, &lib, &GroupingConfig::default(), 4);
        assert_eq!(
            groups[0].folder_stem(),
            "Custom/Lit_RQ2000_KW0000000000000000_T0"
        );
    }
}
