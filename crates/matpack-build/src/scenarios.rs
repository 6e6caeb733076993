//! End-to-end builds over an in-memory project.

use image::{Rgba, RgbaImage};
use matpack_config::{Config, DiffPolicy};
use matpack_materials::{MergeError, merge_groups};
use matpack_scene::{
    AssetStore, Material, MaterialId, Mesh, MeshId, NodeId, Project, PropertyValue, Renderer,
    Shader, ShaderId, ShaderProperty, SubMesh, Texture, TextureId, TextureImport, TextureSlot,
};

use crate::{BuildError, BuildSettings, Builder, ValidationError, rollback};

const RED: [u8; 4] = [255, 0, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];

fn lit() -> Shader {
    Shader {
        id: ShaderId::new("lit-guid"),
        name: "Custom/Lit".to_string(),
        properties: vec![
            ShaderProperty::texture("_MainTex"),
            ShaderProperty::color("_Color", [1.0; 4]),
        ],
    }
}

fn texture(path: &str, rgba: [u8; 4]) -> Texture {
    Texture {
        id: TextureId::new(path),
        name: path.trim_end_matches(".png").to_string(),
        image: RgbaImage::from_pixel(8, 8, Rgba(rgba)),
        import: TextureImport::default(),
    }
}

fn material(path: &str, texture: Option<&str>, color: [f32; 4]) -> Material {
    let mut m = Material::new(
        MaterialId::new(path),
        path.trim_end_matches(".mat"),
        ShaderId::new("lit-guid"),
    );
    if let Some(t) = texture {
        m.set_value(
            "_MainTex",
            PropertyValue::Texture(TextureSlot::bound(TextureId::new(t))),
        );
    }
    m.set_value("_Color", PropertyValue::Color(color));
    m
}

fn quad() -> Mesh {
    let mut mesh = Mesh::new(MeshId::new("quad.mesh"), "Quad");
    mesh.positions = vec![
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [1.0, 1.0, 0.0],
    ];
    mesh.uvs[0] = vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
    mesh.submeshes = vec![SubMesh::triangles(vec![0, 1, 2, 2, 1, 3])];
    mesh
}

struct Fixture {
    project: Project,
    root: NodeId,
    surfaces: Vec<NodeId>,
}

/// One surface per material under a single root.
fn fixture(materials: Vec<Material>) -> Fixture {
    let mut project = Project::in_memory();
    project.library.add_shader(lit());
    project.library.add_texture(texture("red.png", RED));
    project.library.add_texture(texture("blue.png", BLUE));
    project.library.add_mesh(quad());

    let root = project.scene.add_node("Props", None, None);
    let mut surfaces = Vec::new();
    for m in materials {
        let renderer = Renderer {
            mesh: Some(MeshId::new("quad.mesh")),
            materials: vec![Some(m.id.clone())],
        };
        surfaces.push(project.scene.add_node(m.name.clone(), Some(root), Some(renderer)));
        project.library.add_material(m);
    }
    Fixture {
        project,
        root,
        surfaces,
    }
}

fn config() -> Config {
    let mut config = Config::default();
    config.atlas.atlas_size = 64;
    config.atlas.grid = 2;
    config.atlas.padding = 2;
    config.build.output_dir = "Out".to_string();
    config
}

fn renderer(project: &Project, node: NodeId) -> Renderer {
    project
        .scene
        .node(node)
        .and_then(|n| n.renderer.clone())
        .unwrap()
}

fn created_under_output(project: &Project) -> usize {
    let materials = project
        .library
        .materials()
        .filter(|m| m.id.as_str().starts_with("Out/"))
        .count();
    let textures = project
        .library
        .textures()
        .filter(|t| t.id.as_str().starts_with("Out/"))
        .count();
    let meshes = project
        .library
        .meshes()
        .filter(|m| m.id.as_str().starts_with("Out/"))
        .count();
    materials + textures + meshes
}

/// u or v range covered by a remapped mesh's UV0.
fn uv_range(mesh: &Mesh, axis: usize) -> (f32, f32) {
    mesh.uvs[0].iter().fold((f32::MAX, f32::MIN), |(lo, hi), uv| {
        (lo.min(uv[axis]), hi.max(uv[axis]))
    })
}

#[test]
fn test_scenario_a_distinct_textures_share_one_page() {
    let mut fx = fixture(vec![
        material("a.mat", Some("red.png"), [1.0; 4]),
        material("b.mat", Some("blue.png"), [1.0; 4]),
    ]);
    let builder = Builder::new(BuildSettings::from_config(&config(), Some(fx.root)));
    let groups = builder.scan(&fx.project.scene, &fx.project.library);
    assert_eq!(groups.len(), 1);
    assert!(groups[0].row("_MainTex").unwrap().plan.do_action);

    let report = builder
        .run(&mut fx.project.scene, &mut fx.project.library, &groups)
        .unwrap();
    assert_eq!((report.processed, report.skipped, report.failed), (1, 0, 0));
    assert_eq!(report.surfaces_updated, 2);
    assert_eq!(report.meshes_created, 2);

    // Originals are untouched; the clone carries the result.
    for &surface in &fx.surfaces {
        assert_eq!(renderer(&fx.project, surface).mesh, Some(MeshId::new("quad.mesh")));
    }
    let applied = report.applied_root.unwrap();
    assert_ne!(applied, fx.root);
    let clones = fx.project.scene.surfaces_under(Some(applied));
    assert_eq!(clones.len(), 2);

    let merged_id = renderer(&fx.project, clones[0]).materials[0].clone().unwrap();
    assert_eq!(
        renderer(&fx.project, clones[1]).materials[0],
        Some(merged_id.clone())
    );
    let store = &fx.project.library;
    let merged = store.material(&merged_id).unwrap();
    let shader = lit();
    let atlas_id = merged
        .texture_slot(&shader, "_MainTex")
        .and_then(|s| s.texture.clone())
        .unwrap();
    assert!(atlas_id.as_str().starts_with("Out/Custom_Lit_RQ"));

    let atlas = &store.texture(&atlas_id).unwrap().image;
    assert_eq!(atlas.dimensions(), (64, 64));
    let left = atlas.get_pixel(16, 48);
    let right = atlas.get_pixel(48, 48);
    assert!(left[0] > 250 && left[2] < 5, "tile 0 is red: {left:?}");
    assert!(right[2] > 250 && right[0] < 5, "tile 1 is blue: {right:?}");

    let mesh_a = store.mesh(renderer(&fx.project, clones[0]).mesh.as_ref().unwrap()).unwrap();
    let mesh_b = store.mesh(renderer(&fx.project, clones[1]).mesh.as_ref().unwrap()).unwrap();
    let (a_lo, a_hi) = uv_range(mesh_a, 0);
    let (b_lo, b_hi) = uv_range(mesh_b, 0);
    assert!(a_hi < b_lo || b_hi < a_lo, "tiles overlap: {a_lo}..{a_hi} vs {b_lo}..{b_hi}");
    assert!((a_lo - 2.0 / 64.0).abs() < 1e-6);
    assert!((a_hi - 30.0 / 64.0).abs() < 1e-6);
}

#[test]
fn test_scenario_b_unresolved_color_is_skipped() {
    let mut fx = fixture(vec![
        material("a.mat", None, [1.0, 0.0, 0.0, 1.0]),
        material("b.mat", None, [0.0, 1.0, 0.0, 1.0]),
    ]);
    let builder = Builder::new(BuildSettings::from_config(&config(), Some(fx.root)));
    let groups = builder.scan(&fx.project.scene, &fx.project.library);
    let color = groups[0].row("_Color").unwrap();
    assert_eq!(color.distinct_count(), 2);
    assert!(!color.plan.do_action);
    let nodes_before = fx.project.scene.len();

    let report = builder
        .run(&mut fx.project.scene, &mut fx.project.library, &groups)
        .unwrap();
    assert_eq!((report.processed, report.skipped, report.failed), (0, 1, 0));
    assert_eq!(report.assets_created, 0);
    assert_eq!(created_under_output(&fx.project), 0);
    assert_eq!(fx.project.scene.len(), nodes_before);
    assert_eq!(report.applied_root, None);
}

#[test]
fn test_scenario_c_sample_material_supplies_unresolved_color() {
    let mut fx = fixture(vec![
        material("a.mat", None, [1.0, 0.0, 0.0, 1.0]),
        material("b.mat", None, [0.0, 1.0, 0.0, 1.0]),
    ]);
    let sample_color = [0.25, 0.5, 0.75, 1.0];
    fx.project
        .library
        .add_material(material("sample.mat", None, sample_color));

    let mut config = config();
    config.build.diff_policy = DiffPolicy::UseSampleMaterial;
    config.build.sample_material = Some("sample.mat".to_string());
    let builder = Builder::new(BuildSettings::from_config(&config, Some(fx.root)));
    let groups = builder.scan(&fx.project.scene, &fx.project.library);

    let report = builder
        .run(&mut fx.project.scene, &mut fx.project.library, &groups)
        .unwrap();
    assert_eq!(report.processed, 1);

    let clones = fx
        .project
        .scene
        .surfaces_under(report.applied_root);
    let merged_id = renderer(&fx.project, clones[0]).materials[0].clone().unwrap();
    let merged = fx.project.library.material(&merged_id).unwrap();
    assert_eq!(
        merged.value(&lit(), "_Color"),
        Some(&PropertyValue::Color(sample_color))
    );
}

#[test]
fn test_scenario_d_single_material_group_is_not_atlased() {
    let mut fx = fixture(vec![material("a.mat", Some("red.png"), [1.0; 4])]);
    let builder = Builder::new(BuildSettings::from_config(&config(), Some(fx.root)));
    let groups = builder.scan(&fx.project.scene, &fx.project.library);
    assert_eq!(groups.len(), 1);
    assert!(!groups[0].plan.enabled);
    assert!(!groups[0].is_merge_eligible());
    assert!(matches!(
        merge_groups(vec![groups[0].clone(), groups[0].clone()], &fx.project.library),
        Err(MergeError::NotEligible(_))
    ));

    // Forcing it on does not make it buildable.
    let mut forced = groups.clone();
    forced[0].plan.enabled = true;
    let report = builder
        .run(&mut fx.project.scene, &mut fx.project.library, &forced)
        .unwrap();
    assert_eq!((report.processed, report.skipped), (0, 1));
    assert_eq!(created_under_output(&fx.project), 0);
}

#[test]
fn test_rollback_restores_pre_build_bindings() {
    let mut fx = fixture(vec![
        material("a.mat", Some("red.png"), [1.0; 4]),
        material("b.mat", Some("blue.png"), [1.0; 4]),
        material("c.mat", Some("red.png"), [1.0; 4]),
    ]);
    let mut config = config();
    config.build.clone_on_apply = false;
    let builder = Builder::new(BuildSettings::from_config(&config, Some(fx.root)));
    let groups = builder.scan(&fx.project.scene, &fx.project.library);
    let before: Vec<Renderer> = fx
        .surfaces
        .iter()
        .map(|&s| renderer(&fx.project, s))
        .collect();

    let report = builder
        .run(&mut fx.project.scene, &mut fx.project.library, &groups)
        .unwrap();
    assert_eq!(report.applied_root, Some(fx.root));
    assert_eq!(report.surfaces_updated, 3);
    for (&s, b) in fx.surfaces.iter().zip(&before) {
        assert_ne!(&renderer(&fx.project, s), b);
    }

    let restored = rollback(
        &mut fx.project.scene,
        &fx.project.library,
        &report.log_path,
    )
    .unwrap();
    assert_eq!(restored.restored, 3);
    assert_eq!(restored.skipped, 0);
    for (&s, b) in fx.surfaces.iter().zip(&before) {
        assert_eq!(&renderer(&fx.project, s), b);
    }
}

#[test]
fn test_rollback_skips_deleted_surfaces() {
    let mut fx = fixture(vec![
        material("a.mat", Some("red.png"), [1.0; 4]),
        material("b.mat", Some("blue.png"), [1.0; 4]),
    ]);
    let mut config = config();
    config.build.clone_on_apply = false;
    let builder = Builder::new(BuildSettings::from_config(&config, Some(fx.root)));
    let groups = builder.scan(&fx.project.scene, &fx.project.library);
    let report = builder
        .run(&mut fx.project.scene, &mut fx.project.library, &groups)
        .unwrap();

    fx.project.scene.remove_subtree(fx.surfaces[1]);
    let restored = rollback(
        &mut fx.project.scene,
        &fx.project.library,
        &report.log_path,
    )
    .unwrap();
    assert_eq!((restored.restored, restored.skipped), (1, 1));
    assert_eq!(
        renderer(&fx.project, fx.surfaces[0]).materials,
        vec![Some(MaterialId::new("a.mat"))]
    );
}

#[test]
fn test_log_lists_every_created_asset() {
    let mut fx = fixture(vec![
        material("a.mat", Some("red.png"), [1.0; 4]),
        material("b.mat", Some("blue.png"), [1.0; 4]),
    ]);
    let builder = Builder::new(BuildSettings::from_config(&config(), Some(fx.root)));
    let groups = builder.scan(&fx.project.scene, &fx.project.library);
    let report = builder
        .run(&mut fx.project.scene, &mut fx.project.library, &groups)
        .unwrap();

    let log = crate::RollbackLog::load(&fx.project.library, &report.log_path).unwrap();
    assert_eq!(log.source_root_id, Some(fx.root));
    assert_eq!(log.applied_root_id, report.applied_root);
    assert_eq!(log.created_assets.len(), report.assets_created);
    // One atlas, one merged material, two remapped meshes.
    assert_eq!(report.assets_created, 4);
    assert_eq!(created_under_output(&fx.project), 4);
    for path in &log.created_assets {
        assert!(fx.project.library.exists(path), "{path} was not created");
    }
}

#[test]
fn test_multi_page_group_writes_page_folders() {
    let mut fx = fixture(vec![
        material("a.mat", Some("red.png"), [1.0; 4]),
        material("b.mat", Some("blue.png"), [1.0; 4]),
    ]);
    let mut config = config();
    config.atlas.grid = 1;
    let builder = Builder::new(BuildSettings::from_config(&config, Some(fx.root)));
    let groups = builder.scan(&fx.project.scene, &fx.project.library);
    assert_eq!(groups[0].page_count, 2);

    let report = builder
        .run(&mut fx.project.scene, &mut fx.project.library, &groups)
        .unwrap();
    assert_eq!(report.processed, 1);

    let clones = fx.project.scene.surfaces_under(report.applied_root);
    let first = renderer(&fx.project, clones[0]).materials[0].clone().unwrap();
    let second = renderer(&fx.project, clones[1]).materials[0].clone().unwrap();
    assert!(first.as_str().ends_with("/Page_01/Lit_Atlas_P01.mat"), "{first}");
    assert!(second.as_str().ends_with("/Page_02/Lit_Atlas_P02.mat"), "{second}");
}

#[test]
fn test_failing_group_does_not_stop_others() {
    let mut fx = fixture(vec![
        material("a.mat", Some("red.png"), [1.0; 4]),
        material("b.mat", Some("blue.png"), [1.0; 4]),
    ]);
    let builder = Builder::new(BuildSettings::from_config(&config(), Some(fx.root)));
    let groups = builder.scan(&fx.project.scene, &fx.project.library);
    let mut broken = groups[0].clone();
    broken.key.shader = ShaderId::new("deleted-shader");
    broken.plan.output_name = "Broken".to_string();
    let planned = vec![broken, groups[0].clone()];

    let report = builder
        .run(&mut fx.project.scene, &mut fx.project.library, &planned)
        .unwrap();
    assert_eq!((report.processed, report.failed), (1, 1));
    assert_eq!(report.surfaces_updated, 2);
}

#[test]
fn test_invalid_settings_write_nothing() {
    let mut fx = fixture(vec![
        material("a.mat", Some("red.png"), [1.0; 4]),
        material("b.mat", Some("blue.png"), [1.0; 4]),
    ]);
    let mut config = config();
    config.atlas.atlas_size = 16;
    let builder = Builder::new(BuildSettings::from_config(&config, Some(fx.root)));
    let groups = builder.scan(&fx.project.scene, &fx.project.library);

    let err = builder
        .run(&mut fx.project.scene, &mut fx.project.library, &groups)
        .unwrap_err();
    assert!(matches!(
        err,
        BuildError::Validation(ValidationError::AtlasTooSmall { size: 16, .. })
    ));
    assert_eq!(fx.project.library.documents().count(), 0);
    assert_eq!(created_under_output(&fx.project), 0);
}
