//! `matpack`: scan, build, and roll back material atlases for a project on disk.
//!
//! Configuration is loaded from `matpack.ron` and can be overridden via CLI flags.
//! Run `matpack --project <dir> scan` to list groups, `matpack --project <dir>
//! build --root Props` to build, and `matpack --project <dir> rollback
//! MatpackOutput/BuildLog.ron` to undo.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use matpack_build::{BuildError, BuildSettings, Builder, rollback};
use matpack_config::{CliArgs, Config, default_config_dir};
use matpack_materials::{GroupScan, PlanProfile, ProfileError, has_unresolved};
use matpack_scene::{AssetError, NodeId, Project, Scene};
use thiserror::Error;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "matpack", version, about = "Material atlas builder")]
struct Cli {
    /// Project directory containing `project.ron`.
    #[arg(long, global = true, default_value = ".")]
    project: PathBuf,

    #[command(flatten)]
    overrides: CliArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List material groups and their diff state.
    Scan {
        /// Name of the root object to scan (whole scene when omitted).
        #[arg(long)]
        root: Option<String>,
        /// Save the scanned plan as a profile at this project-relative path.
        #[arg(long)]
        save_profile: Option<String>,
    },
    /// Bake atlases and apply them to the scene.
    Build {
        /// Name of the root object to build.
        #[arg(long)]
        root: Option<String>,
        /// Plan profile to apply before building.
        #[arg(long)]
        profile: Option<String>,
    },
    /// Undo a build from its rollback log.
    Rollback {
        /// Project-relative path of the rollback log.
        log: String,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error("no object named '{0}' in the scene")]
    RootNotFound(String),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Resolve config directory
    let config_dir = cli
        .overrides
        .config
        .clone()
        .or_else(default_config_dir)
        .unwrap_or_else(|| cli.project.clone());

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&cli.overrides);

    let log_dir = config_dir.join("logs");
    matpack_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    match run(&cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, mut config: Config) -> Result<(), CliError> {
    let mut project = Project::load(&cli.project)?;
    match &cli.command {
        Command::Scan { root, save_profile } => {
            let root = resolve_root(&project.scene, root.as_deref())?;
            let builder = Builder::new(BuildSettings::from_config(&config, root));
            let groups = builder.scan(&project.scene, &project.library);
            print_groups(&groups);
            if let Some(path) = save_profile {
                PlanProfile::capture(&config, &groups, &project.library)
                    .save(&mut project.library, path)?;
                println!("profile saved to {path}");
            }
        }
        Command::Build { root, profile } => {
            let root = resolve_root(&project.scene, root.as_deref())?;
            let profile = profile
                .as_deref()
                .map(|path| PlanProfile::load(&project.library, path))
                .transpose()?;
            if let Some(profile) = &profile {
                profile.apply_settings(&mut config);
                config.apply_cli_overrides(&cli.overrides);
            }

            let builder = Builder::new(BuildSettings::from_config(&config, root));
            let mut groups = builder.scan(&project.scene, &project.library);
            if let Some(profile) = &profile {
                groups = profile.apply(groups, &project.library);
            }
            let report = builder.run(&mut project.scene, &mut project.library, &groups)?;
            save_manifest(&project, &cli.project)?;
            println!("{report}");
        }
        Command::Rollback { log } => {
            let report = rollback(&mut project.scene, &project.library, log)?;
            save_manifest(&project, &cli.project)?;
            println!(
                "restored {} surface(s), skipped {}",
                report.restored, report.skipped
            );
        }
    }
    Ok(())
}

/// Finds the first node named `name`, searching roots in order.
fn resolve_root(scene: &Scene, name: Option<&str>) -> Result<Option<NodeId>, CliError> {
    let Some(name) = name else {
        return Ok(None);
    };
    scene
        .roots()
        .flat_map(|r| scene.descendants(r.id))
        .find(|id| scene.node(*id).is_some_and(|n| n.name == name))
        .map(Some)
        .ok_or_else(|| CliError::RootNotFound(name.to_string()))
}

fn save_manifest(project: &Project, root: &Path) -> Result<(), CliError> {
    let path = project.save_manifest(root)?;
    info!("Wrote {}", path.display());
    Ok(())
}

fn print_groups(groups: &[GroupScan]) {
    if groups.is_empty() {
        println!("no material groups found");
        return;
    }
    for group in groups {
        let state = match (group.plan.enabled, has_unresolved(group)) {
            (false, _) => "disabled",
            (true, true) => "unresolved",
            (true, false) => "ready",
        };
        println!(
            "{:<48} {:>3} material(s) {:>2} page(s)  {state}",
            group.folder_stem(),
            group.material_count(),
            group.page_count
        );
        for row in &group.rows {
            if row.distinct_count() > 1 {
                println!(
                    "    {:<32} {:>3} distinct  action={} bake={}",
                    row.name,
                    row.distinct_count(),
                    row.plan.do_action,
                    row.plan.bake.label()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_build_with_overrides() {
        let cli = Cli::try_parse_from([
            "matpack",
            "--project",
            "demo",
            "build",
            "--root",
            "Props",
            "--grid",
            "8",
            "--no-clone",
        ])
        .unwrap();
        assert_eq!(cli.project, PathBuf::from("demo"));
        assert_eq!(cli.overrides.grid, Some(8));
        assert!(cli.overrides.no_clone);
        assert!(matches!(
            cli.command,
            Command::Build { root: Some(ref r), profile: None } if r == "Props"
        ));
    }

    #[test]
    fn test_resolve_root_by_name() {
        let mut scene = Scene::new();
        let world = scene.add_node("World", None, None);
        let props = scene.add_node("Props", Some(world), None);
        assert_eq!(resolve_root(&scene, Some("Props")).unwrap(), Some(props));
        assert_eq!(resolve_root(&scene, None).unwrap(), None);
        assert!(matches!(
            resolve_root(&scene, Some("Missing")),
            Err(CliError::RootNotFound(_))
        ));
    }

    #[test]
    fn test_run_scan_and_build_on_disk_project() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::in_memory();
        project.save_manifest(dir.path()).unwrap();

        let cli = Cli::try_parse_from([
            "matpack",
            "--project",
            dir.path().to_str().unwrap(),
            "build",
        ])
        .unwrap();
        let mut config = Config::default();
        config.build.clone_on_apply = false;
        run(&cli, config).unwrap();
        assert!(dir.path().join("MatpackOutput/BuildLog.ron").exists());
    }
}
