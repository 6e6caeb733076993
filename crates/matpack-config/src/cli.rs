//! Command-line overrides for the builder configuration.

use std::path::PathBuf;

use clap::Args;

use crate::{Config, DiffPolicy};

/// Configuration overrides accepted by every `matpack` subcommand.
///
/// CLI values override settings loaded from `matpack.ron`.
#[derive(Args, Debug, Default, Clone)]
pub struct CliArgs {
    /// Maximum atlas size in pixels.
    #[arg(long, global = true)]
    pub atlas_size: Option<u32>,

    /// Maximum tiles per atlas row/column.
    #[arg(long, global = true)]
    pub grid: Option<u32>,

    /// Bleed padding per tile in pixels.
    #[arg(long, global = true)]
    pub padding: Option<u32>,

    /// Output folder, relative to the project root.
    #[arg(long, global = true)]
    pub output: Option<String>,

    /// Unresolved-difference policy.
    #[arg(long, value_enum, global = true)]
    pub policy: Option<DiffPolicy>,

    /// Sample material path for the use-sample-material policy.
    #[arg(long, global = true)]
    pub sample: Option<String>,

    /// Apply the build to the scanned root itself instead of a clone.
    #[arg(long, global = true)]
    pub no_clone: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(size) = args.atlas_size {
            self.atlas.atlas_size = size;
        }
        if let Some(grid) = args.grid {
            self.atlas.grid = grid;
        }
        if let Some(padding) = args.padding {
            self.atlas.padding = padding;
        }
        if let Some(ref output) = args.output {
            self.build.output_dir = output.clone();
        }
        if let Some(policy) = args.policy {
            self.build.diff_policy = policy;
        }
        if let Some(ref sample) = args.sample {
            self.build.sample_material = Some(sample.clone());
        }
        if args.no_clone {
            self.build.clone_on_apply = false;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
