//! Configuration for the material atlas builder.
//!
//! Settings persist to disk as RON (`matpack.ron`), tolerate missing and unknown
//! fields, and can be overridden from the command line via clap.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    AtlasConfig, BuildConfig, CONFIG_FILE, Config, DebugConfig, DiffPolicy, GroupingConfig,
    default_config_dir,
};
pub use error::ConfigError;
