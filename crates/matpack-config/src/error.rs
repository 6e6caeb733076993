//! Configuration error types.

use std::path::PathBuf;

/// Errors raised while loading or saving `matpack.ron`. File errors name the
/// file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file or its directory could not be read or written.
    #[error("config i/o error at {}: {source}", path.display())]
    Io {
        /// Config file or directory.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid RON for [`crate::Config`].
    #[error("invalid config at {}: {source}", path.display())]
    Parse {
        /// Config file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: ron::error::SpannedError,
    },

    /// The config could not be serialized.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] ron::Error),
}
