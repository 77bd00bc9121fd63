//! # Errors
//!
//! Typed failures for every launcher operation. The binary wraps these in
//! `anyhow` at its outer surface.

use std::path::PathBuf;

/// Result alias used across `launch_core`
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("a binary target name is required")]
    MissingBinary,

    #[error("unknown severity '{0}' (expected trace, debug, info, warn, error or off)")]
    UnknownSeverity(String),

    #[error("invalid log filter '{filter}': {message}")]
    InvalidFilter { filter: String, message: String },

    #[error("failed to read config {path:?}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path:?}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("invalid pipeline: {0}")]
    Pipeline(String),

    #[error("'{0}' matches no job or stage")]
    UnknownSelection(String),

    #[error("failed to parse manifest {path:?}: {message}")]
    ManifestParse { path: PathBuf, message: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to exec {program}: {source}")]
    Exec {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
