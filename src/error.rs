use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid storage endpoint '{endpoint}': {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to start mount utility '{program}': {source}")]
    MountSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("migration of '{path}' failed verification: {reason}")]
    Migration { path: PathBuf, reason: String },
    #[error("{0} contains an interior NUL byte")]
    InvalidArgument(String),
    #[error("failed to exec '{program}': {source}")]
    Exec {
        program: String,
        #[source]
        source: nix::errno::Errno,
    },
}

impl BootstrapError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, BootstrapError>;
