//! Error types for gasket-sync.

use std::path::PathBuf;

use thiserror::Error;

use gasket_core::{ConfigError, ProjectId};

use crate::remote::RemoteError;

/// All errors that abort a sync round.
///
/// Per-file apply failures are *not* errors at this level; the executor
/// records them in its result and keeps going.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An error from the project config layer.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error (manifest save).
    #[error("manifest JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The manifest exists but cannot be parsed. Never treated as bootstrap.
    #[error("manifest at {path} is corrupt: {source}")]
    ManifestCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("manifest at {path} has unsupported schema version {version}")]
    UnsupportedManifestVersion { path: PathBuf, version: String },

    /// The manifest on disk was written for another project.
    #[error("manifest at {path} belongs to project {found}, expected {expected}")]
    ManifestProjectMismatch {
        path: PathBuf,
        expected: ProjectId,
        found: ProjectId,
    },

    /// A fatal remote failure (credentials, transport, malformed listing).
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// A local file that maps to a script name is not valid UTF-8.
    #[error("{path} is not valid UTF-8; refusing to sync it")]
    InvalidUtf8 { path: PathBuf },

    /// The cross-process round lock could not be taken.
    #[error("cannot lock {path}: {reason}")]
    Lock { path: PathBuf, reason: String },

    /// Two files on one side map to the same logical filename.
    #[error("duplicate filename '{filename}' in {side} snapshot")]
    DuplicateFilename { filename: String, side: &'static str },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
