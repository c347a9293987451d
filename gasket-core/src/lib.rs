//! gasket core library: domain types, content hashing, project config.
//!
//! - [`types`]: snapshots, manifest records, diff results
//! - [`hash`]: git blob-format [`ContentHash`]
//! - [`config`]: `.gasket/project.yaml` load / save / init
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod hash;
pub mod types;

pub use config::ProjectConfig;
pub use error::ConfigError;
pub use hash::ContentHash;
pub use types::{
    DiffAction, DiffOperation, FileRecord, FileSnapshot, FileSyncEntry, FileType, ProjectId,
    SyncDiffResult, SyncDirection, SyncManifest, MANIFEST_VERSION,
};
