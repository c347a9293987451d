//! Remote file store collaborator.
//!
//! The engine talks to the hosted project only through [`RemoteFileStore`].
//! Authentication, transport and retries live behind the trait; the engine
//! only distinguishes fatal failures (which end the round) from per-file
//! rejections (which are recorded and skipped).
//!
//! Raw payloads are validated by [`parse_file_records`] before anything
//! reaches the diff engine.

mod directory;
mod memory;

pub use self::directory::{DirectoryConnector, DirectoryRemoteStore};
pub use self::memory::{MemoryConnector, MemoryRemoteStore};

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gasket_core::{FileRecord, FileType, ProjectId};

/// Failures reported by a remote store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Credentials were missing, expired or rejected.
    #[error("remote rejected credentials: {0}")]
    Unauthorized(String),

    /// The store could not be reached or answered garbage at the transport level.
    #[error("remote transport failure: {0}")]
    Transport(String),

    #[error("remote project {0} not found")]
    ProjectNotFound(ProjectId),

    /// The store answered with a payload that does not match the record shape.
    #[error("invalid remote payload: {0}")]
    InvalidPayload(String),

    /// The store refused a single file operation.
    #[error("remote rejected '{filename}': {reason}")]
    Rejected { filename: String, reason: String },
}

impl RemoteError {
    /// `true` when the whole round must stop.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RemoteError::Rejected { .. })
    }
}

/// CRUD surface of a hosted script project.
#[async_trait]
pub trait RemoteFileStore: Send + Sync {
    /// All files of `project`.
    async fn list(&self, project: &ProjectId) -> Result<Vec<FileRecord>, RemoteError>;

    /// Create or replace one file.
    async fn write(
        &self,
        project: &ProjectId,
        filename: &str,
        content: &str,
        file_type: FileType,
    ) -> Result<(), RemoteError>;

    /// Remove one file.
    async fn delete(&self, project: &ProjectId, filename: &str) -> Result<(), RemoteError>;
}

/// Builds a [`RemoteFileStore`] for a set of credentials.
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    async fn connect(&self, access_token: &str) -> Result<Arc<dyn RemoteFileStore>, RemoteError>;
}

/// Wire shape of a project content listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProjectContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_id: Option<String>,
    pub files: Vec<FileRecord>,
}

/// Parse and validate a raw project content payload.
///
/// Rejects unknown fields and file types (via serde), empty names and
/// duplicate names.
pub fn parse_file_records(json: &str) -> Result<Vec<FileRecord>, RemoteError> {
    let content: ProjectContent =
        serde_json::from_str(json).map_err(|e| RemoteError::InvalidPayload(e.to_string()))?;
    validate_records(&content.files)?;
    Ok(content.files)
}

/// Check invariants serde cannot express.
pub fn validate_records(records: &[FileRecord]) -> Result<(), RemoteError> {
    let mut seen = HashSet::new();
    for record in records {
        if record.name.trim().is_empty() {
            return Err(RemoteError::InvalidPayload(
                "file record with empty name".to_string(),
            ));
        }
        if !seen.insert(record.name.as_str()) {
            return Err(RemoteError::InvalidPayload(format!(
                "duplicate file record '{}'",
                record.name
            )));
        }
    }
    Ok(())
}
