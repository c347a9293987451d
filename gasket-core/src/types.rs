//! Domain types shared by the manifest store, diff engine and executor.
//!
//! Filenames are *logical* remote names (`"utils"`, `"lib/strings"`,
//! `"appsscript"`), never local paths. Mapping to disk is the job of a
//! filename mapper in `gasket-sync`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hash::ContentHash;

/// Schema tag written into every manifest.
pub const MANIFEST_VERSION: &str = "2.1";

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed remote script project identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectId(pub String);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ProjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProjectId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Kind of a file inside a script project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileType {
    /// Server-side script source.
    ServerJs,
    Html,
    /// Project manifest and other JSON documents.
    Json,
}

impl FileType {
    pub fn all() -> &'static [FileType] {
        &[FileType::ServerJs, FileType::Html, FileType::Json]
    }

    /// `true` for files the content analyzer should inspect.
    pub fn is_script(self) -> bool {
        matches!(self, FileType::ServerJs)
    }

    /// Wire name, as used by the remote API.
    pub fn as_str(self) -> &'static str {
        match self {
            FileType::ServerJs => "SERVER_JS",
            FileType::Html => "HTML",
            FileType::Json => "JSON",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a sync round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncDirection {
    /// Remote → local, deleting tracked local files removed upstream.
    Pull,
    /// Local → remote, deleting tracked remote files removed locally.
    Push,
    /// Remote → local without deletions (unless reconciling).
    PullOnly,
    /// Local → remote without deletions (unless reconciling).
    PushOnly,
    /// Three-way merge of both sides against the manifest baseline.
    Bidirectional,
}

impl SyncDirection {
    pub fn all() -> &'static [SyncDirection] {
        &[
            SyncDirection::Pull,
            SyncDirection::Push,
            SyncDirection::PullOnly,
            SyncDirection::PushOnly,
            SyncDirection::Bidirectional,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SyncDirection::Pull => "pull",
            SyncDirection::Push => "push",
            SyncDirection::PullOnly => "pull-only",
            SyncDirection::PushOnly => "push-only",
            SyncDirection::Bidirectional => "bidirectional",
        }
    }

    /// Whether the base deletion gate is open without `reconcile`.
    pub fn deletes_by_default(self) -> bool {
        matches!(self, SyncDirection::Pull | SyncDirection::Push)
    }
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_ascii_lowercase();
        SyncDirection::all()
            .iter()
            .copied()
            .find(|d| d.as_str() == lowered)
            .ok_or_else(|| {
                format!(
                    "unknown sync direction '{s}'; expected: pull, push, pull-only, push-only, bidirectional"
                )
            })
    }
}

// ---------------------------------------------------------------------------
// Snapshots and remote records
// ---------------------------------------------------------------------------

/// One file as seen on one side of a sync, at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    pub filename: String,
    pub file_type: FileType,
    pub content: String,
    pub content_hash: ContentHash,
    pub last_modified: DateTime<Utc>,
    /// Content length in bytes.
    pub size: u64,
}

impl FileSnapshot {
    /// Build a snapshot, hashing `content`.
    pub fn new(
        filename: impl Into<String>,
        file_type: FileType,
        content: impl Into<String>,
        last_modified: DateTime<Utc>,
    ) -> Self {
        let content = content.into();
        Self {
            filename: filename.into(),
            file_type,
            content_hash: ContentHash::of(&content),
            size: content.len() as u64,
            content,
            last_modified,
        }
    }
}

/// A validated file record returned by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub source: String,
    pub update_time: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// State of one filename as of the last successful sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSyncEntry {
    pub content_hash: ContentHash,
    pub last_modified: DateTime<Utc>,
    pub synced_at: DateTime<Utc>,
}

/// Last-synchronized state of every tracked file in a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncManifest {
    pub version: String,
    pub project_id: ProjectId,
    /// Time of the last round that completed without failures.
    pub last_sync_timestamp: Option<DateTime<Utc>>,
    pub last_sync_direction: Option<SyncDirection>,
    pub files: BTreeMap<String, FileSyncEntry>,
}

impl SyncManifest {
    /// An empty manifest for `project_id` at the current schema version.
    pub fn new(project_id: ProjectId) -> Self {
        Self {
            version: MANIFEST_VERSION.to_string(),
            project_id,
            last_sync_timestamp: None,
            last_sync_direction: None,
            files: BTreeMap::new(),
        }
    }

    /// `true` if `filename` was synchronized by an earlier round.
    pub fn is_tracked(&self, filename: &str) -> bool {
        self.files.contains_key(filename)
    }

    pub fn baseline_hash(&self, filename: &str) -> Option<&ContentHash> {
        self.files.get(filename).map(|e| &e.content_hash)
    }
}

// ---------------------------------------------------------------------------
// Diff results
// ---------------------------------------------------------------------------

/// What a diff operation does to the destination side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffAction {
    Add,
    Update,
    Delete,
}

impl fmt::Display for DiffAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DiffAction::Add => "add",
            DiffAction::Update => "update",
            DiffAction::Delete => "delete",
        })
    }
}

/// A single planned change for one filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffOperation {
    pub filename: String,
    pub action: DiffAction,
    pub file_type: FileType,
    /// Source content for add/update; `None` for delete.
    pub content: Option<String>,
    /// Hash of `content` (add/update) or of the deleted destination copy.
    pub content_hash: ContentHash,
    /// Source-side modification time (add/update) or destination time (delete).
    pub last_modified: DateTime<Utc>,
}

/// The complete change set between a source and a destination snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncDiffResult {
    pub add: Vec<DiffOperation>,
    pub update: Vec<DiffOperation>,
    pub delete: Vec<DiffOperation>,
    pub total_operations: usize,
    pub has_changes: bool,
    pub has_destructive_changes: bool,
}

impl SyncDiffResult {
    /// Assemble a result, deriving the counters from the operation lists.
    pub fn from_operations(
        add: Vec<DiffOperation>,
        update: Vec<DiffOperation>,
        delete: Vec<DiffOperation>,
    ) -> Self {
        let total_operations = add.len() + update.len() + delete.len();
        Self {
            has_changes: total_operations > 0,
            has_destructive_changes: !delete.is_empty(),
            total_operations,
            add,
            update,
            delete,
        }
    }

    /// All operations in apply order: adds, updates, then deletes.
    pub fn operations(&self) -> impl Iterator<Item = &DiffOperation> {
        self.add.iter().chain(self.update.iter()).chain(self.delete.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.total_operations == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_parses_case_insensitively() {
        assert_eq!("Pull-Only".parse::<SyncDirection>(), Ok(SyncDirection::PullOnly));
        assert_eq!(
            "bidirectional".parse::<SyncDirection>(),
            Ok(SyncDirection::Bidirectional)
        );
        assert!("sideways".parse::<SyncDirection>().is_err());
    }

    #[test]
    fn only_plain_pull_and_push_delete_by_default() {
        let deleting: Vec<_> = SyncDirection::all()
            .iter()
            .filter(|d| d.deletes_by_default())
            .collect();
        assert_eq!(deleting, vec![&SyncDirection::Pull, &SyncDirection::Push]);
    }

    #[test]
    fn snapshot_size_counts_bytes() {
        let snap = FileSnapshot::new("greet", FileType::ServerJs, "héllo", Utc::now());
        assert_eq!(snap.size, 6);
        assert_eq!(snap.content_hash, ContentHash::of("héllo"));
    }

    #[test]
    fn diff_result_counters_follow_operations() {
        let op = DiffOperation {
            filename: "a".into(),
            action: DiffAction::Delete,
            file_type: FileType::Html,
            content: None,
            content_hash: ContentHash::of(""),
            last_modified: Utc::now(),
        };
        let result = SyncDiffResult::from_operations(vec![], vec![], vec![op]);
        assert_eq!(result.total_operations, 1);
        assert!(result.has_changes);
        assert!(result.has_destructive_changes);
        assert!(SyncDiffResult::from_operations(vec![], vec![], vec![]).is_empty());
    }
}
