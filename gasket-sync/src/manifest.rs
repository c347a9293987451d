//! Manifest store: the last-synchronized state of every tracked file.
//!
//! Persists a [`SyncManifest`] JSON document at
//! `<local>/.gasket/manifest.json`. Writes use the same atomic `.tmp` +
//! rename pattern as the project config.
//!
//! Only a *missing* file means bootstrap. A file that exists but cannot be
//! read or parsed is a hard error.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use gasket_core::{
    config, DiffAction, DiffOperation, FileSnapshot, FileSyncEntry, ProjectId, SyncDirection,
    SyncManifest, MANIFEST_VERSION,
};

use crate::error::{io_err, SyncError};

const MANIFEST_FILE: &str = "manifest.json";

/// Path to the manifest for the working copy at `local`.
///
/// `<local>/.gasket/manifest.json`
pub fn manifest_path_at(local: &Path) -> PathBuf {
    config::control_dir_at(local).join(MANIFEST_FILE)
}

/// Result of [`ManifestStore::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedManifest {
    /// `true` only when no manifest file exists.
    pub is_bootstrap: bool,
    pub manifest: Option<SyncManifest>,
}

/// Loads and saves the manifest of one project's working copy.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
    project_id: ProjectId,
}

impl ManifestStore {
    /// Store for the working copy rooted at `local`.
    pub fn at(local: &Path, project_id: ProjectId) -> Self {
        Self {
            path: manifest_path_at(local),
            project_id,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    /// Load the manifest.
    ///
    /// Returns `is_bootstrap = true` only if the file does not exist.
    pub async fn load(&self) -> Result<LoadedManifest, SyncError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!("no manifest at {}; bootstrap round", self.path.display());
                return Ok(LoadedManifest {
                    is_bootstrap: true,
                    manifest: None,
                });
            }
            Err(err) => return Err(io_err(&self.path, err)),
        };

        let manifest: SyncManifest =
            serde_json::from_str(&contents).map_err(|source| SyncError::ManifestCorrupt {
                path: self.path.clone(),
                source,
            })?;

        if !is_supported_version(&manifest.version) {
            return Err(SyncError::UnsupportedManifestVersion {
                path: self.path.clone(),
                version: manifest.version,
            });
        }
        if manifest.project_id != self.project_id {
            return Err(SyncError::ManifestProjectMismatch {
                path: self.path.clone(),
                expected: self.project_id.clone(),
                found: manifest.project_id,
            });
        }

        Ok(LoadedManifest {
            is_bootstrap: false,
            manifest: Some(manifest),
        })
    }

    /// Save the manifest atomically, creating the control directory.
    ///
    /// Writes to `manifest.json.tmp` then renames over `manifest.json`.
    pub async fn save(&self, manifest: &SyncManifest) -> Result<(), SyncError> {
        let Some(dir) = self.path.parent() else {
            return Err(io_err(
                &self.path,
                std::io::Error::other("invalid manifest path"),
            ));
        };
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| io_err(dir, e))?;

        let json = serde_json::to_string_pretty(manifest)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| io_err(&tmp, e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_err(&self.path, e));
        }
        tracing::debug!(
            "saved manifest ({} tracked files) to {}",
            manifest.files.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Major version 2 is readable; minor bumps only add fields.
fn is_supported_version(version: &str) -> bool {
    version.split('.').next() == Some("2")
}

// ---------------------------------------------------------------------------
// Baseline advancement
// ---------------------------------------------------------------------------

/// Everything a finished round contributes to the next baseline.
#[derive(Debug)]
pub struct BaselineUpdate<'a> {
    pub direction: SyncDirection,
    /// Every filename present on either side at snapshot time.
    pub present: &'a BTreeSet<String>,
    /// Files that were already identical on both sides.
    pub in_sync: &'a [FileSnapshot],
    /// Operations that were applied successfully.
    pub applied: Vec<&'a DiffOperation>,
    /// `true` when no operation failed.
    pub clean: bool,
    pub now: DateTime<Utc>,
}

/// Compute the manifest that describes the state after a round.
///
/// Failed and conflicting files keep their previous entry (or stay
/// untracked). Entries for files gone from both sides are dropped.
/// `last_sync_*` only move on a clean round.
pub fn advance(
    previous: Option<&SyncManifest>,
    project_id: &ProjectId,
    update: BaselineUpdate<'_>,
) -> SyncManifest {
    let mut next = previous
        .cloned()
        .unwrap_or_else(|| SyncManifest::new(project_id.clone()));
    next.version = MANIFEST_VERSION.to_string();
    next.files.retain(|name, _| update.present.contains(name));

    for snap in update.in_sync {
        let synced_at = match next.files.get(&snap.filename) {
            Some(entry) if entry.content_hash == snap.content_hash => entry.synced_at,
            _ => update.now,
        };
        next.files.insert(
            snap.filename.clone(),
            FileSyncEntry {
                content_hash: snap.content_hash.clone(),
                last_modified: snap.last_modified,
                synced_at,
            },
        );
    }

    for op in update.applied {
        match op.action {
            DiffAction::Add | DiffAction::Update => {
                next.files.insert(
                    op.filename.clone(),
                    FileSyncEntry {
                        content_hash: op.content_hash.clone(),
                        last_modified: op.last_modified,
                        synced_at: update.now,
                    },
                );
            }
            DiffAction::Delete => {
                next.files.remove(&op.filename);
            }
        }
    }

    if update.clean {
        next.last_sync_timestamp = Some(update.now);
        next.last_sync_direction = Some(update.direction);
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use gasket_core::{ContentHash, FileType};
    use tempfile::TempDir;

    fn project() -> ProjectId {
        ProjectId::from("proj-1")
    }

    fn entry(content: &str) -> FileSyncEntry {
        let at = Utc::now();
        FileSyncEntry {
            content_hash: ContentHash::of(content),
            last_modified: at,
            synced_at: at,
        }
    }

    fn op(name: &str, action: DiffAction, content: &str) -> DiffOperation {
        DiffOperation {
            filename: name.to_string(),
            action,
            file_type: FileType::ServerJs,
            content: (action != DiffAction::Delete).then(|| content.to_string()),
            content_hash: ContentHash::of(content),
            last_modified: Utc::now(),
        }
    }

    #[tokio::test]
    async fn missing_manifest_is_bootstrap() {
        let tmp = TempDir::new().unwrap();
        let loaded = ManifestStore::at(tmp.path(), project()).load().await.unwrap();
        assert!(loaded.is_bootstrap);
        assert!(loaded.manifest.is_none());
    }

    #[tokio::test]
    async fn roundtrip_save_load() {
        let tmp = TempDir::new().unwrap();
        let store = ManifestStore::at(tmp.path(), project());
        let mut manifest = SyncManifest::new(project());
        manifest.files.insert("utils".to_string(), entry("v1"));
        manifest.files.insert("lib/strings".to_string(), entry("v2"));

        store.save(&manifest).await.unwrap();
        let loaded = store.load().await.unwrap();
        assert!(!loaded.is_bootstrap);
        assert_eq!(loaded.manifest, Some(manifest));
    }

    #[tokio::test]
    async fn tmp_file_cleaned_up_after_save() {
        let tmp = TempDir::new().unwrap();
        let store = ManifestStore::at(tmp.path(), project());
        store.save(&SyncManifest::new(project())).await.unwrap();
        assert!(
            !store.path().with_extension("json.tmp").exists(),
            "tmp file should be removed after atomic rename"
        );
    }

    #[tokio::test]
    async fn corrupt_manifest_is_an_error_not_bootstrap() {
        let tmp = TempDir::new().unwrap();
        let store = ManifestStore::at(tmp.path(), project());
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{\"version\": \"2.1\", \"files\": ").unwrap();

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, SyncError::ManifestCorrupt { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn unreadable_manifest_path_is_an_io_error_not_bootstrap() {
        let tmp = TempDir::new().unwrap();
        let store = ManifestStore::at(tmp.path(), project());
        std::fs::create_dir_all(store.path()).unwrap();

        let err = store.load().await.unwrap_err();
        match err {
            SyncError::Io { path, .. } => assert_eq!(path, store.path()),
            other => panic!("expected an I/O error, got: {other}"),
        }
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn permission_denied_manifest_is_an_io_error() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let store = ManifestStore::at(tmp.path(), project());
        store.save(&SyncManifest::new(project())).await.unwrap();
        std::fs::set_permissions(store.path(), std::fs::Permissions::from_mode(0o000)).unwrap();

        let result = store.load().await;
        std::fs::set_permissions(store.path(), std::fs::Permissions::from_mode(0o644)).unwrap();

        // Root ignores file modes; only assert when the read was refused.
        if let Err(err) = result {
            assert!(matches!(err, SyncError::Io { .. }), "got: {err}");
        }
    }

    #[tokio::test]
    async fn empty_manifest_file_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let store = ManifestStore::at(tmp.path(), project());
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "").unwrap();

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, SyncError::ManifestCorrupt { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn other_major_version_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = ManifestStore::at(tmp.path(), project());
        let mut manifest = SyncManifest::new(project());
        manifest.version = "3.0".to_string();
        store.save(&manifest).await.unwrap();

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, SyncError::UnsupportedManifestVersion { .. }));
    }

    #[tokio::test]
    async fn manifest_for_another_project_is_rejected() {
        let tmp = TempDir::new().unwrap();
        ManifestStore::at(tmp.path(), ProjectId::from("other"))
            .save(&SyncManifest::new(ProjectId::from("other")))
            .await
            .unwrap();

        let err = ManifestStore::at(tmp.path(), project()).load().await.unwrap_err();
        assert!(matches!(err, SyncError::ManifestProjectMismatch { .. }));
    }

    #[test]
    fn advance_applies_successes_and_keeps_failed_entries() {
        let mut previous = SyncManifest::new(project());
        previous.files.insert("kept".to_string(), entry("old"));
        previous.files.insert("gone".to_string(), entry("x"));
        previous.files.insert("failed".to_string(), entry("before"));

        let present: BTreeSet<String> = ["kept", "gone", "failed", "new"]
            .into_iter()
            .map(String::from)
            .collect();
        let ops = [
            op("kept", DiffAction::Update, "newer"),
            op("gone", DiffAction::Delete, "x"),
            op("new", DiffAction::Add, "fresh"),
        ];
        let next = advance(
            Some(&previous),
            &project(),
            BaselineUpdate {
                direction: SyncDirection::Pull,
                present: &present,
                in_sync: &[],
                applied: ops.iter().collect(),
                clean: false,
                now: Utc::now(),
            },
        );

        assert_eq!(next.baseline_hash("kept"), Some(&ContentHash::of("newer")));
        assert_eq!(next.baseline_hash("new"), Some(&ContentHash::of("fresh")));
        assert!(!next.is_tracked("gone"));
        assert_eq!(next.baseline_hash("failed"), Some(&ContentHash::of("before")));
        assert!(next.last_sync_timestamp.is_none(), "unclean round must not advance");
    }

    #[test]
    fn advance_tracks_in_sync_files_and_drops_vanished_entries() {
        let mut previous = SyncManifest::new(project());
        let original = entry("same");
        previous.files.insert("same".to_string(), original.clone());
        previous.files.insert("vanished".to_string(), entry("y"));

        let snap = FileSnapshot::new("same", FileType::Html, "same", Utc::now());
        let also = FileSnapshot::new("also", FileType::Html, "also", Utc::now());
        let present: BTreeSet<String> = ["same", "also"].into_iter().map(String::from).collect();
        let now = Utc::now();
        let next = advance(
            Some(&previous),
            &project(),
            BaselineUpdate {
                direction: SyncDirection::Push,
                present: &present,
                in_sync: &[snap, also],
                applied: vec![],
                clean: true,
                now,
            },
        );

        assert_eq!(next.files["same"].synced_at, original.synced_at);
        assert_eq!(next.files["also"].synced_at, now);
        assert!(!next.is_tracked("vanished"));
        assert_eq!(next.last_sync_direction, Some(SyncDirection::Push));
    }
}
