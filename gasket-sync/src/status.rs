//! Local status: how the working copy compares to the manifest baseline.
//!
//! No remote call is made. Per tracked or present file, in precedence order:
//! 1. `Missing` (tracked, gone from the working copy)
//! 2. `Untracked` (present, never synchronized)
//! 3. `Modified` (present, hash differs from the baseline)
//! 4. `Clean`

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use gasket_core::{FileSnapshot, ProjectConfig, ProjectId, SyncDirection, SyncManifest};

use crate::manifest::ManifestStore;
use crate::naming::ExtensionMapper;
use crate::working_copy::WorkingCopy;
use crate::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalState {
    Clean,
    Modified,
    Missing,
    Untracked,
}

impl LocalState {
    pub fn as_str(self) -> &'static str {
        match self {
            LocalState::Clean => "clean",
            LocalState::Modified => "modified",
            LocalState::Missing => "missing",
            LocalState::Untracked => "untracked",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStatus {
    pub filename: String,
    pub state: LocalState,
    /// When the file was last synchronized; `None` if untracked.
    pub synced_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub project_id: ProjectId,
    /// `true` if no manifest exists yet.
    pub never_synced: bool,
    pub last_sync_timestamp: Option<DateTime<Utc>>,
    pub last_sync_direction: Option<SyncDirection>,
    pub files: Vec<FileStatus>,
}

impl StatusReport {
    pub fn count(&self, state: LocalState) -> usize {
        self.files.iter().filter(|f| f.state == state).count()
    }
}

/// Classify every file in `local` or `manifest`, sorted by filename.
pub fn local_status(local: &[FileSnapshot], manifest: Option<&SyncManifest>) -> Vec<FileStatus> {
    let mut files: BTreeMap<&str, FileStatus> = BTreeMap::new();

    for snap in local {
        let entry = manifest.and_then(|m| m.files.get(&snap.filename));
        let state = match entry {
            None => LocalState::Untracked,
            Some(e) if e.content_hash != snap.content_hash => LocalState::Modified,
            Some(_) => LocalState::Clean,
        };
        files.insert(
            &snap.filename,
            FileStatus {
                filename: snap.filename.clone(),
                state,
                synced_at: entry.map(|e| e.synced_at),
            },
        );
    }

    if let Some(manifest) = manifest {
        for (name, entry) in &manifest.files {
            files.entry(name.as_str()).or_insert_with(|| FileStatus {
                filename: name.clone(),
                state: LocalState::Missing,
                synced_at: Some(entry.synced_at),
            });
        }
    }

    files.into_values().collect()
}

/// Status of the working copy at `local` described by `config`.
pub async fn check(local: &Path, config: &ProjectConfig) -> Result<StatusReport, SyncError> {
    let loaded = ManifestStore::at(local, config.project_id.clone()).load().await?;
    let mapper = ExtensionMapper::new(config.script_extension);
    let snapshot = WorkingCopy::new(config.source_root(local)).snapshot(&mapper).await?;
    let manifest = loaded.manifest.as_ref();

    Ok(StatusReport {
        project_id: config.project_id.clone(),
        never_synced: loaded.is_bootstrap,
        last_sync_timestamp: manifest.and_then(|m| m.last_sync_timestamp),
        last_sync_direction: manifest.and_then(|m| m.last_sync_direction),
        files: local_status(&snapshot, manifest),
    })
}

/// Compact age of a timestamp: `42s`, `5m`, `3h`, `2d`.
pub fn format_datetime_age(timestamp: DateTime<Utc>) -> String {
    let seconds = Utc::now()
        .signed_duration_since(timestamp)
        .num_seconds()
        .max(0) as u64;
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use gasket_core::{ContentHash, FileSyncEntry, FileType};
    use tempfile::TempDir;

    fn snap(name: &str, content: &str) -> FileSnapshot {
        FileSnapshot::new(name, FileType::ServerJs, content, Utc::now())
    }

    fn manifest(entries: &[(&str, &str)]) -> SyncManifest {
        let mut m = SyncManifest::new(ProjectId::from("p"));
        for (name, content) in entries {
            m.files.insert(
                name.to_string(),
                FileSyncEntry {
                    content_hash: ContentHash::of(content),
                    last_modified: Utc::now(),
                    synced_at: Utc::now(),
                },
            );
        }
        m
    }

    #[test]
    fn classifies_each_state() {
        let m = manifest(&[("clean", "c"), ("edited", "old"), ("gone", "g")]);
        let local = [snap("clean", "c"), snap("edited", "new"), snap("fresh", "f")];
        let states: Vec<_> = local_status(&local, Some(&m))
            .into_iter()
            .map(|f| (f.filename, f.state))
            .collect();
        assert_eq!(
            states,
            vec![
                ("clean".to_string(), LocalState::Clean),
                ("edited".to_string(), LocalState::Modified),
                ("fresh".to_string(), LocalState::Untracked),
                ("gone".to_string(), LocalState::Missing),
            ]
        );
    }

    #[test]
    fn without_manifest_everything_is_untracked() {
        let statuses = local_status(&[snap("a", "1")], None);
        assert_eq!(statuses[0].state, LocalState::Untracked);
        assert!(statuses[0].synced_at.is_none());
    }

    #[tokio::test]
    async fn check_reports_never_synced_working_copy() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("Code.js"), "x").unwrap();
        let config = ProjectConfig::new(ProjectId::from("p"));

        let report = check(tmp.path(), &config).await.unwrap();
        assert!(report.never_synced);
        assert_eq!(report.count(LocalState::Untracked), 1);
        assert!(report.last_sync_timestamp.is_none());
    }

    #[test]
    fn datetime_age_is_compact() {
        let now = Utc::now();
        assert_eq!(format_datetime_age(now), "0s");
        assert_eq!(format_datetime_age(now - Duration::minutes(5)), "5m");
        assert_eq!(format_datetime_age(now - Duration::hours(3)), "3h");
        assert_eq!(format_datetime_age(now - Duration::days(2)), "2d");
        assert_eq!(format_datetime_age(now + Duration::hours(1)), "0s");
    }
}
