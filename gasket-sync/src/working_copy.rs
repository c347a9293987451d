//! Local side of a sync: snapshotting and atomic writes under a source root.
//!
//! ## `write` protocol
//!
//! 1. Ensure the parent directory exists.
//! 2. Write to `<path>.gasket.tmp`.
//! 3. Rename to the final path (atomic on POSIX).
//! 4. On rename failure, remove the tmp file and leave the original intact.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use gasket_core::{config::CONTROL_DIR, FileSnapshot};

use crate::error::{io_err, SyncError};
use crate::naming::FilenameMapper;

const TMP_SUFFIX: &str = ".gasket.tmp";

/// Directories never descended into while snapshotting.
const SKIPPED_DIRS: &[&str] = &[CONTROL_DIR, "node_modules"];

/// The local working copy's source root.
#[derive(Debug, Clone)]
pub struct WorkingCopy {
    root: PathBuf,
}

impl WorkingCopy {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Snapshot every file under the root that `mapper` recognises.
    ///
    /// Hidden entries and the control directory are skipped. A missing root
    /// is an empty snapshot. Results are sorted by filename.
    pub async fn snapshot(&self, mapper: &dyn FilenameMapper) -> Result<Vec<FileSnapshot>, SyncError> {
        let mut found: BTreeMap<String, FileSnapshot> = BTreeMap::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound && dir == self.root => {
                    return Ok(Vec::new());
                }
                Err(err) => return Err(io_err(&dir, err)),
            };

            while let Some(entry) = entries.next_entry().await.map_err(|e| io_err(&dir, e))? {
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().into_owned();
                let file_type = entry.file_type().await.map_err(|e| io_err(&path, e))?;

                if file_type.is_dir() {
                    if !name.starts_with('.') && !SKIPPED_DIRS.contains(&name.as_str()) {
                        pending.push(path);
                    }
                    continue;
                }
                if !file_type.is_file() || name.starts_with('.') || name.ends_with(TMP_SUFFIX) {
                    continue;
                }

                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let Some((filename, kind)) = mapper.logical_name(relative) else {
                    tracing::debug!("ignoring unmapped file {}", relative.display());
                    continue;
                };

                let bytes = tokio::fs::read(&path).await.map_err(|e| io_err(&path, e))?;
                let content =
                    String::from_utf8(bytes).map_err(|_| SyncError::InvalidUtf8 { path: path.clone() })?;
                let metadata = entry.metadata().await.map_err(|e| io_err(&path, e))?;
                let last_modified = metadata
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now());

                if found.contains_key(&filename) {
                    return Err(SyncError::DuplicateFilename {
                        filename,
                        side: "local",
                    });
                }
                found.insert(
                    filename.clone(),
                    FileSnapshot::new(filename, kind, content, last_modified),
                );
            }
        }

        Ok(found.into_values().collect())
    }

    /// Atomically write `content` to `relative` under the root.
    pub async fn write(&self, relative: &Path, content: &str) -> Result<(), SyncError> {
        let path = self.root.join(relative);
        let tmp = PathBuf::from(format!("{}{TMP_SUFFIX}", path.display()));
        write_with_tmp(&path, content, &tmp).await
    }

    /// `true` if a regular file exists at `relative` under the root.
    pub async fn contains(&self, relative: &Path) -> bool {
        tokio::fs::metadata(self.root.join(relative))
            .await
            .is_ok_and(|m| m.is_file())
    }

    /// Remove `relative`, pruning parent directories left empty.
    ///
    /// Removing a file that is already gone is not an error.
    pub async fn remove(&self, relative: &Path) -> Result<(), SyncError> {
        let path = self.root.join(relative);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!("already removed: {}", path.display());
            }
            Err(err) => return Err(io_err(&path, err)),
        }

        let mut dir = path.parent();
        while let Some(current) = dir {
            if current == self.root || !current.starts_with(&self.root) {
                break;
            }
            // Fails on non-empty directories, which ends the walk.
            if tokio::fs::remove_dir(current).await.is_err() {
                break;
            }
            dir = current.parent();
        }
        Ok(())
    }
}

async fn write_with_tmp(path: &Path, content: &str, tmp: &Path) -> Result<(), SyncError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_err(parent, e))?;
    }
    if let Some(tmp_parent) = tmp.parent() {
        tokio::fs::create_dir_all(tmp_parent)
            .await
            .map_err(|e| io_err(tmp_parent, e))?;
    }
    tokio::fs::write(tmp, content)
        .await
        .map_err(|e| io_err(tmp, e))?;

    if let Err(e) = tokio::fs::rename(tmp, path).await {
        let _ = tokio::fs::remove_file(tmp).await;
        return Err(io_err(path, e));
    }
    tracing::debug!("wrote: {}", path.display());
    Ok(())
}
