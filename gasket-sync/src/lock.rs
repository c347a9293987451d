//! Cross-process round lock.
//!
//! A round holds an exclusive advisory lock on `.gasket/round.lock` from
//! before the manifest is loaded until after it is saved, so two `gasket`
//! processes on the same working copy never interleave. The lock is released
//! when the [`RoundLock`] is dropped or the process exits.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use gasket_core::config;

use crate::error::{io_err, SyncError};

const LOCK_FILE: &str = "round.lock";

/// `<local>/.gasket/round.lock`
pub fn lock_path_at(local: &Path) -> PathBuf {
    config::control_dir_at(local).join(LOCK_FILE)
}

/// Exclusive lock on a working copy's round lock file.
#[derive(Debug)]
pub struct RoundLock {
    file: File,
    path: PathBuf,
}

impl RoundLock {
    /// Take the lock for the working copy at `local`, waiting for any other
    /// holder to finish.
    pub async fn acquire(local: &Path) -> Result<Self, SyncError> {
        let path = lock_path_at(local);
        let file = open(&path)?;
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(Self { file, path }),
            Err(err) if err.kind() == fs2::lock_contended_error().kind() => {
                tracing::info!("waiting for another round to release {}", path.display());
            }
            Err(err) => return Err(io_err(&path, err)),
        }

        let blocking_path = path.clone();
        tokio::task::spawn_blocking(move || {
            file.lock_exclusive()
                .map(|()| file)
                .map_err(|e| io_err(&blocking_path, e))
        })
        .await
        .map_err(|e| SyncError::Lock {
            path: path.clone(),
            reason: e.to_string(),
        })?
        .map(|file| Self { file, path })
    }

    /// Take the lock only if nobody holds it.
    pub fn try_acquire(local: &Path) -> Result<Option<Self>, SyncError> {
        let path = lock_path_at(local);
        let file = open(&path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { file, path })),
            Err(err) if err.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(err) => Err(io_err(&path, err)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RoundLock {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            tracing::warn!("failed to unlock {}: {err}", self.path.display());
        }
    }
}

fn open(path: &Path) -> Result<File, SyncError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| io_err(path, e))
}
