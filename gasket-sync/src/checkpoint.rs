//! Version-control checkpoint collaborator.
//!
//! After a round that changed something, the executor hands a
//! [`CheckpointSummary`] to a [`Checkpoint`]. [`GitCheckpoint`] records it as
//! a commit in the working copy's repository.

use std::path::PathBuf;
use std::process::Output;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use gasket_core::{ProjectId, SyncDirection};

/// What a round changed, for the checkpoint message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointSummary {
    pub project_id: ProjectId,
    pub direction: SyncDirection,
    /// Filenames written or removed locally.
    pub pulled: Vec<String>,
    /// Filenames written or removed remotely.
    pub pushed: Vec<String>,
}

impl CheckpointSummary {
    pub fn message(&self) -> String {
        let mut message = format!(
            "gasket {} {}: {} pulled, {} pushed",
            self.direction,
            self.project_id,
            self.pulled.len(),
            self.pushed.len()
        );
        if !self.pulled.is_empty() || !self.pushed.is_empty() {
            message.push('\n');
        }
        for name in &self.pulled {
            message.push_str(&format!("\n< {name}"));
        }
        for name in &self.pushed {
            message.push_str(&format!("\n> {name}"));
        }
        message
    }
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` failed (status {status}): {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },
}

#[async_trait]
pub trait Checkpoint: Send + Sync {
    async fn record(&self, summary: &CheckpointSummary) -> Result<(), CheckpointError>;
}

/// Commits the whole working tree of `repo` with `git`.
///
/// A clean tree is not an error; nothing is committed.
#[derive(Debug, Clone)]
pub struct GitCheckpoint {
    repo: PathBuf,
}

impl GitCheckpoint {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self { repo: repo.into() }
    }

    async fn git(&self, args: &[&str]) -> Result<Output, CheckpointError> {
        let command = format!("git {}", args.join(" "));
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo)
            .output()
            .await
            .map_err(|source| CheckpointError::Spawn {
                command: command.clone(),
                source,
            })?;
        if output.status.success() {
            return Ok(output);
        }
        Err(CheckpointError::Command {
            command,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[async_trait]
impl Checkpoint for GitCheckpoint {
    async fn record(&self, summary: &CheckpointSummary) -> Result<(), CheckpointError> {
        let status = self.git(&["status", "--porcelain"]).await?;
        if status.stdout.iter().all(u8::is_ascii_whitespace) {
            tracing::debug!("checkpoint: nothing to commit in {}", self.repo.display());
            return Ok(());
        }
        self.git(&["add", "-A"]).await?;
        let message = summary.message();
        self.git(&["commit", "--quiet", "-m", &message]).await?;
        tracing::info!("checkpoint committed in {}", self.repo.display());
        Ok(())
    }
}
