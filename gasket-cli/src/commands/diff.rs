//! `gasket diff`: unified diffs of what a sync round would change.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use gasket_core::SyncDirection;
use gasket_sync::{remote::DirectoryConnector, SyncEngine, SyncRequest};

use super::{block_on, load_project, RemoteArgs};

/// Arguments for `gasket diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Working copy root (defaults to the current directory).
    #[arg(default_value = ".")]
    pub path: PathBuf,

    #[command(flatten)]
    pub remote: RemoteArgs,

    /// Direction of the round to preview.
    #[arg(long, short = 'd', default_value = "pull")]
    pub direction: SyncDirection,

    /// Preview with deletes enabled for non-deleting directions.
    #[arg(long)]
    pub reconcile: bool,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let (local, config) = load_project(&self.path)?;
        let engine = SyncEngine::new(Arc::new(DirectoryConnector::new(&self.remote.remote)));
        let request = SyncRequest::from_config(&local, &config, self.direction)
            .reconcile(self.reconcile)
            .access_token(self.remote.token.clone());

        let preview = block_on(engine.preview(&request))?
            .with_context(|| format!("diff failed for project '{}'", config.project_id))?;

        for diff in preview.unified_diffs() {
            print!("{}", diff.unified_diff);
            if !diff.unified_diff.ends_with('\n') {
                println!();
            }
        }
        for conflict in &preview.plan.conflicts {
            println!("! {} changed on both sides", conflict.filename);
        }
        println!("{}", preview.plan.summary());
        Ok(())
    }
}
