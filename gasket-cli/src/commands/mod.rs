//! Subcommand implementations.

pub mod diff;
pub mod init;
pub mod status;
pub mod sync;

use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use gasket_core::{config, ProjectConfig};

/// Where the remote project lives and how to authenticate.
#[derive(Args, Debug, Clone)]
pub struct RemoteArgs {
    /// Directory holding remote project documents (`<project_id>.json`).
    #[arg(long, env = "GASKET_REMOTE", value_name = "DIR")]
    pub remote: PathBuf,

    /// Access token presented to the remote.
    #[arg(long, env = "GASKET_TOKEN", default_value = "local", hide_env_values = true)]
    pub token: String,
}

/// Resolve `path` and load its `.gasket/project.yaml`.
pub(crate) fn load_project(path: &Path) -> Result<(PathBuf, ProjectConfig)> {
    let local = path
        .canonicalize()
        .with_context(|| format!("cannot resolve path '{}'", path.display()))?;
    let config = config::load_at(&local).with_context(|| {
        format!(
            "no gasket project at '{}'; run `gasket init` first",
            local.display()
        )
    })?;
    Ok((local, config))
}

/// Run `future` to completion on a fresh multi-threaded runtime.
pub(crate) fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    Ok(runtime.block_on(future))
}
