//! `gasket init <path> --project-id <id> [--script-extension js|gs]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use gasket_core::{
    config::{self, ScriptExtension},
    ProjectId,
};

/// Link a working copy to a remote project.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Working copy root directory.
    pub path: PathBuf,

    /// Identifier of the remote script project.
    #[arg(long, short = 'p')]
    pub project_id: String,

    /// Extension for server script files: js | gs.
    #[arg(long, default_value = "js")]
    pub script_extension: ScriptExtension,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let path = self
            .path
            .canonicalize()
            .with_context(|| format!("cannot resolve path '{}'", self.path.display()))?;

        let project_id = ProjectId::from(self.project_id);
        let config = config::init_at(&path, project_id.clone(), self.script_extension)
            .with_context(|| format!("failed to init '{}'", path.display()))?;

        if config.project_id != project_id {
            println!(
                "! '{}' is already linked to project '{}'",
                path.display(),
                config.project_id
            );
            return Ok(());
        }
        println!("✓ Linked '{}' to project '{}'", path.display(), config.project_id);
        println!("  Saved to: {}", config::config_path_at(&path).display());
        Ok(())
    }
}
