//! `gasket sync`: run one round against the remote project.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use gasket_core::SyncDirection;
use gasket_sync::{
    checkpoint::GitCheckpoint, remote::DirectoryConnector, SyncEngine, SyncReport, SyncRequest,
};

use super::{block_on, load_project, RemoteArgs};

/// Arguments for `gasket sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Working copy root (defaults to the current directory).
    #[arg(default_value = ".")]
    pub path: PathBuf,

    #[command(flatten)]
    pub remote: RemoteArgs,

    /// pull | push | pull-only | push-only | bidirectional
    #[arg(long, short = 'd', default_value = "pull")]
    pub direction: SyncDirection,

    /// Show what would change without writing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Allow deletes for pull-only, push-only and bidirectional rounds.
    #[arg(long)]
    pub reconcile: bool,

    /// Commit the working copy with git after a round that changed files.
    #[arg(long)]
    pub checkpoint: bool,

    /// Emit the round report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let (local, config) = load_project(&self.path)?;
        tracing::debug!("{} round for {} at {}", self.direction, config.project_id, local.display());

        let mut engine = SyncEngine::new(Arc::new(DirectoryConnector::new(&self.remote.remote)));
        if self.checkpoint {
            engine = engine.with_checkpoint(Arc::new(GitCheckpoint::new(&local)));
        }
        let request = SyncRequest::from_config(&local, &config, self.direction)
            .dry_run(self.dry_run)
            .reconcile(self.reconcile)
            .access_token(self.remote.token.clone());

        let report = block_on(engine.sync(request))?
            .with_context(|| format!("sync failed for project '{}'", config.project_id))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize report")?
            );
        } else {
            print_report(&report);
        }

        if !report.success {
            bail!(
                "round incomplete: {} failed, {} in conflict",
                report.failed.len(),
                report.conflicts.len()
            );
        }
        Ok(())
    }
}

fn print_report(report: &SyncReport) {
    let mark = if report.success {
        "✓".green()
    } else {
        "✗".red()
    };
    println!(
        "{mark} {} {}: {}",
        report.direction, report.project_id, report.summary
    );

    let verb = if report.dry_run { "~" } else { "✎" };
    for name in &report.pulled {
        println!("  {verb} {} {name}", "↓".cyan());
    }
    for name in &report.pushed {
        println!("  {verb} {} {name}", "↑".cyan());
    }
    for failed in &report.failed {
        println!(
            "  {} {} {} ({}): {}",
            "✗".red(),
            failed.action,
            failed.filename,
            failed.side.as_str(),
            failed.reason
        );
    }
    for conflict in &report.conflicts {
        println!(
            "  {} {} changed on both sides (local {}, remote {})",
            "!".yellow().bold(),
            conflict.filename,
            conflict.local_hash.short(),
            conflict.remote_hash.short()
        );
    }
    if let Some(analysis) = &report.content_analysis {
        for file in analysis {
            for warning in &file.warnings {
                println!("  {} {}: {warning}", "warning".yellow(), file.filename);
            }
            for hint in &file.hints {
                println!("  {} {}: {hint}", "hint".bright_black(), file.filename);
            }
        }
    }
    if let Some(err) = &report.checkpoint_error {
        println!("  {} checkpoint failed: {err}", "!".yellow());
    }
}
