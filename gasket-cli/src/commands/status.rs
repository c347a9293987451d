//! `gasket status`: the working copy against the last synchronized state.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use gasket_sync::status::{self, format_datetime_age, LocalState, StatusReport};

use super::{block_on, load_project};

/// Arguments for `gasket status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Working copy root (defaults to the current directory).
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let (local, config) = load_project(&self.path)?;
        let report = block_on(status::check(&local, &config))?
            .with_context(|| format!("status check failed for '{}'", local.display()))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
            return Ok(());
        }
        print_table(&report);
        Ok(())
    }
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "file")]
    file: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "last sync")]
    last_sync: String,
}

fn print_table(report: &StatusReport) {
    let last_sync = match (report.last_sync_timestamp, report.last_sync_direction) {
        (Some(at), Some(direction)) => format!("{} ago ({direction})", format_datetime_age(at)),
        (Some(at), None) => format!("{} ago", format_datetime_age(at)),
        _ => "never".to_string(),
    };
    println!(
        "gasket v{} | project {} | last sync {} | {} modified | {} untracked | {} missing",
        env!("CARGO_PKG_VERSION"),
        report.project_id,
        last_sync,
        report.count(LocalState::Modified),
        report.count(LocalState::Untracked),
        report.count(LocalState::Missing),
    );

    if report.files.is_empty() {
        println!("No files.");
        return;
    }

    let rows: Vec<StatusTableRow> = report
        .files
        .iter()
        .map(|f| StatusTableRow {
            file: f.filename.clone(),
            status: f.state.as_str().to_uppercase(),
            last_sync: f
                .synced_at
                .map(format_datetime_age)
                .unwrap_or_else(|| "never".to_string()),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    if report.never_synced || report.files.iter().any(|f| f.state != LocalState::Clean) {
        println!("Run 'gasket sync' to reconcile the working copy.");
    }
}
