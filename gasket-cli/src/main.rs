//! gasket: sync a local working copy with a hosted script project.
//!
//! # Usage
//!
//! ```text
//! gasket init <path> --project-id <id> [--script-extension js|gs]
//! gasket sync [<path>] --remote <dir> [--direction <dir>] [--dry-run] [--reconcile] [--checkpoint] [--json]
//! gasket diff [<path>] --remote <dir> [--direction <dir>]
//! gasket status [<path>] [--json]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{diff::DiffArgs, init::InitArgs, status::StatusArgs, sync::SyncArgs};

#[derive(Parser, Debug)]
#[command(
    name = "gasket",
    version,
    about = "Bidirectional sync between a local working copy and a hosted script project",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Link a working copy to a remote project.
    Init(InitArgs),

    /// Run one sync round.
    Sync(SyncArgs),

    /// Show unified diffs of what a sync round would change.
    Diff(DiffArgs),

    /// Compare the working copy with the last synchronized state.
    Status(StatusArgs),
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Status(args) => args.run(),
    }
}

/// Log to stderr; `GASKET_LOG` overrides the default `warn` filter.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_env("GASKET_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
