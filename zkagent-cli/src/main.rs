//! zkagent: mirror coordination-store subtrees into rendered config files.
//!
//! # Usage
//!
//! ```text
//! zkagent run [--config config.json] [--json]
//! zkagent check [--config config.json]
//! zkagent render [--config config.json] [--dry-run]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{check::CheckArgs, render::RenderArgs, run::RunArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "zkagent",
    version,
    about = "Render config files from a watched ZooKeeper subtree",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Mirror, render, and keep re-rendering on every store change.
    Run(RunArgs),

    /// Validate a config file without connecting.
    Check(CheckArgs),

    /// Sync and render once, without watching.
    Render(RenderArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => args.run(),
        Commands::Check(args) => args.run(),
        Commands::Render(args) => args.run(),
    }
}
