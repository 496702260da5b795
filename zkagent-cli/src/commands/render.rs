//! `zkagent render`: one sync + render pass, or a dry-run diff.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use zkagent_daemon::{render_once_blocking, RenderOnce};
use zkagent_sync::{FileDiff, JobOutcome, WriteResult};

use super::ConfigArg;

/// Arguments for `zkagent render`.
#[derive(Args, Debug)]
pub struct RenderArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Print unified diffs instead of writing targets.
    #[arg(long)]
    pub dry_run: bool,
}

impl RenderArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.load()?;
        let result = render_once_blocking(&config, self.dry_run).context("render failed")?;
        match result {
            RenderOnce::Diffs(diffs) => print_diffs(&diffs),
            RenderOnce::Rendered(outcomes) => print_outcomes(&outcomes),
        }
    }
}

fn print_diffs(diffs: &[FileDiff]) -> Result<()> {
    if diffs.is_empty() {
        println!("[dry-run] ✓ every target is up to date");
        return Ok(());
    }
    for diff in diffs {
        print!("{}", diff.unified_diff);
        if !diff.unified_diff.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}

fn print_outcomes(outcomes: &[JobOutcome]) -> Result<()> {
    let mut failed = 0;
    for outcome in outcomes {
        match &outcome.result {
            Ok(WriteResult::Written { path }) => println!("  ✎  {}", path.display()),
            Ok(WriteResult::WouldWrite { path }) => println!("  ~  {}", path.display()),
            Ok(WriteResult::Unchanged { path }) => println!("  ·  {}", path.display()),
            Err(err) => {
                failed += 1;
                eprintln!("  {}  {}: {err}", "✗".red(), outcome.job.target.display());
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} render jobs failed", outcomes.len());
    }
    println!("✓ rendered {} targets", outcomes.len());
    Ok(())
}
