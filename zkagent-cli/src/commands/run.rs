//! `zkagent run`: start the agent and print every notification.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use zkagent_daemon::{start_blocking, AgentEvent};

use super::ConfigArg;

/// Arguments for `zkagent run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Print one JSON object per notification (logs switch to JSON too).
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.load()?;
        let json = self.json;
        start_blocking(config, json, |event| print_event(event, json))
            .context("agent stopped with an error")?;
        println!("zkagent shutdown.");
        Ok(())
    }
}

fn print_event(event: &AgentEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(err) => eprintln!("failed to encode event: {err}"),
        }
        return;
    }

    if event.dropped > 0 {
        eprintln!("  {}  {} earlier events dropped", "!".yellow(), event.dropped);
    }
    println!("{event}");
    let Some(report) = event.report.as_deref() else {
        return;
    };
    for path in &report.written {
        println!("  ✎  {}", path.display());
    }
    if let Some(command) = &report.command {
        let marker = if command.success {
            "✓".green()
        } else {
            "✗".red()
        };
        println!("  {marker}  {}", command.command);
        for line in command.output.lines() {
            println!("     {line}");
        }
    }
    for err in &report.errors {
        eprintln!("  {}  {err}", "✗".red());
    }
}
