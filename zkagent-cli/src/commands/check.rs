//! `zkagent check`: validate a config and list its render jobs.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use super::ConfigArg;

/// Arguments for `zkagent check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub config: ConfigArg,
}

#[derive(Tabled)]
struct JobRow {
    #[tabled(rename = "template")]
    template: String,
    #[tabled(rename = "target")]
    target: String,
    #[tabled(rename = "template found")]
    found: String,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.load()?;

        println!("{} {}", "✓".green().bold(), self.config.config.display());
        println!("  servers      {}", config.connect_string());
        println!("  data paths   {}", config.data_paths.join(", "));
        println!(
            "  command      {}",
            config.shell_command.as_deref().unwrap_or("-")
        );
        println!(
            "  timeouts     session {}ms, debounce {}ms",
            config.session_timeout.as_millis(),
            config.debounce.as_millis()
        );

        if config.jobs.is_empty() {
            println!("No render jobs configured.");
            return Ok(());
        }

        let rows: Vec<JobRow> = config
            .jobs
            .iter()
            .map(|job| JobRow {
                template: job.template.display().to_string(),
                target: job.target.display().to_string(),
                found: if job.template.is_file() {
                    "yes".green().to_string()
                } else {
                    "no".red().to_string()
                },
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}
