pub mod check;
pub mod render;
pub mod run;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use zkagent_core::AgentConfig;

/// `--config` shared by every subcommand.
#[derive(Args, Debug)]
pub struct ConfigArg {
    /// Path to the agent config (JSON, or YAML for `.yaml`/`.yml`).
    #[arg(long, short, default_value = "config.json")]
    pub config: PathBuf,
}

impl ConfigArg {
    pub fn load(&self) -> Result<AgentConfig> {
        AgentConfig::load(&self.config)
            .with_context(|| format!("invalid config '{}'", self.config.display()))
    }
}
