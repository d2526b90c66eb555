//! conduit inspect command

use super::load_core;
use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct InspectCommand {
    /// Deployment config (YAML or JSON)
    #[arg(short, long)]
    pub config: PathBuf,

    /// Also print the audit trail recorded during bootstrap
    #[arg(long)]
    pub events: bool,
}

impl InspectCommand {
    pub fn run(&self) -> anyhow::Result<()> {
        let (_, core) = load_core(&self.config)?;

        let mut output = serde_json::json!({
            "snapshot": core.snapshot()?,
            "settings": core.bridge().settings()?,
            "audit": core.audit_stats(),
        });
        if self.events {
            output["events"] = core.events().export_json();
        }

        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }
}
