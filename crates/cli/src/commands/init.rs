//! conduit init command

use clap::Args;
use console::style;
use std::path::PathBuf;

pub(crate) const CONFIG_FILE: &str = "conduit.yaml";

pub(crate) const EXAMPLE_CONFIG: &str = r#"# Conduit deployment config
rootAdmin: "0x1111111111111111111111111111111111111111"
# owner defaults to rootAdmin
auditCapacity: 10000

bridge:
  maxResourceLimit: 500000
  source: "return Functions.encodeString(JSON.stringify({ data: '0x00' }))"
  subscriptionId: 1
  donId: fun-local-1

grants:
  # STRATEGY_ADMIN administers EXECUTOR, so it is granted first
  STRATEGY_ADMIN:
    - "0x1111111111111111111111111111111111111111"
  PAUSER:
    - "0x2222222222222222222222222222222222222222"
  EXECUTOR:
    - "0x4444444444444444444444444444444444444444"

agents:
  - address: "0x3333333333333333333333333333333333333333"
    agentType: yield_optimizer
    permissions: [EXECUTE]
  - address: "0x5555555555555555555555555555555555555555"
    agentType: strategy_deployer
    permissions: [MANAGE]
"#;

#[derive(Debug, Args)]
pub struct InitCommand {
    /// Directory to initialize
    #[arg(default_value = ".")]
    pub directory: PathBuf,

    /// Overwrite an existing conduit.yaml
    #[arg(long)]
    pub force: bool,
}

impl InitCommand {
    pub fn run(&self) -> anyhow::Result<()> {
        let path = self.write_config()?;
        println!("{} Wrote {}", style("✓").green(), path.display());
        Ok(())
    }

    fn write_config(&self) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(&self.directory)?;

        let path = self.directory.join(CONFIG_FILE);
        if path.exists() && !self.force {
            anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
        }
        std::fs::write(&path, EXAMPLE_CONFIG)?;
        Ok(path)
    }
}
