//! CLI Commands

pub mod init;
pub mod inspect;
pub mod policy;
pub mod simulate;

pub use init::InitCommand;
pub use inspect::InspectCommand;
pub use policy::PolicyCommand;
pub use simulate::SimulateCommand;

use conduit::ConduitCore;
use shared::{ConduitConfig, TracingLogger};
use std::path::Path;
use std::sync::Arc;

/// Load a config file and bootstrap a core from it
pub(crate) fn load_core(path: &Path) -> anyhow::Result<(ConduitConfig, ConduitCore)> {
    let config = ConduitConfig::from_file(path)?;
    let core = ConduitCore::bootstrap(&config, Arc::new(TracingLogger))?;
    tracing::debug!(config = %path.display(), "core bootstrapped");
    Ok((config, core))
}
