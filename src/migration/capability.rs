use std::path::PathBuf;

use crate::config::MigrationConfig;
use crate::errors::{MigrationError, Result};
use crate::migration::driver::InstanceType;
use crate::migration::log_context::Side;

/// Detects whether live (stateful) container migration can run on this host.
pub trait CapabilityProbe: Send + Sync {
    /// Name of the checkpoint/restore tool being probed for.
    fn tool(&self) -> &str;

    fn live_migration_available(&self) -> bool;
}

/// Looks up the checkpoint/restore executable on `PATH`.
#[derive(Debug, Clone)]
pub struct CommandProbe {
    tool: String,
}

impl CommandProbe {
    pub fn new<S: Into<String>>(tool: S) -> Self {
        Self { tool: tool.into() }
    }

    pub fn from_config(config: &MigrationConfig) -> Self {
        Self::new(config.live_migration_tool())
    }

    pub fn locate(&self) -> Option<PathBuf> {
        which::which(&self.tool).ok()
    }
}

impl CapabilityProbe for CommandProbe {
    fn tool(&self) -> &str {
        &self.tool
    }

    fn live_migration_available(&self) -> bool {
        self.locate().is_some()
    }
}

/// A probe with a predetermined answer.
#[derive(Debug, Clone)]
pub struct FixedProbe {
    available: bool,
}

impl FixedProbe {
    pub fn available() -> Self {
        Self { available: true }
    }

    pub fn unavailable() -> Self {
        Self { available: false }
    }
}

impl CapabilityProbe for FixedProbe {
    fn tool(&self) -> &str {
        crate::config::DEFAULT_LIVE_MIGRATION_TOOL
    }

    fn live_migration_available(&self) -> bool {
        self.available
    }
}

/// Live migration of a container needs the checkpoint/restore tool locally.
/// VMs and stateless transfers never consult the probe.
pub(crate) fn require_live_capability(
    side: Side,
    instance_type: InstanceType,
    live: bool,
    probe: &dyn CapabilityProbe,
) -> Result<()> {
    if !live || instance_type != InstanceType::Container || probe.live_migration_available() {
        return Ok(());
    }

    let tool = probe.tool().to_string();
    Err(match side {
        Side::Source => MigrationError::NoLiveMigrationSource { tool },
        Side::Target => MigrationError::NoLiveMigrationTarget { tool },
    })
}
