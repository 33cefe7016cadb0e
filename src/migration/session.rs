use tracing::debug;

use crate::errors::Result;
use crate::migration::auth::ChannelSecrets;
use crate::migration::driver::{Instance, InstanceType};
use crate::migration::log_context::{LogContext, Side};
use crate::migration::state_machine::MigrationStateMachine;

/// State common to both ends of a migration.
pub(crate) struct MigrationFields {
    pub(crate) instance: Box<dyn Instance>,
    pub(crate) instance_only: bool,
    pub(crate) live: bool,
    pub(crate) secrets: ChannelSecrets,
    pub(crate) cluster_move_source_name: Option<String>,
}

impl MigrationFields {
    /// The dedicated state channel exists only for live container migrations;
    /// VM live state travels however the driver arranges it.
    pub(crate) fn uses_state_channel(&self) -> bool {
        self.live && self.instance.instance_type() == InstanceType::Container
    }

    pub(crate) fn log_context(&self, side: Side, push: Option<bool>) -> LogContext {
        LogContext {
            side,
            project: self.instance.project().to_string(),
            instance: self.instance.name().to_string(),
            live: self.live,
            push,
            cluster_move_source_name: self.cluster_move_source_name.clone(),
        }
    }
}

/// Records the terminal state for `result` and hands `result` back. A failed
/// transition is only logged so it never replaces the migration's own error.
pub(crate) async fn conclude(state: &MigrationStateMachine, result: Result<()>) -> Result<()> {
    let transition = match &result {
        Ok(()) => state.succeed().await,
        Err(err) => state.fail(err.to_string()).await,
    };

    if let Err(err) = transition {
        debug!(session = %state.session_id(), err = %err, "Failed recording migration outcome");
    }
    result
}
