use std::time::Duration;
use thiserror::Error;

use crate::migration::channel::ChannelRole;
use crate::migration::state_machine::MigrationState;

/// Error returned by an instance driver from `migrate_send` / `migrate_receive`.
pub type DriverError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, MigrationError>;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Unable to perform container live migration, {tool} isn't installed on the source server")]
    NoLiveMigrationSource { tool: String },

    #[error("Unable to perform container live migration, {tool} isn't installed on the target server")]
    NoLiveMigrationTarget { tool: String },

    #[error("Failed creating migration secret for {role} channel: {source}")]
    SecretGeneration {
        role: ChannelRole,
        #[source]
        source: rand::Error,
    },

    #[error("Missing migration sink secret for {0} channel")]
    MissingSecret(ChannelRole),

    #[error("Secret does not match any migration channel")]
    UnknownSecret,

    #[error("Migration {0} channel is already connected")]
    AlreadyConnected(ChannelRole),

    #[error("Migration {0} channel is not used by this session")]
    UnexpectedChannel(ChannelRole),

    #[error("Migration channel barrier was cancelled")]
    BarrierCancelled,

    #[error("Timed out waiting for migration connections after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Failed connecting migration {role} channel: {source}")]
    Dial {
        role: ChannelRole,
        #[source]
        source: std::io::Error,
    },

    #[error("Migration {0} channel is not connected")]
    ChannelNotConnected(ChannelRole),

    #[error("Migration control channel closed by peer")]
    ControlClosed,

    #[error("Failed encoding control message: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("Failed decoding control message: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed migration on source: {0}")]
    SourceTransfer(#[source] DriverError),

    #[error("Failed migration on target: {0}")]
    TargetTransfer(#[source] DriverError),

    #[error("Invalid migration state transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: MigrationState,
        to: MigrationState,
    },
}

impl MigrationError {
    /// True for the two construction-time capability errors.
    pub fn is_capability_missing(&self) -> bool {
        matches!(
            self,
            MigrationError::NoLiveMigrationSource { .. }
                | MigrationError::NoLiveMigrationTarget { .. }
        )
    }
}
