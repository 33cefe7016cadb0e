//! Contract between the transport and the instance driver.
//!
//! Once every channel is established the session hands the driver a
//! `MigrateArgs` borrowing the session's channels. The driver reaches each
//! channel through one accessor per role and can force-close them through
//! [`MigrateArgs::disconnect`]; the session closes whatever is left when the
//! driver returns.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{DriverError, Result};
use crate::migration::channel::{BoxedStream, ChannelRole, ChannelSet, ChannelsMut};
use crate::migration::control::ControlMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceType {
    Container,
    VirtualMachine,
}

/// Opaque handle to the operation tracking a migration, forwarded to the
/// driver untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle {
    id: Uuid,
    description: String,
}

impl OperationHandle {
    pub fn new<S: Into<String>>(description: S) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

#[async_trait]
pub trait Instance: Send + Sync {
    fn project(&self) -> &str;

    fn name(&self) -> &str;

    fn instance_type(&self) -> InstanceType;

    fn is_running(&self) -> bool;

    async fn migrate_send(
        &mut self,
        args: MigrateSendArgs<'_>,
    ) -> std::result::Result<(), DriverError>;

    async fn migrate_receive(
        &mut self,
        args: MigrateReceiveArgs<'_>,
    ) -> std::result::Result<(), DriverError>;
}

pub struct MigrateArgs<'a> {
    channels: &'a mut ChannelSet,
    /// Transfer snapshots along with the instance.
    pub snapshots: bool,
    pub live: bool,
    pub cluster_move_source_name: Option<String>,
}

impl<'a> MigrateArgs<'a> {
    pub(crate) fn new(
        channels: &'a mut ChannelSet,
        snapshots: bool,
        live: bool,
        cluster_move_source_name: Option<String>,
    ) -> Self {
        Self {
            channels,
            snapshots,
            live,
            cluster_move_source_name,
        }
    }

    pub async fn control_send(&mut self, message: &ControlMessage) -> Result<()> {
        self.channels.send_control(message).await
    }

    pub async fn control_receive(&mut self) -> Result<ControlMessage> {
        self.channels.recv_control().await
    }

    pub fn filesystem_conn(&mut self) -> Option<&mut BoxedStream> {
        self.channels.filesystem()
    }

    pub fn state_conn(&mut self) -> Option<&mut BoxedStream> {
        self.channels.state()
    }

    pub fn has_channel(&self, role: ChannelRole) -> bool {
        self.channels.is_bound(role)
    }

    pub fn channels_mut(&mut self) -> ChannelsMut<'_> {
        self.channels.split_mut()
    }

    /// Force-closes every bound channel. Safe to call more than once.
    pub async fn disconnect(&mut self) {
        self.channels.disconnect().await;
    }
}

pub struct MigrateSendArgs<'a> {
    pub migrate: MigrateArgs<'a>,
    /// Tolerate partially unreadable snapshot data instead of aborting.
    pub allow_inconsistent: bool,
    pub operation: Option<OperationHandle>,
}

pub struct MigrateReceiveArgs<'a> {
    pub migrate: MigrateArgs<'a>,
    pub instance_operation: Option<OperationHandle>,
    /// Incrementally update an existing instance rather than create it.
    pub refresh: bool,
}
