//! Instance migration transport
//!
//! Moves a container or virtual machine between hosts over up to three
//! authenticated channels (control, filesystem and, for live containers,
//! state). A [`MigrationSource`] or push-mode [`MigrationSink`] waits for its
//! peer to connect every channel; a pull-mode sink dials them itself. Once the
//! channels are up the instance driver performs the transfer.

pub mod auth;
pub mod channel;
pub mod control;
pub mod driver;
pub mod state_machine;

mod acceptor;
mod barrier;
mod capability;
mod dialer;
mod log_context;
mod session;
mod sink;
mod source;

#[cfg(test)]
pub(crate) mod testing;

pub use acceptor::{ChannelAcceptor, MAX_PREAMBLE_LEN};
pub use auth::{ChannelSecrets, Secret, SecretAuthority, MIN_SECRET_BYTES};
pub use barrier::ChannelBarrier;
pub use capability::{CapabilityProbe, CommandProbe, FixedProbe};
pub use channel::{AsyncStream, BoxedStream, ChannelRole, ChannelSet, ChannelsMut};
pub use control::{ControlChannel, ControlMessage, MigrationHeader};
pub use dialer::{Dialer, TcpDialer};
pub use driver::{
    Instance, InstanceType, MigrateArgs, MigrateReceiveArgs, MigrateSendArgs, OperationHandle,
};
pub use log_context::{LogContext, Side};
pub use sink::{MigrationSink, SinkArgs};
pub use source::{MigrationSource, MigrationTarget, SourceArgs};
pub use state_machine::{MigrationState, MigrationStateMachine, StateTransition};
