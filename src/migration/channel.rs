use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::errors::{MigrationError, Result};
use crate::migration::control::{ControlChannel, ControlMessage};

/// Any bidirectional byte stream usable as a migration channel.
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncStream for T {}

pub type BoxedStream = Box<dyn AsyncStream>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelRole {
    Control,
    Filesystem,
    State,
}

impl ChannelRole {
    pub const ALL: [ChannelRole; 3] = [
        ChannelRole::Control,
        ChannelRole::Filesystem,
        ChannelRole::State,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelRole::Control => "control",
            ChannelRole::Filesystem => "filesystem",
            ChannelRole::State => "state",
        }
    }
}

impl fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Disjoint mutable views of every bound channel, for drivers that need to
/// drive the control channel while streaming on another one.
pub struct ChannelsMut<'a> {
    pub control: Option<&'a mut ControlChannel>,
    pub filesystem: Option<&'a mut BoxedStream>,
    pub state: Option<&'a mut BoxedStream>,
}

/// The up-to-three connections owned by one migration session.
///
/// Every slot is filled at most once and emptied by [`ChannelSet::disconnect`],
/// so a connection is closed exactly once no matter how often teardown runs.
/// Dropping the set releases whatever is still bound.
#[derive(Default)]
pub struct ChannelSet {
    control: Option<ControlChannel>,
    filesystem: Option<BoxedStream>,
    state: Option<BoxedStream>,
}

impl ChannelSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, role: ChannelRole, stream: BoxedStream) -> Result<()> {
        if self.is_bound(role) {
            return Err(MigrationError::AlreadyConnected(role));
        }

        match role {
            ChannelRole::Control => self.control = Some(ControlChannel::new(stream)),
            ChannelRole::Filesystem => self.filesystem = Some(stream),
            ChannelRole::State => self.state = Some(stream),
        }
        Ok(())
    }

    pub fn is_bound(&self, role: ChannelRole) -> bool {
        match role {
            ChannelRole::Control => self.control.is_some(),
            ChannelRole::Filesystem => self.filesystem.is_some(),
            ChannelRole::State => self.state.is_some(),
        }
    }

    pub fn bound_roles(&self) -> Vec<ChannelRole> {
        ChannelRole::ALL
            .into_iter()
            .filter(|role| self.is_bound(*role))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.bound_roles().is_empty()
    }

    pub fn control(&mut self) -> Option<&mut ControlChannel> {
        self.control.as_mut()
    }

    pub fn filesystem(&mut self) -> Option<&mut BoxedStream> {
        self.filesystem.as_mut()
    }

    pub fn state(&mut self) -> Option<&mut BoxedStream> {
        self.state.as_mut()
    }

    pub fn split_mut(&mut self) -> ChannelsMut<'_> {
        ChannelsMut {
            control: self.control.as_mut(),
            filesystem: self.filesystem.as_mut(),
            state: self.state.as_mut(),
        }
    }

    pub async fn send_control(&mut self, message: &ControlMessage) -> Result<()> {
        self.control
            .as_mut()
            .ok_or(MigrationError::ChannelNotConnected(ChannelRole::Control))?
            .send(message)
            .await
    }

    pub async fn recv_control(&mut self) -> Result<ControlMessage> {
        self.control
            .as_mut()
            .ok_or(MigrationError::ChannelNotConnected(ChannelRole::Control))?
            .recv()
            .await
    }

    /// Tells the peer over the control channel that the migration failed.
    /// Fire-and-forget: a send failure is logged and otherwise ignored.
    pub async fn notify_failure(&mut self, err: &MigrationError) {
        let message = ControlMessage::failure(err);
        if let Err(send_err) = self.send_control(&message).await {
            debug!(err = %send_err, "Failed sending migration failure notice to peer");
        }
    }

    /// Closes every bound connection and returns how many were closed.
    pub async fn disconnect(&mut self) -> usize {
        let mut closed = 0;

        if let Some(control) = self.control.take() {
            if let Err(err) = control.close().await {
                debug!(role = %ChannelRole::Control, err = %err, "Error closing migration channel");
            }
            closed += 1;
        }

        for (role, slot) in [
            (ChannelRole::Filesystem, &mut self.filesystem),
            (ChannelRole::State, &mut self.state),
        ] {
            if let Some(mut stream) = slot.take() {
                if let Err(err) = stream.shutdown().await {
                    debug!(role = %role, err = %err, "Error closing migration channel");
                }
                closed += 1;
            }
        }

        closed
    }
}

impl fmt::Debug for ChannelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelSet")
            .field("bound", &self.bound_roles())
            .finish()
    }
}
