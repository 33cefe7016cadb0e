use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::errors::{MigrationError, Result};
use crate::migration::channel::{BoxedStream, ChannelRole, ChannelSet};

/// Holds a session back until every required channel has been bound.
///
/// Clones share the same barrier, so inbound connection handlers can bind
/// from their own tasks while the session waits.
#[derive(Clone)]
pub struct ChannelBarrier {
    inner: Arc<BarrierInner>,
}

struct BarrierInner {
    required: Vec<ChannelRole>,
    channels: Mutex<ChannelSet>,
    connected: CancellationToken,
    cancelled: CancellationToken,
}

impl ChannelBarrier {
    /// A barrier over control and filesystem, plus state when `include_state`.
    pub fn new(include_state: bool) -> Self {
        let mut required = vec![ChannelRole::Control, ChannelRole::Filesystem];
        if include_state {
            required.push(ChannelRole::State);
        }

        Self {
            inner: Arc::new(BarrierInner {
                required,
                channels: Mutex::new(ChannelSet::new()),
                connected: CancellationToken::new(),
                cancelled: CancellationToken::new(),
            }),
        }
    }

    pub fn required_roles(&self) -> &[ChannelRole] {
        &self.inner.required
    }

    /// Records `stream` as the connection for `role`. The barrier releases on
    /// the bind that completes the required set.
    pub async fn bind(&self, role: ChannelRole, stream: BoxedStream) -> Result<()> {
        if !self.inner.required.contains(&role) {
            return Err(MigrationError::UnexpectedChannel(role));
        }

        let mut channels = self.inner.channels.lock().await;
        if self.inner.cancelled.is_cancelled() {
            return Err(MigrationError::BarrierCancelled);
        }
        if self.inner.connected.is_cancelled() {
            return Err(MigrationError::AlreadyConnected(role));
        }

        channels.bind(role, stream)?;

        if self.inner.required.iter().all(|r| channels.is_bound(*r)) {
            self.inner.connected.cancel();
        }
        Ok(())
    }

    /// Waits until all channels are bound. On timeout the barrier is cancelled,
    /// which rejects later binds and wakes anybody parked in [`Self::done`].
    pub async fn wait(&self, timeout: Duration) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.inner.connected.cancelled() => Ok(()),
            _ = self.inner.cancelled.cancelled() => Err(MigrationError::BarrierCancelled),
            _ = sleep(timeout) => {
                let _channels = self.inner.channels.lock().await;
                if self.inner.connected.is_cancelled() {
                    return Ok(());
                }
                self.inner.cancelled.cancel();
                Err(MigrationError::Timeout { timeout })
            }
        }
    }

    /// Resolves once the barrier is either satisfied or cancelled.
    pub async fn done(&self) {
        tokio::select! {
            _ = self.inner.connected.cancelled() => {}
            _ = self.inner.cancelled.cancelled() => {}
        }
    }

    pub async fn cancel(&self) {
        let _channels = self.inner.channels.lock().await;
        if !self.inner.connected.is_cancelled() {
            self.inner.cancelled.cancel();
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.is_cancelled()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.is_cancelled()
    }

    /// Moves every bound connection out of the barrier.
    pub async fn take_channels(&self) -> ChannelSet {
        std::mem::take(&mut *self.inner.channels.lock().await)
    }
}
