use tokio::io::AsyncReadExt;

use crate::errors::{MigrationError, Result};
use crate::migration::auth::ChannelSecrets;
use crate::migration::barrier::ChannelBarrier;
use crate::migration::channel::{AsyncStream, BoxedStream, ChannelRole};

/// Longest secret preamble accepted from a peer.
pub const MAX_PREAMBLE_LEN: usize = 1024;

/// Inbound side of a push-style session: authenticates connections by the
/// secret they present and binds them into the session's barrier.
#[derive(Clone)]
pub struct ChannelAcceptor {
    secrets: ChannelSecrets,
    barrier: ChannelBarrier,
}

impl ChannelAcceptor {
    pub fn new(secrets: ChannelSecrets, barrier: ChannelBarrier) -> Self {
        Self { secrets, barrier }
    }

    /// Binds `stream` to the role whose secret is `presented`.
    pub async fn accept(&self, presented: &str, stream: BoxedStream) -> Result<ChannelRole> {
        let role = self
            .secrets
            .role_for(presented)
            .ok_or(MigrationError::UnknownSecret)?;

        self.barrier.bind(role, stream).await?;
        Ok(role)
    }

    /// Reads the secret preamble written by [`crate::migration::TcpDialer`]
    /// off `stream`, then binds it.
    pub async fn accept_with_preamble<S>(&self, mut stream: S) -> Result<ChannelRole>
    where
        S: AsyncStream + 'static,
    {
        let presented = read_preamble(&mut stream).await?;
        self.accept(&presented, Box::new(stream)).await
    }

    /// Resolves when the session's barrier is satisfied or cancelled.
    pub async fn done(&self) {
        self.barrier.done().await
    }
}

/// Reads one big-endian u32 length-prefixed frame, the framing used by
/// `LengthDelimitedCodec`'s defaults.
pub(crate) async fn read_preamble<S>(stream: &mut S) -> Result<String>
where
    S: AsyncStream,
{
    let len = stream.read_u32().await? as usize;
    if len > MAX_PREAMBLE_LEN {
        return Err(MigrationError::UnknownSecret);
    }

    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;
    String::from_utf8(buf).map_err(|_| MigrationError::UnknownSecret)
}
