use async_trait::async_trait;
use bytes::Bytes;
use futures_util::SinkExt;
use std::io;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::config::MigrationConfig;
use crate::migration::auth::Secret;
use crate::migration::channel::{BoxedStream, ChannelRole};

/// Opens an outbound migration channel to a remote endpoint.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, url: &str, role: ChannelRole, secret: &Secret) -> io::Result<BoxedStream>;
}

/// Dials `host:port` over TCP and presents the secret as the first
/// length-delimited frame on the stream.
#[derive(Debug, Clone)]
pub struct TcpDialer {
    connect_timeout: Duration,
}

impl TcpDialer {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    pub fn from_config(config: &MigrationConfig) -> Self {
        Self::new(config.dial_timeout())
    }
}

impl Default for TcpDialer {
    fn default() -> Self {
        Self::from_config(&MigrationConfig::default())
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, url: &str, role: ChannelRole, secret: &Secret) -> io::Result<BoxedStream> {
        let stream = timeout(self.connect_timeout, TcpStream::connect(url))
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("timed out dialing {} channel at {}", role, url),
                )
            })??;
        stream.set_nodelay(true)?;

        let mut framed = Framed::new(stream, LengthDelimitedCodec::new());
        framed
            .send(Bytes::copy_from_slice(secret.as_str().as_bytes()))
            .await?;

        Ok(Box::new(framed.into_inner()))
    }
}
