//! Control channel framing.
//!
//! Messages are MessagePack-encoded and carried in length-delimited frames.
//! Only the failure notice is interpreted by the transport; everything else
//! belongs to the instance driver.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::errors::{MigrationError, Result};
use crate::migration::channel::BoxedStream;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationHeader {
    pub filesystem_driver: String,
    pub snapshot_names: Vec<String>,
    pub live: bool,
    pub refresh: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlMessage {
    Header(MigrationHeader),
    /// Final outcome reported by one side to the other.
    Control {
        success: bool,
        message: Option<String>,
    },
    /// Driver-defined payload, passed through untouched.
    Driver(Vec<u8>),
}

impl ControlMessage {
    pub fn success() -> Self {
        ControlMessage::Control {
            success: true,
            message: None,
        }
    }

    pub fn failure(err: &dyn fmt::Display) -> Self {
        ControlMessage::Control {
            success: false,
            message: Some(err.to_string()),
        }
    }

    /// The peer's error text when this is a failure notice.
    pub fn failure_message(&self) -> Option<&str> {
        match self {
            ControlMessage::Control {
                success: false,
                message,
            } => Some(message.as_deref().unwrap_or("")),
            _ => None,
        }
    }
}

pub struct ControlChannel {
    framed: Framed<BoxedStream, LengthDelimitedCodec>,
}

impl ControlChannel {
    pub fn new(stream: BoxedStream) -> Self {
        Self {
            framed: Framed::new(stream, LengthDelimitedCodec::new()),
        }
    }

    pub async fn send(&mut self, message: &ControlMessage) -> Result<()> {
        let payload = rmp_serde::to_vec_named(message)?;
        self.framed.send(Bytes::from(payload)).await?;
        Ok(())
    }

    pub async fn recv(&mut self) -> Result<ControlMessage> {
        match self.framed.next().await {
            Some(frame) => Ok(rmp_serde::from_slice(&frame?)?),
            None => Err(MigrationError::ControlClosed),
        }
    }

    /// Flushes pending frames and shuts the stream down.
    pub async fn close(mut self) -> Result<()> {
        SinkExt::<Bytes>::close(&mut self.framed).await?;
        Ok(())
    }
}

impl fmt::Debug for ControlChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlChannel").finish_non_exhaustive()
    }
}
