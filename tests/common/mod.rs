#![allow(dead_code)]

use async_trait::async_trait;
use migratenet::migration::{
    ChannelAcceptor, ControlMessage, Instance, InstanceType, MigrateReceiveArgs, MigrateSendArgs,
    MigrationHeader,
};
use migratenet::DriverError;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Writes `payload` on the filesystem channel and waits for the target's verdict.
pub struct SendingInstance {
    pub instance_type: InstanceType,
    pub running: bool,
    pub payload: Vec<u8>,
    pub verdict: Arc<Mutex<Option<ControlMessage>>>,
}

impl SendingInstance {
    pub fn container(payload: &[u8]) -> Self {
        Self {
            instance_type: InstanceType::Container,
            running: true,
            payload: payload.to_vec(),
            verdict: Arc::default(),
        }
    }
}

#[async_trait]
impl Instance for SendingInstance {
    fn project(&self) -> &str {
        "default"
    }

    fn name(&self) -> &str {
        "web01"
    }

    fn instance_type(&self) -> InstanceType {
        self.instance_type
    }

    fn is_running(&self) -> bool {
        self.running
    }

    async fn migrate_send(&mut self, mut args: MigrateSendArgs<'_>) -> Result<(), DriverError> {
        let header = ControlMessage::Header(MigrationHeader {
            filesystem_driver: "dir".to_string(),
            snapshot_names: Vec::new(),
            live: args.migrate.live,
            refresh: false,
        });
        args.migrate.control_send(&header).await?;

        let fs = args
            .migrate
            .filesystem_conn()
            .ok_or("filesystem channel missing")?;
        fs.write_all(&self.payload).await?;
        fs.flush().await?;

        let verdict = args.migrate.control_receive().await?;
        *self.verdict.lock().unwrap() = Some(verdict);
        Ok(())
    }

    async fn migrate_receive(&mut self, _args: MigrateReceiveArgs<'_>) -> Result<(), DriverError> {
        Err("sending instance cannot receive".into())
    }
}

/// Reads the source's header and payload, then acknowledges.
pub struct ReceivingInstance {
    pub instance_type: InstanceType,
    pub expected_len: usize,
    pub received: Arc<Mutex<Vec<u8>>>,
    pub saw_state_channel: Arc<Mutex<Option<bool>>>,
    pub refresh: Arc<Mutex<Option<bool>>>,
}

impl ReceivingInstance {
    pub fn new(expected_len: usize) -> Self {
        Self {
            instance_type: InstanceType::Container,
            expected_len,
            received: Arc::default(),
            saw_state_channel: Arc::default(),
            refresh: Arc::default(),
        }
    }
}

#[async_trait]
impl Instance for ReceivingInstance {
    fn project(&self) -> &str {
        "default"
    }

    fn name(&self) -> &str {
        "web01"
    }

    fn instance_type(&self) -> InstanceType {
        self.instance_type
    }

    fn is_running(&self) -> bool {
        false
    }

    async fn migrate_send(&mut self, _args: MigrateSendArgs<'_>) -> Result<(), DriverError> {
        Err("receiving instance cannot send".into())
    }

    async fn migrate_receive(
        &mut self,
        mut args: MigrateReceiveArgs<'_>,
    ) -> Result<(), DriverError> {
        *self.saw_state_channel.lock().unwrap() = Some(args.migrate.state_conn().is_some());
        *self.refresh.lock().unwrap() = Some(args.refresh);

        match args.migrate.control_receive().await? {
            ControlMessage::Header(_) => {}
            other => return Err(format!("unexpected control message {:?}", other).into()),
        }

        let mut buf = vec![0u8; self.expected_len];
        let fs = args
            .migrate
            .filesystem_conn()
            .ok_or("filesystem channel missing")?;
        fs.read_exact(&mut buf).await?;
        *self.received.lock().unwrap() = buf;

        args.migrate.control_send(&ControlMessage::success()).await?;
        Ok(())
    }
}

/// Accepts `count` connections on `listener`, authenticating each through
/// its secret preamble.
pub fn serve(listener: TcpListener, acceptor: ChannelAcceptor, count: usize) -> JoinHandle<()> {
    tokio::spawn(async move {
        for _ in 0..count {
            let (socket, _) = listener.accept().await.unwrap();
            acceptor.accept_with_preamble(socket).await.unwrap();
        }
    })
}
