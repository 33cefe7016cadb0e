use std::sync::Arc;
use tokio::time::timeout;
use uuid::Uuid;

use crate::config::MigrationConfig;
use crate::errors::{MigrationError, Result};
use crate::migration::acceptor::ChannelAcceptor;
use crate::migration::auth::{ChannelSecrets, SecretAuthority};
use crate::migration::barrier::ChannelBarrier;
use crate::migration::capability::{require_live_capability, CapabilityProbe};
use crate::migration::channel::{BoxedStream, ChannelRole, ChannelSet};
use crate::migration::dialer::{Dialer, TcpDialer};
use crate::migration::driver::{Instance, MigrateArgs, MigrateReceiveArgs, OperationHandle};
use crate::migration::log_context::{LogContext, Side};
use crate::migration::session::{conclude, MigrationFields};
use crate::migration::state_machine::{MigrationState, MigrationStateMachine};

pub struct SinkArgs {
    pub instance: Box<dyn Instance>,
    /// The source connects to us (push) rather than us dialing it (pull).
    pub push: bool,
    pub refresh: bool,
    pub live: bool,
    pub instance_only: bool,
    pub cluster_move_source_name: Option<String>,
    /// Pull mode only: where to dial.
    pub url: String,
    /// Pull mode only; defaults to a [`TcpDialer`].
    pub dialer: Option<Arc<dyn Dialer>>,
    /// Pull mode only: the secrets published by the source.
    pub secrets: ChannelSecrets,
}

impl SinkArgs {
    pub fn push(instance: Box<dyn Instance>) -> Self {
        Self {
            instance,
            push: true,
            refresh: false,
            live: false,
            instance_only: false,
            cluster_move_source_name: None,
            url: String::new(),
            dialer: None,
            secrets: ChannelSecrets::new(),
        }
    }

    pub fn pull<S: Into<String>>(
        instance: Box<dyn Instance>,
        url: S,
        secrets: ChannelSecrets,
    ) -> Self {
        Self {
            push: false,
            url: url.into(),
            secrets,
            ..Self::push(instance)
        }
    }

    pub fn with_live(mut self, live: bool) -> Self {
        self.live = live;
        self
    }

    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn with_instance_only(mut self, instance_only: bool) -> Self {
        self.instance_only = instance_only;
        self
    }

    pub fn with_cluster_move_source_name<S: Into<String>>(mut self, name: S) -> Self {
        self.cluster_move_source_name = Some(name.into());
        self
    }

    pub fn with_dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = Some(dialer);
        self
    }
}

/// Receiving end of a migration.
pub struct MigrationSink {
    fields: MigrationFields,
    push: bool,
    refresh: bool,
    url: String,
    dialer: Arc<dyn Dialer>,
    barrier: Option<ChannelBarrier>,
    config: MigrationConfig,
    state: MigrationStateMachine,
}

impl MigrationSink {
    pub fn new(
        args: SinkArgs,
        config: &MigrationConfig,
        probe: &dyn CapabilityProbe,
    ) -> Result<Self> {
        let (secrets, live) = if args.push {
            let authority = SecretAuthority::new(config.secret_bytes());
            (authority.mint_set(args.live)?, args.live)
        } else {
            let mut secrets = ChannelSecrets::new();
            secrets.control = Some(
                args.secrets
                    .control
                    .ok_or(MigrationError::MissingSecret(ChannelRole::Control))?,
            );
            secrets.filesystem = Some(
                args.secrets
                    .filesystem
                    .ok_or(MigrationError::MissingSecret(ChannelRole::Filesystem))?,
            );
            secrets.state = args.secrets.state;
            let live = secrets.state.is_some() || args.live;
            (secrets, live)
        };

        require_live_capability(Side::Target, args.instance.instance_type(), live, probe)?;

        let dialer = args
            .dialer
            .unwrap_or_else(|| Arc::new(TcpDialer::from_config(config)) as Arc<dyn Dialer>);
        let fields = MigrationFields {
            instance: args.instance,
            instance_only: args.instance_only,
            live,
            secrets,
            cluster_move_source_name: args.cluster_move_source_name,
        };

        // A live VM still carries a state secret, but its source never opens
        // the state channel.
        let barrier = args
            .push
            .then(|| ChannelBarrier::new(fields.uses_state_channel()));

        Ok(Self {
            fields,
            push: args.push,
            refresh: args.refresh,
            url: args.url,
            dialer,
            barrier,
            config: config.clone(),
            state: MigrationStateMachine::new(Uuid::new_v4()),
        })
    }

    pub fn secrets(&self) -> &ChannelSecrets {
        &self.fields.secrets
    }

    pub fn is_live(&self) -> bool {
        self.fields.live
    }

    pub fn is_push(&self) -> bool {
        self.push
    }

    /// Inbound acceptor for push mode; `None` for pull sinks.
    pub fn acceptor(&self) -> Option<ChannelAcceptor> {
        self.barrier
            .as_ref()
            .map(|barrier| ChannelAcceptor::new(self.fields.secrets.clone(), barrier.clone()))
    }

    pub fn barrier(&self) -> Option<ChannelBarrier> {
        self.barrier.clone()
    }

    pub fn state_machine(&self) -> MigrationStateMachine {
        self.state.clone()
    }

    pub async fn state(&self) -> MigrationState {
        self.state.get_state().await
    }

    /// Establishes the channels (waiting for them in push mode, dialing them
    /// in pull mode), then runs the driver's receive side.
    pub async fn run(&mut self, instance_operation: Option<OperationHandle>) -> Result<()> {
        let log = self.fields.log_context(Side::Target, Some(self.push));
        self.state.await_channels().await?;

        log.info("Waiting for migration channel connections on target");
        let connected = match &self.barrier {
            Some(barrier) => wait_for_channels(barrier, &self.config).await,
            None => self.dial_channels(&log).await,
        };
        let mut channels = match connected {
            Ok(channels) => channels,
            Err(err) => {
                log.error("Failed establishing migration channels on target", &err);
                return conclude(&self.state, Err(err)).await;
            }
        };
        log.info("Migration channels connected on target");

        self.state.start_transfer().await?;

        let args = MigrateReceiveArgs {
            migrate: MigrateArgs::new(
                &mut channels,
                !self.fields.instance_only,
                self.fields.live,
                self.fields.cluster_move_source_name.clone(),
            ),
            instance_operation,
            refresh: self.refresh,
        };
        let result = self
            .fields
            .instance
            .migrate_receive(args)
            .await
            .map_err(MigrationError::TargetTransfer);

        channels.disconnect().await;
        log.info("Migration channels disconnected on target");

        if let Err(err) = &result {
            log.error("Failed migration on target", err);
        }
        conclude(&self.state, result).await
    }

    /// Dials control, then filesystem, then state (live containers only). Once
    /// control is up, a later failure is reported to the peer before the
    /// already-open channels are closed.
    async fn dial_channels(&self, log: &LogContext) -> Result<ChannelSet> {
        let mut channels = ChannelSet::new();

        let control = self.dial(ChannelRole::Control).await?;
        channels.bind(ChannelRole::Control, control)?;

        let mut remaining = vec![ChannelRole::Filesystem];
        if self.fields.uses_state_channel() {
            remaining.push(ChannelRole::State);
        }

        for role in remaining {
            let bound = match self.dial(role).await {
                Ok(stream) => channels.bind(role, stream),
                Err(err) => Err(err),
            };

            if let Err(err) = bound {
                log.warn("Failed connecting migration channel, notifying source", &err);
                channels.notify_failure(&err).await;
                channels.disconnect().await;
                return Err(err);
            }
        }

        Ok(channels)
    }

    async fn dial(&self, role: ChannelRole) -> Result<BoxedStream> {
        let secret = self
            .fields
            .secrets
            .get(role)
            .ok_or(MigrationError::MissingSecret(role))?;

        match timeout(self.config.dial_timeout(), self.dialer.dial(&self.url, role, secret)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(source)) => Err(MigrationError::Dial { role, source }),
            Err(_) => Err(MigrationError::Dial {
                role,
                source: std::io::ErrorKind::TimedOut.into(),
            }),
        }
    }
}

async fn wait_for_channels(
    barrier: &ChannelBarrier,
    config: &MigrationConfig,
) -> Result<ChannelSet> {
    match barrier.wait(config.connect_timeout()).await {
        Ok(()) => Ok(barrier.take_channels().await),
        Err(err) => {
            barrier.take_channels().await.disconnect().await;
            Err(err)
        }
    }
}
