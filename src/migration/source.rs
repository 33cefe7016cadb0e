use tokio::time::timeout;
use uuid::Uuid;

use crate::config::MigrationConfig;
use crate::errors::{MigrationError, Result};
use crate::migration::acceptor::ChannelAcceptor;
use crate::migration::auth::{ChannelSecrets, SecretAuthority};
use crate::migration::barrier::ChannelBarrier;
use crate::migration::capability::{require_live_capability, CapabilityProbe};
use crate::migration::channel::ChannelRole;
use crate::migration::dialer::Dialer;
use crate::migration::driver::{Instance, MigrateArgs, MigrateSendArgs, OperationHandle};
use crate::migration::log_context::Side;
use crate::migration::session::{conclude, MigrationFields};
use crate::migration::state_machine::{MigrationState, MigrationStateMachine};

pub struct SourceArgs {
    pub instance: Box<dyn Instance>,
    /// Migrate running process state as well as the filesystem.
    pub stateful: bool,
    pub instance_only: bool,
    pub allow_inconsistent: bool,
    pub cluster_move_source_name: Option<String>,
}

impl SourceArgs {
    pub fn new(instance: Box<dyn Instance>) -> Self {
        Self {
            instance,
            stateful: false,
            instance_only: false,
            allow_inconsistent: false,
            cluster_move_source_name: None,
        }
    }

    pub fn with_stateful(mut self, stateful: bool) -> Self {
        self.stateful = stateful;
        self
    }

    pub fn with_instance_only(mut self, instance_only: bool) -> Self {
        self.instance_only = instance_only;
        self
    }

    pub fn with_allow_inconsistent(mut self, allow: bool) -> Self {
        self.allow_inconsistent = allow;
        self
    }

    pub fn with_cluster_move_source_name<S: Into<String>>(mut self, name: S) -> Self {
        self.cluster_move_source_name = Some(name.into());
        self
    }
}

/// Endpoints and secrets published by a push-mode target.
#[derive(Debug, Clone)]
pub struct MigrationTarget {
    pub url: String,
    pub secrets: ChannelSecrets,
}

/// Sending end of a migration.
pub struct MigrationSource {
    fields: MigrationFields,
    allow_inconsistent: bool,
    barrier: ChannelBarrier,
    config: MigrationConfig,
    state: MigrationStateMachine,
}

impl MigrationSource {
    pub fn new(
        args: SourceArgs,
        config: &MigrationConfig,
        probe: &dyn CapabilityProbe,
    ) -> Result<Self> {
        let authority = SecretAuthority::new(config.secret_bytes());

        let mut secrets = ChannelSecrets::new();
        secrets.control = Some(authority.mint(ChannelRole::Control)?);
        secrets.filesystem = Some(authority.mint(ChannelRole::Filesystem)?);

        let live = args.stateful && args.instance.is_running();
        let mut fields = MigrationFields {
            instance: args.instance,
            instance_only: args.instance_only,
            live,
            secrets,
            cluster_move_source_name: args.cluster_move_source_name,
        };

        if fields.live {
            require_live_capability(Side::Source, fields.instance.instance_type(), true, probe)?;
            if fields.uses_state_channel() {
                fields.secrets.state = Some(authority.mint(ChannelRole::State)?);
            }
        }

        let barrier = ChannelBarrier::new(fields.secrets.state.is_some());

        Ok(Self {
            fields,
            allow_inconsistent: args.allow_inconsistent,
            barrier,
            config: config.clone(),
            state: MigrationStateMachine::new(Uuid::new_v4()),
        })
    }

    /// Secrets the peer must present, one per channel this session expects.
    pub fn secrets(&self) -> &ChannelSecrets {
        &self.fields.secrets
    }

    pub fn is_live(&self) -> bool {
        self.fields.live
    }

    pub fn acceptor(&self) -> ChannelAcceptor {
        ChannelAcceptor::new(self.fields.secrets.clone(), self.barrier.clone())
    }

    pub fn barrier(&self) -> ChannelBarrier {
        self.barrier.clone()
    }

    pub fn state_machine(&self) -> MigrationStateMachine {
        self.state.clone()
    }

    pub async fn state(&self) -> MigrationState {
        self.state.get_state().await
    }

    /// Dials a push-mode target's channels, in control, filesystem, state
    /// order, and binds them into this source's barrier. Any failure cancels
    /// the barrier so a concurrent [`Self::run`] fails without waiting out
    /// the timeout.
    pub async fn connect_target(
        &self,
        target: &MigrationTarget,
        dialer: &dyn Dialer,
    ) -> Result<()> {
        for role in self.barrier.required_roles().to_vec() {
            if let Err(err) = self.dial_and_bind(target, dialer, role).await {
                self.barrier.cancel().await;
                return Err(err);
            }
        }
        Ok(())
    }

    async fn dial_and_bind(
        &self,
        target: &MigrationTarget,
        dialer: &dyn Dialer,
        role: ChannelRole,
    ) -> Result<()> {
        let secret = target
            .secrets
            .get(role)
            .ok_or(MigrationError::MissingSecret(role))?;

        let dialing = dialer.dial(&target.url, role, secret);
        let stream = match timeout(self.config.dial_timeout(), dialing).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(MigrationError::Dial { role, source }),
            Err(_) => {
                return Err(MigrationError::Dial {
                    role,
                    source: std::io::ErrorKind::TimedOut.into(),
                })
            }
        };

        self.barrier.bind(role, stream).await
    }

    /// Waits for every channel, then runs the driver's send side. Channels are
    /// closed on every exit path.
    pub async fn run(&mut self, operation: Option<OperationHandle>) -> Result<()> {
        let log = self.fields.log_context(Side::Source, None);
        self.state.await_channels().await?;

        log.info("Waiting for migration channel connections on source");
        if let Err(err) = self.barrier.wait(self.config.connect_timeout()).await {
            self.barrier.take_channels().await.disconnect().await;
            log.error("Failed waiting for migration channel connections on source", &err);
            return conclude(&self.state, Err(err)).await;
        }
        log.info("Migration channels connected on source");

        let mut channels = self.barrier.take_channels().await;
        self.state.start_transfer().await?;

        let args = MigrateSendArgs {
            migrate: MigrateArgs::new(
                &mut channels,
                !self.fields.instance_only,
                self.fields.live,
                self.fields.cluster_move_source_name.clone(),
            ),
            allow_inconsistent: self.allow_inconsistent,
            operation,
        };
        let result = self
            .fields
            .instance
            .migrate_send(args)
            .await
            .map_err(MigrationError::SourceTransfer);

        channels.disconnect().await;
        log.info("Migration channels disconnected on source");

        if let Err(err) = &result {
            log.error("Failed migration on source", err);
        }
        conclude(&self.state, result).await
    }
}
