//! Test doubles shared by the session unit tests.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::errors::DriverError;
use crate::migration::channel::ChannelRole;
use crate::migration::driver::{
    Instance, InstanceType, MigrateArgs, MigrateReceiveArgs, MigrateSendArgs,
};

#[derive(Debug, Clone)]
pub(crate) struct DriverCall {
    pub kind: &'static str,
    pub snapshots: bool,
    pub live: bool,
    pub control: bool,
    pub filesystem: bool,
    pub state: bool,
    pub allow_inconsistent: Option<bool>,
    pub refresh: Option<bool>,
    pub has_operation: bool,
    pub cluster_move_source_name: Option<String>,
}

pub(crate) type Calls = Arc<Mutex<Vec<DriverCall>>>;

pub(crate) struct FakeInstance {
    instance_type: InstanceType,
    running: bool,
    failure: Option<String>,
    calls: Calls,
}

impl FakeInstance {
    pub(crate) fn new(instance_type: InstanceType, running: bool) -> (Self, Calls) {
        let calls = Calls::default();
        let instance = Self {
            instance_type,
            running,
            failure: None,
            calls: calls.clone(),
        };
        (instance, calls)
    }

    pub(crate) fn container(running: bool) -> (Self, Calls) {
        Self::new(InstanceType::Container, running)
    }

    pub(crate) fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    fn record(
        &self,
        kind: &'static str,
        args: &MigrateArgs<'_>,
        extra: impl FnOnce(&mut DriverCall),
    ) {
        let mut call = DriverCall {
            kind,
            snapshots: args.snapshots,
            live: args.live,
            control: args.has_channel(ChannelRole::Control),
            filesystem: args.has_channel(ChannelRole::Filesystem),
            state: args.has_channel(ChannelRole::State),
            allow_inconsistent: None,
            refresh: None,
            has_operation: false,
            cluster_move_source_name: args.cluster_move_source_name.clone(),
        };
        extra(&mut call);
        self.calls.lock().unwrap().push(call);
    }

    fn outcome(&self) -> Result<(), DriverError> {
        match &self.failure {
            Some(message) => Err(message.clone().into()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Instance for FakeInstance {
    fn project(&self) -> &str {
        "default"
    }

    fn name(&self) -> &str {
        "c1"
    }

    fn instance_type(&self) -> InstanceType {
        self.instance_type
    }

    fn is_running(&self) -> bool {
        self.running
    }

    async fn migrate_send(&mut self, args: MigrateSendArgs<'_>) -> Result<(), DriverError> {
        self.record("send", &args.migrate, |call| {
            call.allow_inconsistent = Some(args.allow_inconsistent);
            call.has_operation = args.operation.is_some();
        });
        self.outcome()
    }

    async fn migrate_receive(&mut self, args: MigrateReceiveArgs<'_>) -> Result<(), DriverError> {
        self.record("receive", &args.migrate, |call| {
            call.refresh = Some(args.refresh);
            call.has_operation = args.instance_operation.is_some();
        });
        self.outcome()
    }
}
