mod common;

use common::{serve, ReceivingInstance, SendingInstance};
use migratenet::migration::{
    ChannelRole, ChannelSecrets, ControlMessage, FixedProbe, InstanceType, MigrationSink,
    MigrationSource, MigrationState, MigrationTarget, SinkArgs, SourceArgs, TcpDialer,
};
use migratenet::{MigrationConfig, MigrationError};
use std::time::Duration;
use tokio::net::TcpListener;

fn test_config() -> MigrationConfig {
    MigrationConfig::new()
        .with_connect_timeout(Duration::from_secs(5))
        .with_dial_timeout(Duration::from_secs(2))
}

#[tokio::test]
async fn test_pull_sink_receives_from_source() {
    let config = test_config();
    let sender = SendingInstance::container(b"rootfs-image");
    let verdict = sender.verdict.clone();

    let mut source = MigrationSource::new(
        SourceArgs::new(Box::new(sender)),
        &config,
        &FixedProbe::unavailable(),
    )
    .unwrap();
    assert!(source.secrets().state.is_none());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = listener.local_addr().unwrap().to_string();
    let server = serve(listener, source.acceptor(), 2);

    let receiver = ReceivingInstance::new(b"rootfs-image".len());
    let received = receiver.received.clone();
    let saw_state = receiver.saw_state_channel.clone();

    // The sink learns the source's secrets out of band, without a state entry.
    let mut sink = MigrationSink::new(
        SinkArgs::pull(Box::new(receiver), url, source.secrets().clone()),
        &config,
        &FixedProbe::unavailable(),
    )
    .unwrap();
    assert!(!sink.is_live());

    let (source_result, sink_result) = tokio::join!(source.run(None), sink.run(None));
    source_result.unwrap();
    sink_result.unwrap();
    server.await.unwrap();

    assert_eq!(received.lock().unwrap().as_slice(), b"rootfs-image");
    assert_eq!(*saw_state.lock().unwrap(), Some(false));
    assert_eq!(*verdict.lock().unwrap(), Some(ControlMessage::success()));
    assert_eq!(source.state().await, MigrationState::Succeeded);
    assert_eq!(sink.state().await, MigrationState::Succeeded);
}

#[tokio::test]
async fn test_source_connects_to_push_sink() {
    let config = test_config();

    let receiver = ReceivingInstance::new(4);
    let received = receiver.received.clone();
    let refresh = receiver.refresh.clone();
    let mut sink = MigrationSink::new(
        SinkArgs::push(Box::new(receiver)).with_refresh(true),
        &config,
        &FixedProbe::unavailable(),
    )
    .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let target = MigrationTarget {
        url: listener.local_addr().unwrap().to_string(),
        secrets: sink.secrets().clone(),
    };
    let server = serve(listener, sink.acceptor().unwrap(), 2);

    let mut source = MigrationSource::new(
        SourceArgs::new(Box::new(SendingInstance::container(b"data"))),
        &config,
        &FixedProbe::unavailable(),
    )
    .unwrap();

    let dialer = TcpDialer::from_config(&config);
    source.connect_target(&target, &dialer).await.unwrap();
    assert!(source.barrier().is_connected());

    let (source_result, sink_result) = tokio::join!(source.run(None), sink.run(None));
    source_result.unwrap();
    sink_result.unwrap();
    server.await.unwrap();

    assert_eq!(received.lock().unwrap().as_slice(), b"data");
    assert_eq!(*refresh.lock().unwrap(), Some(true));
}

#[tokio::test]
async fn test_live_vm_source_connects_to_push_sink() {
    let config = test_config();

    let mut receiver = ReceivingInstance::new(6);
    receiver.instance_type = InstanceType::VirtualMachine;
    let received = receiver.received.clone();
    let saw_state = receiver.saw_state_channel.clone();
    let mut sink = MigrationSink::new(
        SinkArgs::push(Box::new(receiver)).with_live(true),
        &config,
        &FixedProbe::unavailable(),
    )
    .unwrap();
    assert!(sink.secrets().state.is_some());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let target = MigrationTarget {
        url: listener.local_addr().unwrap().to_string(),
        secrets: sink.secrets().clone(),
    };
    let server = serve(listener, sink.acceptor().unwrap(), 2);

    let mut vm = SendingInstance::container(b"memory");
    vm.instance_type = InstanceType::VirtualMachine;
    let mut source = MigrationSource::new(
        SourceArgs::new(Box::new(vm)).with_stateful(true),
        &config,
        &FixedProbe::unavailable(),
    )
    .unwrap();
    assert!(source.is_live());

    source
        .connect_target(&target, &TcpDialer::from_config(&config))
        .await
        .unwrap();

    let (source_result, sink_result) = tokio::join!(source.run(None), sink.run(None));
    source_result.unwrap();
    sink_result.unwrap();
    server.await.unwrap();

    assert_eq!(received.lock().unwrap().as_slice(), b"memory");
    assert_eq!(*saw_state.lock().unwrap(), Some(false));
}

#[tokio::test]
async fn test_connect_target_failure_fails_run_early() {
    let config = MigrationConfig::new()
        .with_connect_timeout(Duration::from_secs(30))
        .with_dial_timeout(Duration::from_secs(2));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = listener.local_addr().unwrap().to_string();
    drop(listener);

    let mut source = MigrationSource::new(
        SourceArgs::new(Box::new(SendingInstance::container(b"x"))),
        &config,
        &FixedProbe::unavailable(),
    )
    .unwrap();

    let target = MigrationTarget {
        url,
        secrets: ChannelSecrets::new()
            .with(ChannelRole::Control, "c1")
            .with(ChannelRole::Filesystem, "f1"),
    };
    let err = source
        .connect_target(&target, &TcpDialer::from_config(&config))
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::Dial { role: ChannelRole::Control, .. }));

    let err = tokio::time::timeout(Duration::from_secs(5), source.run(None))
        .await
        .expect("run should not wait out the connect timeout")
        .unwrap_err();
    assert!(matches!(err, MigrationError::BarrierCancelled));
}

#[test]
fn test_live_container_requires_capability_on_both_ends() {
    let config = MigrationConfig::default();

    let result = MigrationSource::new(
        SourceArgs::new(Box::new(SendingInstance::container(b""))).with_stateful(true),
        &config,
        &FixedProbe::unavailable(),
    );
    match result {
        Err(err) => assert!(err.is_capability_missing()),
        Ok(_) => panic!("live source without checkpoint tool must not be constructed"),
    }

    let result = MigrationSink::new(
        SinkArgs::push(Box::new(ReceivingInstance::new(0))).with_live(true),
        &config,
        &FixedProbe::unavailable(),
    );
    match result {
        Err(err) => assert!(err.is_capability_missing()),
        Ok(_) => panic!("live sink without checkpoint tool must not be constructed"),
    }
}

#[test]
fn test_live_vm_source_has_no_state_channel() {
    let mut vm = SendingInstance::container(b"");
    vm.instance_type = InstanceType::VirtualMachine;

    let source = MigrationSource::new(
        SourceArgs::new(Box::new(vm)).with_stateful(true),
        &MigrationConfig::default(),
        &FixedProbe::unavailable(),
    )
    .unwrap();

    assert!(source.is_live());
    assert!(source.secrets().state.is_none());
}

#[tokio::test]
async fn test_push_sink_timeout_never_calls_driver() {
    let receiver = ReceivingInstance::new(1);
    let saw_state = receiver.saw_state_channel.clone();
    let mut sink = MigrationSink::new(
        SinkArgs::push(Box::new(receiver)),
        &MigrationConfig::new().with_connect_timeout(Duration::from_millis(50)),
        &FixedProbe::unavailable(),
    )
    .unwrap();

    let err = sink.run(None).await.unwrap_err();
    assert!(matches!(err, MigrationError::Timeout { .. }));
    assert!(saw_state.lock().unwrap().is_none());
    assert!(sink.barrier().unwrap().is_cancelled());
}
