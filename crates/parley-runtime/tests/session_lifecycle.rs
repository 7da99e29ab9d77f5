//! Connection lifecycle: authentication, recovery, logout and shutdown

mod common;

use common::*;
use core::time::Duration;
use parley_core::{stanza, RelayConfig, SessionStatus};
use parley_harness::MockBehavior;
use parley_runtime::{
    AppEvent, BrokerConfig, BrokerError, ConnectError, EventTopic, LinkState, SessionConfig,
    TransportStatus,
};
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_authenticate_connects_and_announces_presence() {
    let session = create_test_session(MockBehavior::default());
    let mut lifecycle = session.handle.subscribe_to(&[EventTopic::Lifecycle]);

    tokio_test::assert_ok!(session.handle.authenticate(create_test_jid(), "secret").await);

    assert_eq!(
        next_event(&mut lifecycle).await,
        AppEvent::Connected {
            jid: create_test_jid()
        }
    );
    assert_eq!(session.probe.wait_for_sent(1).await, vec![stanza::presence()]);
    assert_eq!(session.probe.connects(), vec![create_test_jid()]);

    let snapshot = session.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.state, LinkState::Connected);
    assert_eq!(snapshot.jid, Some(create_test_jid()));
    assert!(snapshot.has_credential);
    assert!(snapshot.has_transport);
    assert!(snapshot.receivers_bound);
    assert_eq!(
        snapshot.status,
        SessionStatus {
            connected: true,
            connecting: false,
            protocol: "WSS".to_string(),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_status_flags_follow_the_handshake() {
    let session = create_test_session(MockBehavior::manual());
    let mut status = session.handle.subscribe_to(&[EventTopic::Status]);

    let handle = session.handle.clone();
    let pending = tokio::spawn(async move { handle.authenticate(create_test_jid(), "secret").await });
    session.probe.wait_for_connects(1).await;

    match next_event(&mut status).await {
        AppEvent::SessionStatusChanged(status) => {
            assert!(status.connecting);
            assert!(!status.connected);
        }
        other => panic!("unexpected event: {:?}", other),
    }

    assert!(session.probe.complete_connect());
    pending.await.unwrap().unwrap();

    match next_event(&mut status).await {
        AppEvent::SessionStatusChanged(status) => {
            assert!(status.connected);
            assert!(!status.connecting);
            assert_eq!(status.protocol, "WSS");
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_second_authenticate_is_rejected() {
    let session = create_test_session(MockBehavior::manual());

    let handle = session.handle.clone();
    let first = tokio::spawn(async move { handle.authenticate(create_test_jid(), "secret").await });
    session.probe.wait_for_connects(1).await;

    let result = session.handle.authenticate(create_test_jid(), "secret").await;
    assert_eq!(result, Err(ConnectError::AlreadyConnecting.into()));

    assert!(session.probe.complete_connect());
    first.await.unwrap().unwrap();

    let result = session.handle.authenticate(create_test_jid(), "secret").await;
    assert_eq!(result, Err(ConnectError::AlreadyConnected.into()));
    assert_eq!(session.probe.provided_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_empty_credential_is_rejected() {
    let session = create_test_session(MockBehavior::default());

    let result = session.handle.authenticate(create_test_jid(), "").await;
    assert_eq!(result, Err(ConnectError::MissingCredential.into()));
    assert_eq!(session.probe.provided_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_missing_relay_host_clears_session() {
    let config = BrokerConfig::testing().with_relay(RelayConfig::default());
    let session = create_test_session_with(config, MockBehavior::default());
    let mut lifecycle = session.handle.subscribe_to(&[EventTopic::Lifecycle]);

    let result = session.handle.authenticate(create_test_jid(), "secret").await;
    assert_eq!(result, Err(ConnectError::NoRelayHost.into()));
    assert_eq!(
        next_event(&mut lifecycle).await,
        AppEvent::Disconnected {
            reason: Some(BrokerError::from(ConnectError::NoRelayHost).to_string())
        }
    );

    let snapshot = session.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.state, LinkState::Idle);
    assert_eq!(snapshot.jid, None);
    assert!(!snapshot.has_credential);
    assert_eq!(session.probe.provided_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_auth_failure_clears_session() {
    let session = create_test_session(MockBehavior::failing(TransportStatus::AuthFailure));
    let mut lifecycle = session.handle.subscribe_to(&[EventTopic::Lifecycle]);

    let result = session.handle.authenticate(create_test_jid(), "wrong").await;
    assert_eq!(result, Err(ConnectError::AuthFailure.into()));
    assert_eq!(
        next_event(&mut lifecycle).await,
        AppEvent::Disconnected {
            reason: Some("Failed to authenticate".to_string())
        }
    );

    let snapshot = session.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.state, LinkState::Idle);
    assert_eq!(snapshot.status, SessionStatus::default());
    assert!(!snapshot.has_credential);
    assert!(!snapshot.has_transport);
    assert!(!snapshot.reconnect_scheduled);
    assert_eq!(session.probe.disconnect_reasons(), vec!["closed".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_connect_timeout_is_reported_to_caller() {
    let session = create_test_session(MockBehavior::failing(TransportStatus::ConnectTimeout));

    let result = session.handle.authenticate(create_test_jid(), "secret").await;
    assert_eq!(result, Err(ConnectError::ConnectTimeout.into()));

    let snapshot = session.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.state, LinkState::Idle);
    assert!(!snapshot.reconnect_scheduled);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_during_handshake_rejects_authenticate() {
    let session = create_test_session(MockBehavior::manual());

    let handle = session.handle.clone();
    let pending = tokio::spawn(async move { handle.authenticate(create_test_jid(), "secret").await });
    session.probe.wait_for_connects(1).await;
    assert!(session.probe.drop_connection());

    let result = pending.await.unwrap();
    assert_eq!(result, Err(ConnectError::Disconnected.into()));

    let snapshot = session.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.state, LinkState::Idle);
    assert!(!snapshot.reconnect_scheduled);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_connection_reconnects_after_interval() {
    let config = BrokerConfig::testing().with_session(SessionConfig::default());
    let session = create_connected_session(config).await;
    let mut lifecycle = session.handle.subscribe_to(&[EventTopic::Lifecycle]);

    let dropped_at = Instant::now();
    assert!(session.probe.drop_connection());

    let snapshot = session.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.state, LinkState::Disconnected);
    assert!(snapshot.reconnect_scheduled);
    assert!(snapshot.has_credential);
    assert!(!snapshot.receivers_bound);
    assert!(!snapshot.status.connected);
    assert!(!snapshot.status.connecting);

    assert_eq!(
        next_event(&mut lifecycle).await,
        AppEvent::Connected {
            jid: create_test_jid()
        }
    );
    assert!(dropped_at.elapsed() >= Duration::from_secs(5));
    assert!(dropped_at.elapsed() < Duration::from_secs(6));

    assert_eq!(session.probe.connect_count(), 2);
    let sent = session.probe.wait_for_sent(2).await;
    assert_eq!(sent, vec![stanza::presence(), stanza::presence()]);

    let snapshot = session.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.state, LinkState::Connected);
    assert!(snapshot.receivers_bound);
    assert_eq!(snapshot.reconnect_attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn test_rescheduling_keeps_only_latest_timer() {
    let session = create_connected_session(BrokerConfig::testing()).await;

    assert!(session.probe.drop_connection());
    let rescheduled_at = Instant::now();
    session
        .handle
        .reconnect(Duration::from_millis(300))
        .await
        .unwrap();

    session.probe.wait_for_connects(2).await;
    assert!(rescheduled_at.elapsed() >= Duration::from_millis(300));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(session.probe.connect_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_requires_credentials_and_no_link() {
    let session = create_test_session(MockBehavior::default());

    let result = session.handle.reconnect(Duration::from_millis(10)).await;
    assert_eq!(result, Err(ConnectError::NoCredential.into()));

    session
        .handle
        .authenticate(create_test_jid(), "secret")
        .await
        .unwrap();
    let result = session.handle.reconnect(Duration::from_millis(10)).await;
    assert_eq!(result, Err(ConnectError::ConnectionActive.into()));
}

#[tokio::test(start_paused = true)]
async fn test_failed_reconnect_waits_for_explicit_reconnect() {
    let session = create_connected_session(BrokerConfig::testing()).await;

    session
        .probe
        .set_behavior(MockBehavior::failing(TransportStatus::ConnectFailure));
    assert!(session.probe.drop_connection());
    session.probe.wait_for_connects(2).await;

    let snapshot = session.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.state, LinkState::Disconnected);
    assert!(snapshot.has_credential);
    assert!(!snapshot.reconnect_scheduled);
    assert_eq!(snapshot.jid, Some(create_test_jid()));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(session.probe.connect_count(), 2);

    session.probe.set_behavior(MockBehavior::default());
    session
        .handle
        .reconnect(Duration::from_millis(10))
        .await
        .unwrap();
    session.probe.wait_for_connects(3).await;

    let snapshot = session.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.state, LinkState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_gives_up_after_max_attempts() {
    let config = BrokerConfig::testing().with_session(SessionConfig {
        max_reconnect_attempts: Some(1),
        ..SessionConfig::testing()
    });
    let session = create_connected_session(config).await;
    let mut lifecycle = session.handle.subscribe_to(&[EventTopic::Lifecycle]);

    session.probe.set_behavior(MockBehavior::manual());
    assert!(session.probe.drop_connection());
    session.probe.wait_for_connects(2).await;
    assert!(session.probe.drop_connection());

    match next_event(&mut lifecycle).await {
        AppEvent::Disconnected { reason } => {
            assert_eq!(
                reason.as_deref(),
                Some("Gave up reconnecting after 1 attempts")
            );
        }
        other => panic!("unexpected event: {:?}", other),
    }

    let snapshot = session.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.state, LinkState::Idle);
    assert!(!snapshot.has_credential);
    assert!(!snapshot.reconnect_scheduled);
}

#[tokio::test(start_paused = true)]
async fn test_logout_clears_without_reconnecting() {
    let session = create_connected_session(BrokerConfig::testing()).await;
    let mut lifecycle = session.handle.subscribe_to(&[EventTopic::Lifecycle]);

    session.handle.logout().await.unwrap();
    assert_eq!(
        next_event(&mut lifecycle).await,
        AppEvent::Disconnected { reason: None }
    );

    let snapshot = session.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.state, LinkState::Idle);
    assert_eq!(snapshot.jid, None);
    assert!(!snapshot.has_credential);
    assert!(!snapshot.has_transport);
    assert!(!snapshot.reconnect_scheduled);
    assert_eq!(session.probe.disconnect_reasons(), vec!["logout".to_string()]);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(session.probe.connect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_logout_cancels_pending_reconnect() {
    let session = create_connected_session(BrokerConfig::testing()).await;

    assert!(session.probe.drop_connection());
    session.handle.logout().await.unwrap();

    let snapshot = session.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.state, LinkState::Idle);
    assert!(!snapshot.reconnect_scheduled);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(session.probe.connect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_authenticate_after_logout() {
    let session = create_connected_session(BrokerConfig::testing()).await;
    session.handle.logout().await.unwrap();

    tokio_test::assert_ok!(session.handle.authenticate(create_test_jid(), "secret").await);
    assert_eq!(session.probe.connect_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_task() {
    let session = create_connected_session(BrokerConfig::testing()).await;
    let mut lifecycle = session.handle.subscribe_to(&[EventTopic::Lifecycle]);

    session.handle.shutdown().await.unwrap();
    session.task.await.unwrap().unwrap();

    assert_eq!(
        next_event(&mut lifecycle).await,
        AppEvent::Disconnected { reason: None }
    );
    assert!(!session.handle.is_running());
    assert_eq!(session.probe.disconnect_reasons(), vec!["shutdown".to_string()]);
    assert!(matches!(
        session.handle.snapshot().await,
        Err(BrokerError::Channel { .. })
    ));
}
