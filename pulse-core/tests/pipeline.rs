//! End-to-end tests for the telemetry pipeline.
//!
//! These tests drive a coordinator through a scripted connector:
//! - Connect after refused attempts
//! - Stream metrics, logs and alerts
//! - Recover from a dropped connection
//! - Stop and restart
//!
//! Time is paused, so backoff and coalescing schedules are deterministic.

use pulse_core::transport::scripted::{Peer, ScriptedConnector};
use pulse_core::{
    AlertStatus, Channel, ConnectionState, Coordinator, LogLevel, Payload, PulseConfig, Viewport,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;

const ENDPOINT: &str = "ws://console.test/api/v1/ws/metrics";

fn test_config() -> PulseConfig {
    let mut config = PulseConfig::default();
    config.backoff.base_ms = 100;
    config.backoff.max_ms = 1_000;
    config.backoff.jitter = false;
    config.idle_timeout_secs = 0;
    config
}

fn metric(name: &str, t: i64, value: f64) -> String {
    format!(r#"{{"type":"metric","data":{{"name":"{name}","value":{value}}},"timestamp":{t}}}"#)
}

async fn wait_for_open(state: &mut watch::Receiver<ConnectionState>) {
    state.wait_for(|s| s.is_open()).await.unwrap();
}

async fn next_flush(flushes: &mut broadcast::Receiver<pulse_core::FlushEvent>) -> (String, usize) {
    let event = flushes.recv().await.unwrap();
    (event.channel.to_string(), event.batch_len)
}

#[tokio::test(start_paused = true)]
async fn test_connects_after_refusals_and_streams() {
    let connector = Arc::new(ScriptedConnector::new());
    connector.refuse("connection refused");
    connector.refuse("connection refused");
    let peer = connector.accept();

    let coordinator = Coordinator::new(&test_config(), connector.clone()).unwrap();
    let mut state = coordinator.subscribe_state();
    let mut flushes = coordinator.subscribe_flushes();

    let started = Instant::now();
    coordinator.start(ENDPOINT).unwrap();
    wait_for_open(&mut state).await;

    // 100ms + 200ms of backoff before the third attempt succeeds
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(300) && elapsed < Duration::from_millis(310));
    assert_eq!(connector.attempts(), 3);

    peer.send(metric("cpu", 1_000, 12.5));
    peer.send(metric("cpu", 2_000, 13.5));
    assert_eq!(next_flush(&mut flushes).await, ("metric:cpu".to_string(), 2));

    let window = coordinator.channel_snapshot(&Channel::metric("cpu"), Viewport::new(0, 10));
    let values: Vec<f64> = window.items.iter().filter_map(|s| s.payload.value()).collect();
    assert_eq!(values, vec![12.5, 13.5]);

    let stats = coordinator.stats();
    assert_eq!(stats.session.connect_failures, 2);
    assert_eq!(stats.session.samples_decoded, 2);
    assert_eq!(stats.buffered, 2);
}

#[tokio::test(start_paused = true)]
async fn test_logs_and_alerts_are_routed_to_their_channels() {
    let connector = Arc::new(ScriptedConnector::new());
    let peer = connector.accept();
    let coordinator = Coordinator::new(&test_config(), connector).unwrap();
    let mut flushes = coordinator.subscribe_flushes();
    coordinator.start(ENDPOINT).unwrap();

    peer.send(
        r#"{"type":"log","data":{"level":"WARNING","source":"vm-7","message":"disk 91% full"},"timestamp":"2024-05-01T10:00:00Z"}"#,
    );
    peer.send(
        r#"{"type":"alert","data":{"id":"a-1","level":"critical","message":"node down","target":"node-3","status":"active"},"timestamp":"2024-05-01T10:00:01Z"}"#,
    );
    peer.send("not json at all");

    let mut seen = vec![next_flush(&mut flushes).await, next_flush(&mut flushes).await];
    seen.sort();
    assert_eq!(seen, vec![("alert".to_string(), 1), ("log".to_string(), 1)]);

    let logs = coordinator.channel_tail(&Channel::log(), 50);
    match &logs.items[0].payload {
        Payload::Log(record) => {
            assert_eq!(record.level, LogLevel::Warn);
            assert_eq!(record.message, "disk 91% full");
        }
        other => panic!("expected log payload, got {other:?}"),
    }

    let alerts = coordinator.channel_tail(&Channel::alert(), 50);
    match &alerts.items[0].payload {
        Payload::Alert(record) => {
            assert_eq!(record.id, "a-1");
            assert_eq!(record.status, AlertStatus::Active);
        }
        other => panic!("expected alert payload, got {other:?}"),
    }

    assert_eq!(coordinator.stats().session.malformed_dropped, 1);
}

#[tokio::test(start_paused = true)]
async fn test_reconnects_after_drop_and_keeps_history() {
    let connector = Arc::new(ScriptedConnector::new());
    let first = connector.accept();
    let second = connector.accept();

    let coordinator = Coordinator::new(&test_config(), connector.clone()).unwrap();
    let mut state = coordinator.subscribe_state();
    let mut flushes = coordinator.subscribe_flushes();
    coordinator.start(ENDPOINT).unwrap();
    wait_for_open(&mut state).await;

    first.send(metric("memory", 1, 40.0));
    next_flush(&mut flushes).await;

    first.close();
    state.wait_for(|s| s.attempt() == Some(1)).await.unwrap();
    wait_for_open(&mut state).await;
    assert_eq!(connector.attempts(), 2);

    second.send(metric("memory", 2, 41.0));
    next_flush(&mut flushes).await;

    let window = coordinator.channel_snapshot(&Channel::metric("memory"), Viewport::new(0, 10));
    assert_eq!(window.total, 2);
    assert_eq!(coordinator.stats().session.disconnects, 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_halts_reconnects_and_restart_resumes() {
    let connector = Arc::new(ScriptedConnector::new());
    connector.refuse("connection refused");
    let peer: Peer = connector.accept();

    let coordinator = Coordinator::new(&test_config(), connector.clone()).unwrap();
    let mut state = coordinator.subscribe_state();
    coordinator.start(ENDPOINT).unwrap();
    state.wait_for(|s| s.attempt() == Some(1)).await.unwrap();

    coordinator.stop();
    assert_eq!(coordinator.connection_state(), ConnectionState::Disconnected);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(connector.attempts(), 1);
    assert_eq!(coordinator.connection_state(), ConnectionState::Disconnected);

    coordinator.start(ENDPOINT).unwrap();
    wait_for_open(&mut state).await;
    assert_eq!(connector.attempts(), 2);
    assert!(peer.send(metric("cpu", 1, 1.0)));
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_is_answered() {
    let connector = Arc::new(ScriptedConnector::new());
    let peer = connector.accept();
    let coordinator = Coordinator::new(&test_config(), connector).unwrap();
    let mut flushes = coordinator.subscribe_flushes();
    coordinator.start(ENDPOINT).unwrap();

    peer.send("ping");
    peer.send(metric("cpu", 1, 1.0));
    next_flush(&mut flushes).await;

    assert_eq!(peer.received(), vec!["pong".to_string()]);
}
