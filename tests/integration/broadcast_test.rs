//! Integration tests for the TCP broadcast server
//!
//! Real loopback sockets on ephemeral ports; emission is driven by the
//! server's advance signal so every step is deterministic.

use chrono::{TimeZone, Utc};
use lode::fix::{Coordinate, Fix, TransitionMode};
use lode::nmea::NmeaEncoder;
use lode::server::{BroadcastServer, ServerConfig, ServerEvent, StopReason};
use lode::source::{ReplayOptions, ReplaySource, TimestampPolicy};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::broadcast;

const STEP_TIMEOUT: Duration = Duration::from_secs(5);

fn manual_route() -> Vec<Fix> {
    (0..3)
        .map(|i| {
            let time = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, i).unwrap();
            Fix::new(
                i as i64 + 1,
                Coordinate::new(48.1173 + i as f64 * 0.001, 11.5167).unwrap(),
                time,
            )
            .with_speed_kmh(20.0)
            .with_elevation_meters(545.4)
            .with_transition(TransitionMode::Manual)
        })
        .collect()
}

fn recorded(fixes: Vec<Fix>) -> ReplaySource {
    let options = ReplayOptions {
        timestamps: TimestampPolicy::Recorded,
        ..Default::default()
    };
    ReplaySource::new("test", fixes, options).unwrap()
}

fn gated_config() -> ServerConfig {
    ServerConfig {
        wait_for_start: true,
        ..ServerConfig::local()
    }
}

async fn wait_for_clients(events: &mut broadcast::Receiver<ServerEvent>, count: usize) {
    let mut connected = 0;
    while connected < count {
        let event = tokio::time::timeout(STEP_TIMEOUT, events.recv())
            .await
            .expect("timed out waiting for clients")
            .unwrap();
        if let ServerEvent::ClientConnected { .. } = event {
            connected += 1;
        }
    }
}

async fn read_exactly(stream: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    tokio::time::timeout(STEP_TIMEOUT, stream.read_exact(&mut buf))
        .await
        .expect("timed out reading from server")
        .unwrap();
    buf
}

#[tokio::test]
async fn test_clients_receive_identical_bytes() {
    let route = manual_route();
    let encoder = NmeaEncoder::new();
    let expected: Vec<String> = route.iter().map(|f| encoder.encode(f).to_wire()).collect();

    let server = BroadcastServer::bind(gated_config()).await.unwrap();
    let addr = server.local_addr();
    let advance = server.advance_signal();
    let mut events = server.subscribe_events();
    let task = tokio::spawn(server.run(recorded(route)));

    let mut clients = Vec::new();
    for _ in 0..3 {
        clients.push(TcpStream::connect(addr).await.unwrap());
    }
    wait_for_clients(&mut events, 3).await;

    // Start gate
    advance.trigger();
    for client in &mut clients {
        let bytes = read_exactly(client, expected[0].len()).await;
        assert_eq!(bytes, expected[0].as_bytes());
    }

    // One client leaves; the other two keep receiving
    drop(clients.remove(0));
    for wire in &expected[1..] {
        advance.trigger();
        for client in &mut clients {
            let bytes = read_exactly(client, wire.len()).await;
            assert_eq!(bytes, wire.as_bytes());
        }
    }

    // Release the last manual fix
    advance.trigger();
    let summary = tokio::time::timeout(STEP_TIMEOUT, task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(summary.fixes_emitted, 3);
    assert_eq!(summary.clients_served, 3);
    assert_eq!(summary.reason, StopReason::SourceExhausted);

    for client in &mut clients {
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    // The departed client was pruned by a failed write
    let mut dropped = 0;
    let mut last_delivered = None;
    while let Ok(event) = events.try_recv() {
        match event {
            ServerEvent::ClientDropped { .. } => dropped += 1,
            ServerEvent::FixEmitted {
                sequence_index: 3,
                clients,
            } => last_delivered = Some(clients),
            _ => {}
        }
    }
    assert_eq!(dropped, 1);
    assert_eq!(last_delivered, Some(2));
}

async fn next_emitted(
    events: &mut broadcast::Receiver<ServerEvent>,
    within: Duration,
) -> Option<i64> {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        match tokio::time::timeout_at(deadline, events.recv()).await {
            Err(_) => return None,
            Ok(event) => {
                if let ServerEvent::FixEmitted { sequence_index, .. } = event.unwrap() {
                    return Some(sequence_index);
                }
            }
        }
    }
}

#[tokio::test]
async fn test_advance_during_auto_hold_is_not_carried_over() {
    let route: Vec<Fix> = manual_route()
        .into_iter()
        .enumerate()
        .map(|(i, fix)| {
            let transition = if i == 1 {
                TransitionMode::Manual
            } else {
                TransitionMode::Auto
            };
            fix.with_transition(transition).with_hold_duration_secs(0.5)
        })
        .collect();

    let server = BroadcastServer::bind(ServerConfig::local()).await.unwrap();
    let advance = server.advance_signal();
    let mut events = server.subscribe_events();
    let task = tokio::spawn(server.run(recorded(route)));

    assert_eq!(next_emitted(&mut events, STEP_TIMEOUT).await, Some(1));

    // Pressed while the first (auto) fix is still holding
    tokio::time::sleep(Duration::from_millis(100)).await;
    advance.trigger();

    assert_eq!(next_emitted(&mut events, STEP_TIMEOUT).await, Some(2));
    assert_eq!(next_emitted(&mut events, Duration::from_millis(1500)).await, None);

    advance.trigger();
    assert_eq!(next_emitted(&mut events, STEP_TIMEOUT).await, Some(3));

    let summary = tokio::time::timeout(STEP_TIMEOUT, task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(summary.fixes_emitted, 3);
    assert_eq!(summary.reason, StopReason::SourceExhausted);
}

#[tokio::test]
async fn test_manual_fix_waits_for_advance() {
    let route = manual_route();
    let first_len = NmeaEncoder::new().encode(&route[0]).to_wire().len();

    let server = BroadcastServer::bind(gated_config()).await.unwrap();
    let addr = server.local_addr();
    let advance = server.advance_signal();
    let shutdown = server.shutdown_handle();
    let mut events = server.subscribe_events();
    let task = tokio::spawn(server.run(recorded(route)));

    let mut client = TcpStream::connect(addr).await.unwrap();
    wait_for_clients(&mut events, 1).await;
    advance.trigger();
    read_exactly(&mut client, first_len).await;

    // Well past the one-second hold of the fix: nothing more may arrive
    let mut buf = [0u8; 1];
    let pending = tokio::time::timeout(Duration::from_millis(1500), client.read(&mut buf)).await;
    assert!(pending.is_err(), "second fix emitted without advance");

    advance.trigger();
    let mut rmc = [0u8; 6];
    tokio::time::timeout(STEP_TIMEOUT, client.read_exact(&mut rmc))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&rmc, b"$GPRMC");

    shutdown.shutdown();
    let summary = task.await.unwrap().unwrap();
    assert_eq!(summary.fixes_emitted, 2);
    assert_eq!(summary.reason, StopReason::Shutdown);
}

#[tokio::test]
async fn test_late_client_joins_stream() {
    let route: Vec<Fix> = manual_route();
    let encoder = NmeaEncoder::new();
    let second = encoder.encode(&route[1]).to_wire();

    let server = BroadcastServer::bind(ServerConfig::local()).await.unwrap();
    let addr = server.local_addr();
    let advance = server.advance_signal();
    let shutdown = server.shutdown_handle();
    let mut events = server.subscribe_events();
    let task = tokio::spawn(server.run(recorded(route)));

    // First fix goes out to nobody
    loop {
        let event = events.recv().await.unwrap();
        if let ServerEvent::FixEmitted { sequence_index: 1, clients } = event {
            assert_eq!(clients, 0);
            break;
        }
    }

    let mut client = TcpStream::connect(addr).await.unwrap();
    wait_for_clients(&mut events, 1).await;
    advance.trigger();

    let bytes = read_exactly(&mut client, second.len()).await;
    assert_eq!(bytes, second.as_bytes());

    shutdown.shutdown();
    let summary = task.await.unwrap().unwrap();
    assert_eq!(summary.clients_served, 1);
}
