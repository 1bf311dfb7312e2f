//! End-to-end test: circular source through the server to a TCP client

use lode::nmea::{decode_sentence, Sentence};
use lode::server::{BroadcastServer, ServerConfig, ServerEvent, StopReason};
use lode::source::circular::KM_PER_DEGREE;
use lode::source::{build_source, CircularParams, SourceConfig};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;

#[tokio::test]
async fn test_dynamic_stream_first_fix() {
    let params = CircularParams {
        speed_kmh: 36.0,
        duration_secs: 1.0,
        radius_km: 1.0,
        ..CircularParams::new(0.0, 0.0)
    };
    let source = build_source(&SourceConfig::Dynamic(params)).unwrap();

    let config = ServerConfig {
        wait_for_start: true,
        ..ServerConfig::local()
    };
    let server = BroadcastServer::bind(config).await.unwrap();
    let addr = server.local_addr();
    let advance = server.advance_signal();
    let shutdown = server.shutdown_handle();
    let mut events = server.subscribe_events();
    let task = tokio::spawn(server.run(source));

    let stream = TcpStream::connect(addr).await.unwrap();
    loop {
        if let ServerEvent::ClientConnected { .. } = events.recv().await.unwrap() {
            break;
        }
    }
    advance.trigger();

    let mut lines = BufReader::new(stream).lines();
    let rmc = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let gga = lines.next_line().await.unwrap().unwrap();

    assert!(rmc.starts_with("$GPRMC,"));
    assert!(gga.starts_with("$GPGGA,"));
    // 36 km/h is 19.438 knots
    assert_eq!(rmc.split(',').nth(7), Some("19.4"));

    let Sentence::Rmc(data) = decode_sentence(&rmc).unwrap() else {
        panic!("expected RMC");
    };
    let d_lat = data.coordinate.latitude() * KM_PER_DEGREE;
    let d_lon = data.coordinate.longitude() * KM_PER_DEGREE;
    let moved_km = (d_lat * d_lat + d_lon * d_lon).sqrt();
    assert!((moved_km - 0.01).abs() < 0.001, "moved {} km", moved_km);

    shutdown.shutdown();
    let summary = task.await.unwrap().unwrap();
    assert_eq!(summary.fixes_emitted, 1);
    assert_eq!(summary.reason, StopReason::Shutdown);
}
