//! Unit tests for NMEA sentence encoding and decoding

use chrono::{NaiveDate, TimeZone, Utc};
use lode::fix::{Coordinate, Fix};
use lode::nmea::{checksum, decode_sentence, NmeaEncoder, NmeaError, NmeaLogDecoder, Sentence};

fn fix(lat: f64, lon: f64, speed: f64, ele: f64) -> Fix {
    let time = Utc.with_ymd_and_hms(2023, 11, 5, 7, 8, 9).unwrap();
    Fix::new(1, Coordinate::new(lat, lon).unwrap(), time)
        .with_speed_kmh(speed)
        .with_elevation_meters(ele)
}

/// Payload between `$` and `*`, and the two checksum digits.
fn split(sentence: &str) -> (&str, &str) {
    let body = sentence.trim_end().strip_prefix('$').unwrap();
    body.rsplit_once('*').unwrap()
}

#[test]
fn test_round_trip_recovers_fix() {
    let encoder = NmeaEncoder::new().with_speed_decimals(2);
    let fixes = [
        fix(55.752_2, 37.615_6, 42.3, 156.7),
        fix(-33.856_8, 151.215_3, 7.77, 3.0),
        fix(40.689_2, -74.044_5, 0.0, -12.4),
        fix(-0.000_01, -179.999_99, 120.0, 4_000.0),
    ];

    let fallback = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
    for sent in &fixes {
        let wire = encoder.encode(sent).to_wire();
        let log = NmeaLogDecoder::decode_str(&wire, fallback);
        assert!(log.warnings.is_empty(), "{:?}", log.warnings);
        assert_eq!(log.fixes.len(), 1);

        let decoded = &log.fixes[0];
        assert!((decoded.latitude() - sent.latitude()).abs() <= 1e-4);
        assert!((decoded.longitude() - sent.longitude()).abs() <= 1e-4);
        assert!((decoded.speed_kmh() - sent.speed_kmh()).abs() < 0.01);
        assert!((decoded.elevation_meters() - sent.elevation_meters()).abs() < 0.05);
        assert_eq!(decoded.timestamp(), sent.timestamp());
    }
}

#[test]
fn test_hemispheres() {
    let pair = NmeaEncoder::new().encode(&fix(-33.5, -70.25, 0.0, 0.0));
    let (payload, _) = split(&pair.rmc);
    let fields: Vec<&str> = payload.split(',').collect();
    assert_eq!(&fields[3..7], &["3330.0000", "S", "07015.0000", "W"]);

    let (payload, _) = split(&pair.gga);
    let fields: Vec<&str> = payload.split(',').collect();
    assert_eq!(&fields[2..6], &["3330.0000", "S", "07015.0000", "W"]);
}

#[test]
fn test_checksum_matches_payload() {
    let pair = NmeaEncoder::new().encode(&fix(12.34, 56.78, 15.0, 90.0));
    for sentence in pair.iter() {
        assert!(sentence.ends_with("\r\n"));
        let (payload, sum) = split(sentence);
        assert_eq!(sum, format!("{:02X}", checksum(payload)));
    }
}

#[test]
fn test_corrupted_payload_is_rejected() {
    let pair = NmeaEncoder::new().encode(&fix(12.34, 56.78, 15.0, 90.0));
    for sentence in pair.iter() {
        assert!(decode_sentence(sentence).is_ok());

        // Flip one digit of the latitude field
        let corrupted = sentence.replacen("1220.4000", "1220.4001", 1);
        assert_ne!(corrupted, sentence);
        assert!(matches!(
            decode_sentence(&corrupted),
            Err(NmeaError::ChecksumMismatch { .. })
        ));
    }
}

#[test]
fn test_decode_other_talkers() {
    let gga = lode::nmea::encoder::frame(
        "GNGGA,070809.000,1220.4000,N,05646.8000,E,1,08,1.0,90.0,M,0.0,M,,",
    );
    match decode_sentence(&gga).unwrap() {
        Sentence::Gga(data) => {
            assert!((data.coordinate.latitude() - 12.34).abs() < 1e-9);
            assert!((data.elevation_meters - 90.0).abs() < 1e-9);
        }
        other => panic!("unexpected sentence: {:?}", other),
    }
}

#[test]
fn test_void_rmc_is_rejected() {
    let rmc = lode::nmea::encoder::frame(
        "GPRMC,070809.000,V,1220.4000,N,05646.8000,E,0.0,0.0,051123,,,N",
    );
    assert!(matches!(decode_sentence(&rmc), Err(NmeaError::InvalidFix)));
}

#[test]
fn test_pairing_defaults() {
    let encoder = NmeaEncoder::new();
    let a = encoder.encode(&fix(1.0, 2.0, 30.0, 10.0));
    let b = encoder.encode(&fix(1.1, 2.1, 40.0, 20.0));

    // GGA first, then an RMC with no GGA after it
    let wire = format!("{}{}", a.gga, b.rmc);
    let fallback = NaiveDate::from_ymd_opt(2020, 2, 2).unwrap();
    let log = NmeaLogDecoder::decode_str(&wire, fallback);
    assert_eq!(log.fixes.len(), 2);

    let lone_gga = &log.fixes[0];
    assert_eq!(lone_gga.speed_kmh(), 0.0);
    assert!((lone_gga.elevation_meters() - 10.0).abs() < 1e-9);
    assert_eq!(lone_gga.timestamp().date_naive(), fallback);

    let lone_rmc = &log.fixes[1];
    assert_eq!(lone_rmc.elevation_meters(), 0.0);
    assert!((lone_rmc.speed_kmh() - 40.0).abs() < 0.1);
    assert_eq!(lone_rmc.sequence_index(), 2);
}
