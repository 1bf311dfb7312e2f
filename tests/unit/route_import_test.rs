//! Unit tests for route file import

use lode::fix::TransitionMode;
use lode::import::{detect_format, load_route, ImportError, ImportWarning, RouteFormat};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_detect_format_case_insensitive() {
    assert_eq!(
        detect_format(Path::new("ROUTE.GEOJSON")).unwrap(),
        RouteFormat::GeoJson
    );
    assert_eq!(detect_format(Path::new("log.TXT")).unwrap(), RouteFormat::Nmea);
    assert!(matches!(
        detect_format(Path::new("track.gpx")),
        Err(ImportError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_load_geojson_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        &dir,
        "route.geojson",
        r#"{
          "type": "FeatureCollection",
          "features": [
            {"type": "Feature",
             "geometry": {"type": "Point", "coordinates": [-122.4194, 37.7749]},
             "properties": {"speed": 25, "transition": "key", "description": "Ferry building"}},
            {"type": "Feature",
             "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]}}
          ]
        }"#,
    );

    let format = detect_format(&path).unwrap();
    let result = load_route(&path, format).unwrap();
    assert_eq!(result.fixes.len(), 1);
    assert_eq!(result.warnings.len(), 1);
    assert!(matches!(
        result.warnings[0],
        ImportWarning::SkippedFeature { index: 1, .. }
    ));

    let fix = &result.fixes[0];
    assert!((fix.latitude() - 37.7749).abs() < 1e-9);
    assert!((fix.longitude() + 122.4194).abs() < 1e-9);
    assert_eq!(fix.speed_kmh(), 25.0);
    assert_eq!(fix.hold_duration_secs(), 1.0);
    assert_eq!(fix.transition(), TransitionMode::Manual);
    assert_eq!(fix.description(), "Ferry building");
}

#[test]
fn test_load_csv_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        &dir,
        "route.csv",
        "7,10.0,20.0,5.5\n8,10.1,20.1,6.5,100,3,manual\n",
    );

    let result = load_route(&path, RouteFormat::Csv).unwrap();
    let indices: Vec<i64> = result.fixes.iter().map(|f| f.sequence_index()).collect();
    assert_eq!(indices, vec![1, 2]);
    assert_eq!(result.fixes[1].hold_duration_secs(), 3.0);
    assert_eq!(result.fixes[1].transition(), TransitionMode::Manual);
}

#[test]
fn test_csv_zero_duration_clamped() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "route.csv", "1,10.0,20.0,5,0,0\n");
    let result = load_route(&path, RouteFormat::Csv).unwrap();
    assert_eq!(
        result.fixes[0].hold_duration_secs(),
        lode::fix::MIN_HOLD_SECS
    );
}

#[test]
fn test_csv_out_of_range_latitude() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "route.csv", "1,10.0,20.0\n2,95.0,20.0\n");
    assert!(matches!(
        load_route(&path, RouteFormat::Csv),
        Err(ImportError::Parse { line: 2, .. })
    ));
}

#[test]
fn test_nmea_without_fixes() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "empty.nmea", "\n\nnot nmea at all\n");
    assert!(matches!(
        load_route(&path, RouteFormat::Nmea),
        Err(ImportError::NoPoints)
    ));
}

#[test]
fn test_geojson_not_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "broken.geojson", "{ features: ");
    assert!(matches!(
        load_route(&path, RouteFormat::GeoJson),
        Err(ImportError::InvalidFormat(_))
    ));
}
