//! GeoJSON route parser.
//!
//! Reads a FeatureCollection of `Point` features. Geometry coordinates are
//! `[lon, lat]` or `[lon, lat, elevation]`; properties `speed`, `elevation`,
//! `duration`, `transition` and `description` are all optional.

use super::{placeholder_time, ImportError, ImportResult, ImportWarning};
use crate::fix::{Coordinate, Fix, TransitionMode, DEFAULT_HOLD_SECS};
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Option<Geometry>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Value,
}

/// Parse GeoJSON content to fixes
pub fn parse_geojson(content: &str) -> Result<ImportResult, ImportError> {
    let collection: FeatureCollection = serde_json::from_str(content)
        .map_err(|e| ImportError::InvalidFormat(format!("GeoJSON parse error: {}", e)))?;

    let mut fixes = Vec::new();
    let mut warnings = Vec::new();

    for (feature_index, feature) in collection.features.into_iter().enumerate() {
        let geometry = match feature.geometry {
            Some(geometry) if geometry.kind == "Point" => geometry,
            other => {
                warnings.push(ImportWarning::SkippedFeature {
                    index: feature_index,
                    geometry: other.map_or_else(|| "no".to_string(), |g| g.kind),
                });
                continue;
            }
        };

        let location = format!("feature {}", feature_index);
        let coords: Vec<f64> = serde_json::from_value(geometry.coordinates).map_err(|e| {
            ImportError::InvalidFormat(format!("{}: bad coordinates: {}", location, e))
        })?;
        if coords.len() < 2 {
            return Err(ImportError::InvalidFormat(format!(
                "{}: expected [lon, lat]",
                location
            )));
        }
        let coordinate = Coordinate::new(coords[1], coords[0])
            .map_err(|e| ImportError::InvalidFormat(format!("{}: {}", location, e)))?;

        let props = feature.properties.unwrap_or_default();
        let speed = number_property(&props, "speed", &location)?.unwrap_or(0.0);
        let elevation = number_property(&props, "elevation", &location)?
            .or_else(|| coords.get(2).copied())
            .unwrap_or(0.0);
        let duration = number_property(&props, "duration", &location)?.unwrap_or(DEFAULT_HOLD_SECS);
        let transition = match props.get("transition") {
            Some(Value::String(s)) => s
                .parse::<TransitionMode>()
                .map_err(|e| ImportError::InvalidFormat(format!("{}: {}", location, e)))?,
            _ => TransitionMode::Auto,
        };
        let description = match props.get("description") {
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        };

        let index = fixes.len() as i64 + 1;
        fixes.push(
            Fix::new(index, coordinate, placeholder_time())
                .with_speed_kmh(speed)
                .with_elevation_meters(elevation)
                .with_hold_duration_secs(duration)
                .with_transition(transition)
                .with_description(description),
        );
    }

    if fixes.is_empty() {
        return Err(ImportError::NoPoints);
    }

    Ok(ImportResult { fixes, warnings })
}

/// Read a numeric property, accepting numbers or numeric strings.
fn number_property(
    props: &Map<String, Value>,
    key: &str,
    location: &str,
) -> Result<Option<f64>, ImportError> {
    let invalid = || ImportError::InvalidFormat(format!("{}: invalid {}", location, key));
    match props.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_f64().map(Some).ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().parse::<f64>().map(Some).map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}
