//! Geographic fix value type shared by every component.
//!
//! A [`Fix`] is one sample of the emulated receiver: a position, motion data,
//! a timestamp and the pacing hints (hold duration and transition mode) that
//! tell the broadcast loop how long to stay on it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Shortest hold duration a fix may carry, in seconds.
pub const MIN_HOLD_SECS: f64 = 0.1;

/// Longest hold duration a fix may carry (one day), in seconds.
pub const MAX_HOLD_SECS: f64 = 86_400.0;

/// Hold duration used when a source does not specify one.
pub const DEFAULT_HOLD_SECS: f64 = 1.0;

/// Errors raised while building fix values.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FixError {
    #[error("Latitude out of range: {0} (expected -90..=90)")]
    LatitudeOutOfRange(f64),

    #[error("Longitude out of range: {0} (expected -180..=180)")]
    LongitudeOutOfRange(f64),

    #[error("Invalid transition mode: {0:?} (expected auto, manual or key)")]
    InvalidTransition(String),
}

/// How the stream advances past a fix once it has been emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionMode {
    /// Advance after the fix's hold duration has elapsed.
    #[default]
    Auto,
    /// Advance only when an external advance signal arrives.
    #[serde(alias = "key")]
    Manual,
}

impl fmt::Display for TransitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionMode::Auto => write!(f, "auto"),
            TransitionMode::Manual => write!(f, "manual"),
        }
    }
}

impl FromStr for TransitionMode {
    type Err = FixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(TransitionMode::Auto),
            // "key" is the legacy spelling of manual advance
            "manual" | "key" => Ok(TransitionMode::Manual),
            _ => Err(FixError::InvalidTransition(s.to_string())),
        }
    }
}

/// A latitude/longitude pair in decimal degrees, always within WGS84 range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    /// Create a coordinate, rejecting values outside the valid range.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, FixError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(FixError::LatitudeOutOfRange(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(FixError::LongitudeOutOfRange(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Create a coordinate by clamping latitude and wrapping longitude into range.
    ///
    /// Non-finite inputs collapse to zero.
    pub fn wrapped(latitude: f64, longitude: f64) -> Self {
        let latitude = if latitude.is_finite() {
            latitude.clamp(-90.0, 90.0)
        } else {
            0.0
        };
        let longitude = if longitude.is_finite() {
            wrap_longitude(longitude)
        } else {
            0.0
        };
        Self {
            latitude,
            longitude,
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// Wrap a longitude into [-180, 180].
fn wrap_longitude(longitude: f64) -> f64 {
    if (-180.0..=180.0).contains(&longitude) {
        return longitude;
    }
    let wrapped = (longitude + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && longitude > 0.0 {
        180.0
    } else {
        wrapped
    }
}

/// One geographic sample of the emulated receiver.
///
/// Fixes are immutable: the `with_*` methods consume the value and return a
/// new one, applying the same normalization as construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Fix {
    sequence_index: i64,
    coordinate: Coordinate,
    speed_kmh: f64,
    elevation_meters: f64,
    timestamp: DateTime<Utc>,
    hold_duration_secs: f64,
    transition: TransitionMode,
    description: String,
}

impl Fix {
    /// Create a stationary fix with default hold duration and auto transition.
    pub fn new(sequence_index: i64, coordinate: Coordinate, timestamp: DateTime<Utc>) -> Self {
        Self {
            sequence_index,
            coordinate,
            speed_kmh: 0.0,
            elevation_meters: 0.0,
            timestamp,
            hold_duration_secs: DEFAULT_HOLD_SECS,
            transition: TransitionMode::Auto,
            description: String::new(),
        }
    }

    /// Set speed over ground; negative or non-finite values become zero.
    pub fn with_speed_kmh(mut self, speed_kmh: f64) -> Self {
        self.speed_kmh = if speed_kmh.is_finite() {
            speed_kmh.max(0.0)
        } else {
            0.0
        };
        self
    }

    /// Set elevation above sea level; non-finite values become zero.
    pub fn with_elevation_meters(mut self, elevation_meters: f64) -> Self {
        self.elevation_meters = if elevation_meters.is_finite() {
            elevation_meters
        } else {
            0.0
        };
        self
    }

    /// Set the hold duration, clamped to [`MIN_HOLD_SECS`]..=[`MAX_HOLD_SECS`].
    pub fn with_hold_duration_secs(mut self, secs: f64) -> Self {
        self.hold_duration_secs = clamp_hold(secs);
        self
    }

    pub fn with_transition(mut self, transition: TransitionMode) -> Self {
        self.transition = transition;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_sequence_index(mut self, sequence_index: i64) -> Self {
        self.sequence_index = sequence_index;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn sequence_index(&self) -> i64 {
        self.sequence_index
    }

    pub fn coordinate(&self) -> Coordinate {
        self.coordinate
    }

    pub fn latitude(&self) -> f64 {
        self.coordinate.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.coordinate.longitude
    }

    pub fn speed_kmh(&self) -> f64 {
        self.speed_kmh
    }

    pub fn elevation_meters(&self) -> f64 {
        self.elevation_meters
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn hold_duration_secs(&self) -> f64 {
        self.hold_duration_secs
    }

    /// Hold duration as a [`std::time::Duration`].
    pub fn hold_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.hold_duration_secs)
    }

    pub fn transition(&self) -> TransitionMode {
        self.transition
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

fn clamp_hold(secs: f64) -> f64 {
    if secs.is_nan() {
        MIN_HOLD_SECS
    } else {
        secs.clamp(MIN_HOLD_SECS, MAX_HOLD_SECS)
    }
}
