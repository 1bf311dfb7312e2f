//! Simulated motion around a circle.
//!
//! Positions use an equirectangular (flat-earth) approximation: one degree of
//! latitude is [`KM_PER_DEGREE`] kilometres and one degree of longitude is
//! that scaled by the cosine of the circle's latitude. This is accurate enough
//! for circles a few kilometres across and makes no attempt at geodesic
//! exactness.

use super::{FixSource, SourceError};
use crate::fix::{Coordinate, Fix, TransitionMode, MIN_HOLD_SECS};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Kilometres per degree of latitude.
pub const KM_PER_DEGREE: f64 = 111.32;

pub const DEFAULT_SPEED_KMH: f64 = 10.0;
pub const DEFAULT_DURATION_SECS: f64 = 1.0;
pub const DEFAULT_RADIUS_KM: f64 = 0.5;

fn default_speed() -> f64 {
    DEFAULT_SPEED_KMH
}

fn default_duration() -> f64 {
    DEFAULT_DURATION_SECS
}

fn default_radius() -> f64 {
    DEFAULT_RADIUS_KM
}

/// Parameters of the circular simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircularParams {
    /// Start latitude in degrees
    pub latitude: f64,
    /// Start longitude in degrees
    pub longitude: f64,
    /// Constant speed along the circle
    #[serde(default = "default_speed")]
    pub speed_kmh: f64,
    /// Time between fixes, also each fix's hold duration
    #[serde(default = "default_duration")]
    pub duration_secs: f64,
    /// Circle radius
    #[serde(default = "default_radius")]
    pub radius_km: f64,
    #[serde(default)]
    pub transition: TransitionMode,
}

impl CircularParams {
    /// Parameters for a circle starting at the given point with default motion.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            speed_kmh: DEFAULT_SPEED_KMH,
            duration_secs: DEFAULT_DURATION_SECS,
            radius_km: DEFAULT_RADIUS_KM,
            transition: TransitionMode::Auto,
        }
    }

    pub fn validate(&self) -> Result<(), SourceError> {
        let invalid = |parameter: &'static str, reason: String| SourceError::InvalidParameter {
            parameter,
            reason,
        };

        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(invalid("latitude", format!("{} is not in -90..=90", self.latitude)));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(invalid(
                "longitude",
                format!("{} is not in -180..=180", self.longitude),
            ));
        }
        if !self.speed_kmh.is_finite() || self.speed_kmh <= 0.0 {
            return Err(invalid("speed", format!("{} must be positive", self.speed_kmh)));
        }
        if !self.duration_secs.is_finite() || self.duration_secs < MIN_HOLD_SECS {
            return Err(invalid(
                "duration",
                format!("{} must be at least {}", self.duration_secs, MIN_HOLD_SECS),
            ));
        }
        if !self.radius_km.is_finite() || self.radius_km <= 0.0 {
            return Err(invalid("radius", format!("{} must be positive", self.radius_km)));
        }
        if self.latitude.abs() + self.radius_km / KM_PER_DEGREE >= 90.0 {
            return Err(invalid(
                "radius",
                format!("circle of {} km would cross a pole", self.radius_km),
            ));
        }
        Ok(())
    }

    /// Radians travelled per fix: arc length per tick over radius.
    pub fn angular_step(&self) -> f64 {
        (self.speed_kmh * self.duration_secs / 3600.0) / self.radius_km
    }

    /// Number of fixes needed to close the loop.
    pub fn steps_per_lap(&self) -> usize {
        (TAU / self.angular_step()).round() as usize
    }
}

/// Endless source moving at constant speed around a circle.
///
/// The start point sits at angle zero; the circle's center lies one radius
/// west of it. Each call advances the angle by one step before producing the
/// fix, so the first fix is one step away from the start and the stream
/// returns to the start after [`CircularParams::steps_per_lap`] calls.
/// Timestamps are wall-clock time at the moment of the call.
#[derive(Debug)]
pub struct CircularSource {
    params: CircularParams,
    center_latitude: f64,
    center_longitude: f64,
    radius_lat_deg: f64,
    radius_lon_deg: f64,
    step: f64,
    angle: f64,
    next_index: i64,
}

impl CircularSource {
    pub fn new(params: CircularParams) -> Result<Self, SourceError> {
        params.validate()?;

        let radius_lat_deg = params.radius_km / KM_PER_DEGREE;
        let radius_lon_deg =
            params.radius_km / (KM_PER_DEGREE * params.latitude.to_radians().cos());

        Ok(Self {
            center_latitude: params.latitude,
            center_longitude: params.longitude - radius_lon_deg,
            radius_lat_deg,
            radius_lon_deg,
            step: params.angular_step(),
            angle: 0.0,
            next_index: 1,
            params,
        })
    }

    pub fn params(&self) -> &CircularParams {
        &self.params
    }

    /// Current angular position in radians, in [0, 2π).
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Position on the circle at `angle` radians.
    pub fn position_at(&self, angle: f64) -> Coordinate {
        let d_lat = self.radius_lat_deg * angle.sin();
        let d_lon = self.radius_lon_deg * angle.cos();
        Coordinate::wrapped(self.center_latitude + d_lat, self.center_longitude + d_lon)
    }
}

impl FixSource for CircularSource {
    fn next_fix(&mut self) -> Option<Fix> {
        self.angle = (self.angle + self.step) % TAU;
        let coordinate = self.position_at(self.angle);

        let fix = Fix::new(self.next_index, coordinate, Utc::now())
            .with_speed_kmh(self.params.speed_kmh)
            .with_hold_duration_secs(self.params.duration_secs)
            .with_transition(self.params.transition);
        self.next_index += 1;

        Some(fix)
    }

    fn name(&self) -> &str {
        "dynamic"
    }
}
