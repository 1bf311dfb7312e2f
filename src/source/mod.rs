//! Fix sources: producers of the ordered fix sequence the server broadcasts.
//!
//! Two variants exist: [`CircularSource`] simulates motion around a circle
//! forever, [`ReplaySource`] plays back a finite, pre-loaded sequence. Source
//! kinds are selected by name through [`SourceKind`] and built from a
//! [`SourceConfig`] by [`build_source`].

pub mod circular;
pub mod replay;

use crate::fix::Fix;
use crate::import::{self, ImportError, RouteFormat};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

// Re-export main types
pub use circular::{CircularParams, CircularSource};
pub use replay::{ReplayOptions, ReplaySource, TimestampPolicy};

/// Errors raised while creating a fix source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Invalid {parameter}: {reason}")]
    InvalidParameter {
        parameter: &'static str,
        reason: String,
    },

    #[error("Source contains no fixes")]
    Empty,

    #[error("Unknown source kind: {0:?} (expected dynamic, geojson, csv or nmea)")]
    UnknownKind(String),

    #[error(transparent)]
    Import(#[from] ImportError),
}

/// A stateful producer of fixes.
///
/// `next_fix` returns `None` once the source is exhausted; after that every
/// call keeps returning `None`. Infinite sources never return `None`.
pub trait FixSource: Send {
    /// Produce the next fix, or `None` at end of stream.
    fn next_fix(&mut self) -> Option<Fix>;

    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Fixes left before exhaustion; `None` for infinite sources.
    fn remaining(&self) -> Option<usize> {
        None
    }
}

impl<S: FixSource + ?Sized> FixSource for Box<S> {
    fn next_fix(&mut self) -> Option<Fix> {
        (**self).next_fix()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn remaining(&self) -> Option<usize> {
        (**self).remaining()
    }
}

/// Registered source kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Simulated circular motion
    Dynamic,
    /// GeoJSON point route
    GeoJson,
    /// CSV point route
    Csv,
    /// Recorded NMEA log
    Nmea,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Dynamic,
        SourceKind::GeoJson,
        SourceKind::Csv,
        SourceKind::Nmea,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Dynamic => "dynamic",
            SourceKind::GeoJson => "geojson",
            SourceKind::Csv => "csv",
            SourceKind::Nmea => "nmea",
        }
    }

    /// Route file format read by this kind, if it replays a file.
    pub fn route_format(&self) -> Option<RouteFormat> {
        match self {
            SourceKind::Dynamic => None,
            SourceKind::GeoJson => Some(RouteFormat::GeoJson),
            SourceKind::Csv => Some(RouteFormat::Csv),
            SourceKind::Nmea => Some(RouteFormat::Nmea),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SourceKind {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        SourceKind::ALL
            .into_iter()
            .find(|kind| kind.name() == lowered)
            .ok_or_else(|| SourceError::UnknownKind(s.to_string()))
    }
}

/// Parameters shared by the file-backed source kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteParams {
    /// Route file to load
    pub path: PathBuf,
    /// Hold duration applied to every point, replacing the file's values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// First sequence index; points are renumbered from here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
}

impl RouteParams {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            duration: None,
            index: None,
        }
    }
}

/// Configuration of the source to run, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    Dynamic(CircularParams),
    GeoJson(RouteParams),
    Csv(RouteParams),
    Nmea(RouteParams),
}

impl SourceConfig {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceConfig::Dynamic(_) => SourceKind::Dynamic,
            SourceConfig::GeoJson(_) => SourceKind::GeoJson,
            SourceConfig::Csv(_) => SourceKind::Csv,
            SourceConfig::Nmea(_) => SourceKind::Nmea,
        }
    }

    /// Build the route variant for a file-backed kind.
    pub fn route(kind: SourceKind, params: RouteParams) -> Result<Self, SourceError> {
        match kind {
            SourceKind::GeoJson => Ok(SourceConfig::GeoJson(params)),
            SourceKind::Csv => Ok(SourceConfig::Csv(params)),
            SourceKind::Nmea => Ok(SourceConfig::Nmea(params)),
            SourceKind::Dynamic => Err(SourceError::InvalidParameter {
                parameter: "kind",
                reason: "dynamic source does not read a route file".to_string(),
            }),
        }
    }

    /// Check parameters without touching the filesystem.
    pub fn validate(&self) -> Result<(), SourceError> {
        match self {
            SourceConfig::Dynamic(params) => params.validate(),
            SourceConfig::GeoJson(route) | SourceConfig::Csv(route) | SourceConfig::Nmea(route) => {
                replay::validate_hold_override(route.duration)
            }
        }
    }
}

/// Create the source described by `config`.
///
/// File-backed kinds load and parse their route here, so import errors
/// surface before the server starts.
pub fn build_source(config: &SourceConfig) -> Result<Box<dyn FixSource>, SourceError> {
    let route = match config {
        SourceConfig::Dynamic(params) => {
            return Ok(Box::new(CircularSource::new(params.clone())?));
        }
        SourceConfig::GeoJson(route) | SourceConfig::Csv(route) | SourceConfig::Nmea(route) => {
            route
        }
    };

    let kind = config.kind();
    let format = kind
        .route_format()
        .ok_or_else(|| SourceError::UnknownKind(kind.to_string()))?;
    let imported = import::load_route(&route.path, format)?;

    // Recorded logs keep their own clock; routes are stamped as they play
    let timestamps = match kind {
        SourceKind::Nmea => TimestampPolicy::Recorded,
        _ => TimestampPolicy::Now,
    };
    let options = ReplayOptions {
        hold_override: route.duration,
        index_offset: route.index,
        timestamps,
    };

    tracing::info!(
        "Loaded {} points from {} ({} warnings)",
        imported.fixes.len(),
        route.path.display(),
        imported.warnings.len()
    );

    Ok(Box::new(ReplaySource::new(kind.name(), imported.fixes, options)?))
}
