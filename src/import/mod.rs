//! Route import for file-backed sources.
//!
//! Loads GeoJSON, CSV and recorded NMEA files into an ordered list of fixes
//! that a [`ReplaySource`](crate::source::ReplaySource) plays back.

pub mod csv;
pub mod geojson;
pub mod nmea;

use crate::fix::Fix;
use crate::nmea::DecodeWarning;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during route import
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("No usable points found")]
    NoPoints,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Warning during import (non-fatal issues)
#[derive(Debug, Clone)]
pub enum ImportWarning {
    /// A recorded sentence could not be decoded
    SkippedSentence(DecodeWarning),
    /// A GeoJSON feature without point geometry
    SkippedFeature { index: usize, geometry: String },
}

impl fmt::Display for ImportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportWarning::SkippedSentence(warning) => write!(f, "skipped sentence, {}", warning),
            ImportWarning::SkippedFeature { index, geometry } => {
                write!(f, "skipped feature {} with {} geometry", index, geometry)
            }
        }
    }
}

/// Result of route import operation
#[derive(Debug)]
pub struct ImportResult {
    pub fixes: Vec<Fix>,
    pub warnings: Vec<ImportWarning>,
}

/// Supported route file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteFormat {
    GeoJson,
    Csv,
    Nmea,
}

/// Detect file format from extension
pub fn detect_format(path: &Path) -> Result<RouteFormat, ImportError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .ok_or_else(|| ImportError::UnsupportedFormat("No file extension".to_string()))?;

    match ext.as_str() {
        "geojson" | "json" => Ok(RouteFormat::GeoJson),
        "csv" => Ok(RouteFormat::Csv),
        "nmea" | "log" | "txt" => Ok(RouteFormat::Nmea),
        _ => Err(ImportError::UnsupportedFormat(ext)),
    }
}

/// Load a route file in the given format.
pub fn load_route(path: &Path, format: RouteFormat) -> Result<ImportResult, ImportError> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;

    let result = match format {
        RouteFormat::GeoJson => geojson::parse_geojson(&content)?,
        RouteFormat::Csv => csv::parse_csv(&content)?,
        RouteFormat::Nmea => nmea::parse_nmea(&content, Utc::now().date_naive())?,
    };

    for warning in &result.warnings {
        tracing::warn!("{}: {}", path.display(), warning);
    }

    Ok(result)
}

/// Timestamp for points whose file carries no time; replaced at playback.
pub(crate) fn placeholder_time() -> DateTime<Utc> {
    DateTime::<Utc>::default()
}
