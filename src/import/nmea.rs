//! Recorded NMEA log import.

use super::{ImportError, ImportResult, ImportWarning};
use crate::nmea::NmeaLogDecoder;
use chrono::NaiveDate;

/// Parse a recorded RMC/GGA log to fixes.
///
/// Undecodable lines become warnings; `fallback_date` dates fixes built from
/// GGA sentences seen before any RMC.
pub fn parse_nmea(content: &str, fallback_date: NaiveDate) -> Result<ImportResult, ImportError> {
    let log = NmeaLogDecoder::decode_str(content, fallback_date);

    if log.fixes.is_empty() {
        return Err(ImportError::NoPoints);
    }

    Ok(ImportResult {
        fixes: log.fixes,
        warnings: log
            .warnings
            .into_iter()
            .map(ImportWarning::SkippedSentence)
            .collect(),
    })
}
