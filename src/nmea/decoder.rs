//! RMC/GGA sentence decoding and recorded-log pairing.

use super::{checksum, NmeaError, KMH_PER_KNOT};
use crate::fix::{Coordinate, Fix, DEFAULT_HOLD_SECS};
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use std::fmt;

/// Position, time, date and speed from an RMC sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct RmcData {
    pub time: NaiveTime,
    pub date: NaiveDate,
    pub coordinate: Coordinate,
    pub speed_kmh: f64,
}

/// Position, time and altitude from a GGA sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct GgaData {
    pub time: NaiveTime,
    pub coordinate: Coordinate,
    pub elevation_meters: f64,
}

/// A decoded sentence.
#[derive(Debug, Clone, PartialEq)]
pub enum Sentence {
    Rmc(RmcData),
    Gga(GgaData),
}

/// Decode one NMEA sentence.
///
/// The sentence must carry a valid `*HH` checksum. Any talker prefix is
/// accepted (`GPRMC`, `GNRMC`, bare `RMC`, ...).
pub fn decode_sentence(line: &str) -> Result<Sentence, NmeaError> {
    let line = line.trim();
    let body = line.strip_prefix('$').ok_or(NmeaError::MissingStart)?;
    let (payload, sum) = body.rsplit_once('*').ok_or(NmeaError::MissingChecksum)?;

    let expected = checksum(payload);
    let found = sum.trim();
    let matches = found.len() == 2
        && u8::from_str_radix(found, 16)
            .map(|value| value == expected)
            .unwrap_or(false);
    if !matches {
        return Err(NmeaError::ChecksumMismatch {
            expected,
            found: found.to_string(),
        });
    }

    let fields: Vec<&str> = payload.split(',').collect();
    let id = fields[0];
    match sentence_type(id) {
        Some("RMC") => parse_rmc(&fields).map(Sentence::Rmc),
        Some("GGA") => parse_gga(&fields).map(Sentence::Gga),
        _ => Err(NmeaError::UnsupportedSentence(id.to_string())),
    }
}

/// Sentence formatter with the talker id stripped.
fn sentence_type(id: &str) -> Option<&str> {
    if !id.is_ascii() {
        return None;
    }
    match id.len() {
        3 => Some(id),
        5 => Some(&id[2..]),
        _ => None,
    }
}

fn parse_rmc(fields: &[&str]) -> Result<RmcData, NmeaError> {
    if fields.len() < 10 {
        return Err(NmeaError::TooFewFields {
            sentence: "RMC",
            count: fields.len(),
        });
    }
    if fields[2] != "A" {
        return Err(NmeaError::InvalidFix);
    }

    let time = parse_time(fields[1])?;
    let coordinate = parse_position(fields[3], fields[4], fields[5], fields[6])?;
    let speed_kmh = if fields[7].is_empty() {
        0.0
    } else {
        parse_number("speed", fields[7])? * KMH_PER_KNOT
    };
    let date = parse_date(fields[9])?;

    Ok(RmcData {
        time,
        date,
        coordinate,
        speed_kmh,
    })
}

fn parse_gga(fields: &[&str]) -> Result<GgaData, NmeaError> {
    if fields.len() < 10 {
        return Err(NmeaError::TooFewFields {
            sentence: "GGA",
            count: fields.len(),
        });
    }

    let time = parse_time(fields[1])?;
    let coordinate = parse_position(fields[2], fields[3], fields[4], fields[5])?;
    let elevation_meters = if fields[9].is_empty() {
        0.0
    } else {
        parse_number("altitude", fields[9])?
    };

    Ok(GgaData {
        time,
        coordinate,
        elevation_meters,
    })
}

fn parse_number(field: &'static str, value: &str) -> Result<f64, NmeaError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| NmeaError::MalformedField {
            field,
            value: value.to_string(),
        })
}

/// Parse `hhmmss` with an optional fractional part.
fn parse_time(value: &str) -> Result<NaiveTime, NmeaError> {
    let malformed = || NmeaError::MalformedField {
        field: "time",
        value: value.to_string(),
    };

    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
    if whole.len() != 6 || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }

    let hour: u32 = whole[0..2].parse().map_err(|_| malformed())?;
    let minute: u32 = whole[2..4].parse().map_err(|_| malformed())?;
    let second: u32 = whole[4..6].parse().map_err(|_| malformed())?;

    // Pad or truncate the fraction to nanoseconds
    let nanos = if fraction.is_empty() {
        0
    } else {
        let digits: String = fraction.chars().chain(std::iter::repeat('0')).take(9).collect();
        digits.parse::<u32>().map_err(|_| malformed())?
    };

    NaiveTime::from_hms_nano_opt(hour, minute, second, nanos).ok_or_else(malformed)
}

/// Parse `ddmmyy`; two-digit years are in the 2000s.
fn parse_date(value: &str) -> Result<NaiveDate, NmeaError> {
    let malformed = || NmeaError::MalformedField {
        field: "date",
        value: value.to_string(),
    };

    if value.len() != 6 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let day: u32 = value[0..2].parse().map_err(|_| malformed())?;
    let month: u32 = value[2..4].parse().map_err(|_| malformed())?;
    let year: i32 = value[4..6].parse().map_err(|_| malformed())?;

    NaiveDate::from_ymd_opt(2000 + year, month, day).ok_or_else(malformed)
}

fn parse_position(lat: &str, ns: &str, lon: &str, ew: &str) -> Result<Coordinate, NmeaError> {
    let latitude = match ns {
        "N" => parse_angle("latitude", lat)?,
        "S" => -parse_angle("latitude", lat)?,
        _ => {
            return Err(NmeaError::MalformedField {
                field: "latitude hemisphere",
                value: ns.to_string(),
            })
        }
    };
    let longitude = match ew {
        "E" => parse_angle("longitude", lon)?,
        "W" => -parse_angle("longitude", lon)?,
        _ => {
            return Err(NmeaError::MalformedField {
                field: "longitude hemisphere",
                value: ew.to_string(),
            })
        }
    };

    Coordinate::new(latitude, longitude).map_err(|e| NmeaError::MalformedField {
        field: "position",
        value: e.to_string(),
    })
}

/// Parse `d+mm.mmmm` into decimal degrees.
///
/// The minutes always occupy the two digits before the decimal point, so the
/// degree width is inferred rather than fixed.
fn parse_angle(field: &'static str, value: &str) -> Result<f64, NmeaError> {
    let malformed = || NmeaError::MalformedField {
        field,
        value: value.to_string(),
    };

    if !value.is_ascii() {
        return Err(malformed());
    }
    let integer_len = value.find('.').unwrap_or(value.len());
    if integer_len < 3 {
        return Err(malformed());
    }
    let (degrees, minutes) = value.split_at(integer_len - 2);
    if !degrees.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }

    let degrees: f64 = degrees.parse().map_err(|_| malformed())?;
    let minutes: f64 = minutes.parse().map_err(|_| malformed())?;
    if !(0.0..60.0).contains(&minutes) {
        return Err(malformed());
    }

    Ok(degrees + minutes / 60.0)
}

/// A recorded line that was skipped during decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeWarning {
    /// 1-based line number in the source text
    pub line_number: usize,
    pub error: NmeaError,
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line_number, self.error)
    }
}

/// Result of decoding a recorded log.
#[derive(Debug, Clone, Default)]
pub struct DecodedLog {
    pub fixes: Vec<Fix>,
    pub warnings: Vec<DecodeWarning>,
}

/// Turns a recorded sequence of sentences into fixes.
///
/// Sentences are grouped by arrival order, never by timestamp:
/// - an RMC opens a group, and a GGA right after it completes the group
///   (position, speed and time from the RMC, altitude from the GGA);
/// - an RMC that arrives while a group is open closes the open one with
///   altitude 0;
/// - a GGA with no open group produces a fix on its own with speed 0 and the
///   date of the last RMC seen (or the fallback date if there was none);
/// - the end of input closes any open group.
///
/// Lines that fail to decode are skipped and reported as warnings.
#[derive(Debug)]
pub struct NmeaLogDecoder {
    fallback_date: NaiveDate,
    last_date: Option<NaiveDate>,
    pending: Option<RmcData>,
    log: DecodedLog,
}

impl NmeaLogDecoder {
    /// Create a decoder; `fallback_date` dates GGA sentences seen before any RMC.
    pub fn new(fallback_date: NaiveDate) -> Self {
        Self {
            fallback_date,
            last_date: None,
            pending: None,
            log: DecodedLog::default(),
        }
    }

    /// Decode a whole log held in memory.
    pub fn decode_str(text: &str, fallback_date: NaiveDate) -> DecodedLog {
        let mut decoder = Self::new(fallback_date);
        for (i, line) in text.lines().enumerate() {
            decoder.push_line(i + 1, line);
        }
        decoder.finish()
    }

    /// Feed one line of the recorded log.
    pub fn push_line(&mut self, line_number: usize, line: &str) {
        if line.trim().is_empty() {
            return;
        }

        match decode_sentence(line) {
            Ok(Sentence::Rmc(rmc)) => {
                self.flush_pending();
                self.last_date = Some(rmc.date);
                self.pending = Some(rmc);
            }
            Ok(Sentence::Gga(gga)) => match self.pending.take() {
                Some(rmc) => self.push_fix(
                    rmc.date,
                    rmc.time,
                    rmc.coordinate,
                    rmc.speed_kmh,
                    gga.elevation_meters,
                ),
                None => {
                    let date = self.last_date.unwrap_or(self.fallback_date);
                    self.push_fix(date, gga.time, gga.coordinate, 0.0, gga.elevation_meters);
                }
            },
            Err(error) => {
                tracing::warn!(line = line_number, "Skipping NMEA sentence: {}", error);
                self.log.warnings.push(DecodeWarning { line_number, error });
            }
        }
    }

    /// Close any open group and return the decoded fixes.
    pub fn finish(mut self) -> DecodedLog {
        self.flush_pending();
        self.log
    }

    fn flush_pending(&mut self) {
        if let Some(rmc) = self.pending.take() {
            self.push_fix(rmc.date, rmc.time, rmc.coordinate, rmc.speed_kmh, 0.0);
        }
    }

    fn push_fix(
        &mut self,
        date: NaiveDate,
        time: NaiveTime,
        coordinate: Coordinate,
        speed_kmh: f64,
        elevation_meters: f64,
    ) {
        let index = self.log.fixes.len() as i64 + 1;
        let timestamp = Utc.from_utc_datetime(&date.and_time(time));
        let fix = Fix::new(index, coordinate, timestamp)
            .with_speed_kmh(speed_kmh)
            .with_elevation_meters(elevation_meters)
            .with_hold_duration_secs(DEFAULT_HOLD_SECS);
        self.log.fixes.push(fix);
    }
}
