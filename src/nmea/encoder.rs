//! Fix → RMC/GGA sentence encoding.

use super::{checksum, KMH_PER_KNOT};
use crate::fix::Fix;

/// Talker id prefixed to every emitted sentence.
const TALKER: &str = "GP";

/// Course over ground; the emulator does not model heading.
const RMC_COURSE: &str = "0.0";
/// FAA mode indicator (A = autonomous).
const RMC_MODE: &str = "A";

const GGA_FIX_QUALITY: &str = "1";
const GGA_SATELLITES: &str = "08";
const GGA_HDOP: &str = "1.0";
const GGA_GEOID_SEPARATION: &str = "0.0";

/// Default number of decimals for the RMC speed field.
pub const DEFAULT_SPEED_DECIMALS: usize = 1;

/// Largest supported number of decimals for the RMC speed field.
pub const MAX_SPEED_DECIMALS: usize = 6;

/// An encoded RMC + GGA pair, each terminated by CRLF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentencePair {
    pub rmc: String,
    pub gga: String,
}

impl SentencePair {
    /// Both sentences concatenated in emission order.
    pub fn to_wire(&self) -> String {
        let mut out = String::with_capacity(self.rmc.len() + self.gga.len());
        out.push_str(&self.rmc);
        out.push_str(&self.gga);
        out
    }

    /// Iterate over the sentences in emission order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        [self.rmc.as_str(), self.gga.as_str()].into_iter()
    }
}

/// Encodes fixes as NMEA 0183 sentences.
#[derive(Debug, Clone)]
pub struct NmeaEncoder {
    speed_decimals: usize,
}

impl Default for NmeaEncoder {
    fn default() -> Self {
        Self {
            speed_decimals: DEFAULT_SPEED_DECIMALS,
        }
    }
}

impl NmeaEncoder {
    /// Create an encoder with the default speed precision.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of decimals written for speed in knots.
    pub fn with_speed_decimals(mut self, decimals: usize) -> Self {
        self.speed_decimals = decimals.min(MAX_SPEED_DECIMALS);
        self
    }

    pub fn speed_decimals(&self) -> usize {
        self.speed_decimals
    }

    /// Encode a fix as an RMC sentence followed by a GGA sentence.
    pub fn encode(&self, fix: &Fix) -> SentencePair {
        SentencePair {
            rmc: self.encode_rmc(fix),
            gga: self.encode_gga(fix),
        }
    }

    /// Build the RMC (recommended minimum) sentence for a fix.
    pub fn encode_rmc(&self, fix: &Fix) -> String {
        let time = fix.timestamp().format("%H%M%S%.3f");
        let date = fix.timestamp().format("%d%m%y");
        let (lat, ns) = format_latitude(fix.latitude());
        let (lon, ew) = format_longitude(fix.longitude());
        let knots = fix.speed_kmh() / KMH_PER_KNOT;

        let payload = format!(
            "{TALKER}RMC,{time},A,{lat},{ns},{lon},{ew},{knots:.prec$},{RMC_COURSE},{date},,,{RMC_MODE}",
            prec = self.speed_decimals,
        );
        frame(&payload)
    }

    /// Build the GGA (fix data) sentence for a fix.
    pub fn encode_gga(&self, fix: &Fix) -> String {
        let time = fix.timestamp().format("%H%M%S%.3f");
        let (lat, ns) = format_latitude(fix.latitude());
        let (lon, ew) = format_longitude(fix.longitude());

        let payload = format!(
            "{TALKER}GGA,{time},{lat},{ns},{lon},{ew},{GGA_FIX_QUALITY},{GGA_SATELLITES},{GGA_HDOP},{alt:.1},M,{GGA_GEOID_SEPARATION},M,,",
            alt = fix.elevation_meters(),
        );
        frame(&payload)
    }
}

/// Wrap a payload as `$payload*HH\r\n`.
pub fn frame(payload: &str) -> String {
    format!("${}*{:02X}\r\n", payload, checksum(payload))
}

/// Latitude as `ddmm.mmmm` plus hemisphere.
pub fn format_latitude(latitude: f64) -> (String, char) {
    let hemisphere = if latitude >= 0.0 { 'N' } else { 'S' };
    (format_degrees_minutes(latitude, 2), hemisphere)
}

/// Longitude as `dddmm.mmmm` plus hemisphere.
pub fn format_longitude(longitude: f64) -> (String, char) {
    let hemisphere = if longitude >= 0.0 { 'E' } else { 'W' };
    (format_degrees_minutes(longitude, 3), hemisphere)
}

/// Ten-thousandths of an arc-minute in one degree.
const UNITS_PER_DEGREE: u64 = 60 * 10_000;

/// Degrees and decimal minutes with four minute decimals.
///
/// Works on integer ten-thousandths of a minute so rounding carries into the
/// degrees instead of producing a `60.0000` minutes field.
fn format_degrees_minutes(value: f64, degree_width: usize) -> String {
    let units = (value.abs() * UNITS_PER_DEGREE as f64).round() as u64;
    let degrees = units / UNITS_PER_DEGREE;
    let minutes = units % UNITS_PER_DEGREE;
    format!(
        "{:0width$}{:02}.{:04}",
        degrees,
        minutes / 10_000,
        minutes % 10_000,
        width = degree_width
    )
}
