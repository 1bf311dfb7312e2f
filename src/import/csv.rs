//! CSV route parser.
//!
//! Columns: `index,lat,lon,speed,elevation,duration,transition,description`.
//! Only latitude and longitude are required; trailing columns may be omitted
//! or left empty. The index column is informational and fixes are numbered in
//! file order.

use super::{placeholder_time, ImportError, ImportResult};
use crate::fix::{Coordinate, Fix, TransitionMode, DEFAULT_HOLD_SECS};

const MIN_COLUMNS: usize = 3;

/// Parse CSV content to fixes
pub fn parse_csv(content: &str) -> Result<ImportResult, ImportError> {
    let mut fixes = Vec::new();
    let mut seen_row = false;

    for (i, raw) in content.lines().enumerate() {
        let line = i + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let fields = split_fields(trimmed);
        let first_row = !seen_row;
        seen_row = true;
        if first_row && is_header(&fields) {
            continue;
        }

        if fields.len() < MIN_COLUMNS {
            return Err(ImportError::Parse {
                line,
                reason: format!(
                    "expected at least {} columns, found {}",
                    MIN_COLUMNS,
                    fields.len()
                ),
            });
        }

        let latitude = required_number(&fields, 1, "latitude", line)?;
        let longitude = required_number(&fields, 2, "longitude", line)?;
        let coordinate = Coordinate::new(latitude, longitude).map_err(|e| ImportError::Parse {
            line,
            reason: e.to_string(),
        })?;

        let speed = optional_number(&fields, 3, "speed", line)?.unwrap_or(0.0);
        let elevation = optional_number(&fields, 4, "elevation", line)?.unwrap_or(0.0);
        let duration = optional_number(&fields, 5, "duration", line)?.unwrap_or(DEFAULT_HOLD_SECS);
        let transition = match field(&fields, 6) {
            Some(value) => value
                .parse::<TransitionMode>()
                .map_err(|e| ImportError::Parse {
                    line,
                    reason: e.to_string(),
                })?,
            None => TransitionMode::Auto,
        };
        let description = field(&fields, 7).unwrap_or_default();

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

    Ok(ImportResult {
        fixes,
        warnings: Vec::new(),
    })
}

/// A leading row naming its columns instead of holding numbers.
fn is_header(fields: &[String]) -> bool {
    fields
        .get(1)
        .map(|f| f.eq_ignore_ascii_case("lat") || f.eq_ignore_ascii_case("latitude"))
        .unwrap_or(false)
}

/// Non-empty field at `column`, trimmed.
fn field(fields: &[String], column: usize) -> Option<&str> {
    fields
        .get(column)
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
}

fn optional_number(
    fields: &[String],
    column: usize,
    name: &str,
    line: usize,
) -> Result<Option<f64>, ImportError> {
    match field(fields, column) {
        Some(value) => value.parse::<f64>().map(Some).map_err(|_| ImportError::Parse {
            line,
            reason: format!("invalid {}: {:?}", name, value),
        }),
        None => Ok(None),
    }
}

fn required_number(
    fields: &[String],
    column: usize,
    name: &str,
    line: usize,
) -> Result<f64, ImportError> {
    optional_number(fields, column, name, line)?.ok_or_else(|| ImportError::Parse {
        line,
        reason: format!("missing {}", name),
    })
}

/// Split one line on commas, honouring double-quoted fields.
///
/// Inside quotes a doubled quote (`""`) is a literal quote.
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);

    fields
}
