//! Playback of a finite, pre-loaded fix sequence.

use super::{FixSource, SourceError};
use crate::fix::{Fix, MIN_HOLD_SECS};
use chrono::{DateTime, Utc};

/// Where replayed fixes get their timestamps from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampPolicy {
    /// Stamp each fix with wall-clock time when it is pulled
    #[default]
    Now,
    /// Keep the timestamp the fix was loaded with
    Recorded,
}

/// Overrides applied uniformly to every replayed fix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayOptions {
    /// Hold duration replacing each fix's own value
    pub hold_override: Option<f64>,
    /// Index of the first fix; later fixes follow consecutively
    pub index_offset: Option<i64>,
    pub timestamps: TimestampPolicy,
}

pub(crate) fn validate_hold_override(hold: Option<f64>) -> Result<(), SourceError> {
    match hold {
        Some(secs) if !secs.is_finite() || secs < MIN_HOLD_SECS => {
            Err(SourceError::InvalidParameter {
                parameter: "duration",
                reason: format!("{} must be at least {}", secs, MIN_HOLD_SECS),
            })
        }
        _ => Ok(()),
    }
}

/// Replays fixes strictly in load order, then reports end of stream.
///
/// Timestamps never go backwards: a fix whose timestamp is earlier than the
/// previously emitted one is stamped with the previous timestamp instead.
#[derive(Debug)]
pub struct ReplaySource {
    name: String,
    fixes: std::vec::IntoIter<Fix>,
    timestamps: TimestampPolicy,
    last_timestamp: Option<DateTime<Utc>>,
}

impl ReplaySource {
    /// Create a replay over `fixes` with the overrides in `options` applied.
    pub fn new(
        name: impl Into<String>,
        fixes: Vec<Fix>,
        options: ReplayOptions,
    ) -> Result<Self, SourceError> {
        if fixes.is_empty() {
            return Err(SourceError::Empty);
        }
        validate_hold_override(options.hold_override)?;

        let fixes = fixes
            .into_iter()
            .enumerate()
            .map(|(i, fix)| {
                let fix = match options.hold_override {
                    Some(secs) => fix.with_hold_duration_secs(secs),
                    None => fix,
                };
                match options.index_offset {
                    Some(offset) => {
                        let index = i64::try_from(i)
                            .ok()
                            .and_then(|i| offset.checked_add(i))
                            .ok_or_else(|| SourceError::InvalidParameter {
                                parameter: "index",
                                reason: format!("{} leaves no room for {} fixes", offset, i + 1),
                            })?;
                        Ok(fix.with_sequence_index(index))
                    }
                    None => Ok(fix),
                }
            })
            .collect::<Result<Vec<Fix>, SourceError>>()?;

        Ok(Self {
            name: name.into(),
            fixes: fixes.into_iter(),
            timestamps: options.timestamps,
            last_timestamp: None,
        })
    }
}

impl FixSource for ReplaySource {
    fn next_fix(&mut self) -> Option<Fix> {
        let fix = self.fixes.next()?;

        let stamp = match self.timestamps {
            TimestampPolicy::Now => Utc::now(),
            TimestampPolicy::Recorded => fix.timestamp(),
        };
        let stamp = match self.last_timestamp {
            Some(last) if stamp < last => last,
            _ => stamp,
        };
        self.last_timestamp = Some(stamp);

        Some(fix.with_timestamp(stamp))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.fixes.len())
    }
}
