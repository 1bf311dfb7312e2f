//! Hooks notified of every emitted fix.

use crate::fix::Fix;
use crate::nmea::SentencePair;

/// Observer called with each fix and its encoding before it is broadcast.
///
/// Called on the emission loop; implementations must not block.
pub trait FixObserver: Send + Sync {
    fn on_fix(&self, fix: &Fix, sentences: &SentencePair);
}

impl<F> FixObserver for F
where
    F: Fn(&Fix, &SentencePair) + Send + Sync,
{
    fn on_fix(&self, fix: &Fix, sentences: &SentencePair) {
        self(fix, sentences)
    }
}

/// Logs each emitted fix at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl FixObserver for LogObserver {
    fn on_fix(&self, fix: &Fix, sentences: &SentencePair) {
        tracing::info!(
            index = fix.sequence_index(),
            lat = format_args!("{:.6}", fix.latitude()),
            lon = format_args!("{:.6}", fix.longitude()),
            speed_kmh = format_args!("{:.1}", fix.speed_kmh()),
            transition = %fix.transition(),
            "{}",
            fix.description()
        );
        for sentence in sentences.iter() {
            tracing::debug!("{}", sentence.trim_end());
        }
    }
}
