//! NMEA 0183 codec for RMC and GGA sentences.
//!
//! Encoding turns a [`Fix`](crate::fix::Fix) into an RMC + GGA
//! [`SentencePair`]; decoding parses recorded sentences back into fixes.

pub mod decoder;
pub mod encoder;

use thiserror::Error;

// Re-export main types
pub use decoder::{
    decode_sentence, DecodeWarning, DecodedLog, GgaData, NmeaLogDecoder, RmcData, Sentence,
};
pub use encoder::{NmeaEncoder, SentencePair};

/// Kilometres per hour in one knot.
pub const KMH_PER_KNOT: f64 = 1.852;

/// Errors raised while decoding a single sentence.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NmeaError {
    #[error("Sentence does not start with '$'")]
    MissingStart,

    #[error("Sentence has no checksum")]
    MissingChecksum,

    #[error("Checksum mismatch: expected {expected:02X}, found {found}")]
    ChecksumMismatch { expected: u8, found: String },

    #[error("Unsupported sentence type: {0}")]
    UnsupportedSentence(String),

    #[error("Too few fields in {sentence}: {count}")]
    TooFewFields { sentence: &'static str, count: usize },

    #[error("Receiver reported no valid fix")]
    InvalidFix,

    #[error("Malformed {field}: {value:?}")]
    MalformedField { field: &'static str, value: String },
}

/// XOR of every byte of a sentence payload (the text between `$` and `*`).
pub fn checksum(payload: &str) -> u8 {
    payload.bytes().fold(0, |acc, b| acc ^ b)
}
