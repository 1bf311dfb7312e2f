//! Lode - GNSS Receiver Emulator
//!
//! Turns a source of positions (a simulated circular drive, a GeoJSON or CSV
//! route, or a recorded NMEA log) into a paced stream of NMEA 0183 RMC/GGA
//! sentences broadcast to every connected TCP client.

pub mod config;
pub mod fix;
pub mod import;
pub mod nmea;
pub mod pacing;
pub mod server;
pub mod source;

// Re-export commonly used types
pub use config::AppConfig;
pub use fix::{Coordinate, Fix, TransitionMode};
pub use nmea::{NmeaEncoder, SentencePair};
pub use pacing::{AdvanceSignal, PacingController};
pub use server::{BroadcastServer, RunSummary, ServerConfig, ShutdownHandle, StopReason};
pub use source::{build_source, FixSource, SourceConfig, SourceKind};
