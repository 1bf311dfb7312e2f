//! TCP broadcast of NMEA sentences.
//!
//! A [`BroadcastServer`] pulls fixes from a [`FixSource`](crate::source::FixSource),
//! encodes them and writes the same bytes to every connected client, pacing
//! emission through a [`PacingController`](crate::pacing::PacingController).

pub mod broadcast;
pub mod client;
pub mod observer;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

// Re-export main types
pub use broadcast::BroadcastServer;
pub use client::{ClientConnection, ClientSet, WriteError};
pub use observer::{FixObserver, LogObserver};

/// Server-related errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Server bind failed on {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// Server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address to listen on
    pub bind_address: String,
    /// Port to listen on; 0 picks an ephemeral port
    pub port: u16,
    /// Upper bound for writing one sentence pair to one client
    pub write_timeout: Duration,
    /// Hold the first emission until the start signal fires
    pub wait_for_start: bool,
    /// Decimal places of the RMC speed field
    pub speed_decimals: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            wait_for_start: false,
            speed_decimals: crate::nmea::encoder::DEFAULT_SPEED_DECIMALS,
        }
    }
}

impl ServerConfig {
    /// Loopback config on an ephemeral port.
    pub fn local() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 0,
            ..Default::default()
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The source returned its last fix
    SourceExhausted,
    /// The shutdown handle was triggered
    Shutdown,
}

/// Totals for a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub fixes_emitted: u64,
    /// Connections accepted over the whole run
    pub clients_served: usize,
    pub reason: StopReason,
}

/// Server events
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// Listener is accepting connections
    Listening { addr: SocketAddr },
    /// Client connected
    ClientConnected { id: Uuid, peer: SocketAddr },
    /// Client dropped after a failed or timed-out write
    ClientDropped {
        id: Uuid,
        peer: SocketAddr,
        reason: String,
    },
    /// A sentence pair was written to the live clients
    FixEmitted { sequence_index: i64, clients: usize },
    /// The source has no more fixes
    SourceExhausted,
    /// The run is over and all sockets are closed
    Stopped { summary: RunSummary },
}

/// Cloneable handle that stops a running server.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown; idempotent.
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Resolve once shutdown has been requested.
pub(crate) async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|stop| *stop).await.is_err() {
        // Sender gone: nobody can request shutdown any more
        std::future::pending::<()>().await;
    }
}
