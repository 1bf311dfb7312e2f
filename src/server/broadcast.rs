//! The broadcast server: accept loop plus paced emission loop.

use super::{
    shutdown_requested, ClientConnection, ClientSet, FixObserver, RunSummary, ServerConfig,
    ServerError, ServerEvent, ShutdownHandle, StopReason,
};
use crate::nmea::NmeaEncoder;
use crate::pacing::{AdvanceSignal, AdvanceWaiter, PacingController};
use crate::source::FixSource;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};

/// Pause after a failed accept so a persistent error does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Streams fixes from one source to every connected TCP client.
///
/// Clients are accepted on a spawned task for the whole run and may join or
/// leave at any time; each receives the stream from the next fix on. All
/// clients get the same bytes in the same order.
pub struct BroadcastServer {
    config: ServerConfig,
    listener: TcpListener,
    local_addr: SocketAddr,
    clients: ClientSet,
    encoder: NmeaEncoder,
    pacing: PacingController,
    start_gate: AdvanceWaiter,
    observers: Vec<Box<dyn FixObserver>>,
    event_tx: broadcast::Sender<ServerEvent>,
    shutdown: ShutdownHandle,
}

impl BroadcastServer {
    /// Open the listening socket.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let address = config.address();
        let listener =
            TcpListener::bind(&address)
                .await
                .map_err(|source| ServerError::BindFailed {
                    address: address.clone(),
                    source,
                })?;
        let local_addr = listener.local_addr()?;
        let (event_tx, _) = broadcast::channel(100);
        let advance = AdvanceSignal::new();

        tracing::info!("NMEA server listening on {}", local_addr);

        Ok(Self {
            encoder: NmeaEncoder::new().with_speed_decimals(config.speed_decimals),
            start_gate: advance.waiter(),
            pacing: PacingController::new(advance),
            config,
            listener,
            local_addr,
            clients: ClientSet::new(),
            observers: Vec::new(),
            event_tx,
            shutdown: ShutdownHandle::new(),
        })
    }

    /// Use `signal` both for the start gate and for manual transitions.
    ///
    /// The start gate counts triggers from this call on, so a press made
    /// before [`run`](Self::run) reaches the gate still starts the stream.
    /// Manual transitions only count triggers raised while they wait.
    pub fn with_advance_signal(mut self, signal: AdvanceSignal) -> Self {
        self.start_gate = signal.waiter();
        self.pacing = PacingController::new(signal);
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Signal that releases the start gate and manual transitions.
    pub fn advance_signal(&self) -> AdvanceSignal {
        self.pacing.advance_signal()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Subscribe to server events
    pub fn subscribe_events(&self) -> broadcast::Receiver<ServerEvent> {
        self.event_tx.subscribe()
    }

    pub fn add_observer(&mut self, observer: impl FixObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Stream `source` until it is exhausted or shutdown is requested.
    ///
    /// On return the listener and every client socket are closed.
    pub async fn run<S: FixSource>(self, mut source: S) -> Result<RunSummary, ServerError> {
        let Self {
            config,
            listener,
            local_addr,
            clients,
            encoder,
            mut pacing,
            mut start_gate,
            observers,
            event_tx,
            shutdown,
        } = self;

        let mut shutdown_rx = shutdown.subscribe();
        let accept_task = tokio::spawn(accept_loop(
            listener,
            clients.clone(),
            event_tx.clone(),
            shutdown.subscribe(),
        ));
        let _ = event_tx.send(ServerEvent::Listening { addr: local_addr });

        tracing::info!("Streaming fixes from {} source", source.name());

        let mut fixes_emitted: u64 = 0;
        let mut reason = StopReason::Shutdown;

        let started = if config.wait_for_start {
            tracing::info!("Waiting for start signal");
            tokio::select! {
                _ = start_gate.wait() => true,
                _ = shutdown_requested(&mut shutdown_rx) => false,
            }
        } else {
            true
        };

        if started {
            loop {
                if shutdown.is_shutdown() {
                    break;
                }

                let Some(fix) = source.next_fix() else {
                    tracing::info!("Source exhausted after {} fixes", fixes_emitted);
                    let _ = event_tx.send(ServerEvent::SourceExhausted);
                    reason = StopReason::SourceExhausted;
                    break;
                };

                let sentences = encoder.encode(&fix);
                for observer in &observers {
                    observer.on_fix(&fix, &sentences);
                }

                let wire = sentences.to_wire();
                let (delivered, dropped) =
                    clients.broadcast(wire.as_bytes(), config.write_timeout).await;
                for client in dropped {
                    tracing::info!("Client {} dropped: {}", client.peer, client.error);
                    let _ = event_tx.send(ServerEvent::ClientDropped {
                        id: client.id,
                        peer: client.peer,
                        reason: client.error.to_string(),
                    });
                }

                fixes_emitted += 1;
                let _ = event_tx.send(ServerEvent::FixEmitted {
                    sequence_index: fix.sequence_index(),
                    clients: delivered,
                });

                tokio::select! {
                    _ = pacing.hold(&fix) => {}
                    _ = shutdown_requested(&mut shutdown_rx) => break,
                }
            }
        }

        if reason == StopReason::Shutdown {
            tracing::info!("Shutdown requested");
        }

        // Dropping the accept task closes the listener
        accept_task.abort();
        let _ = accept_task.await;
        clients.close_all().await;

        let summary = RunSummary {
            fixes_emitted,
            clients_served: clients.served(),
            reason,
        };
        let _ = event_tx.send(ServerEvent::Stopped {
            summary: summary.clone(),
        });
        tracing::info!(
            "Server stopped: {} fixes emitted, {} clients served",
            summary.fixes_emitted,
            summary.clients_served
        );

        Ok(summary)
    }
}

async fn accept_loop(
    listener: TcpListener,
    clients: ClientSet,
    event_tx: broadcast::Sender<ServerEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!("set_nodelay failed for {}: {}", peer, e);
                    }
                    let client = ClientConnection::new(stream, peer);
                    let id = client.id();
                    clients.insert(client).await;
                    tracing::info!("Client connected: {}", peer);
                    let _ = event_tx.send(ServerEvent::ClientConnected { id, peer });
                }
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
            _ = shutdown_requested(&mut shutdown_rx) => break,
        }
    }
    tracing::debug!("Accept loop stopped");
}
