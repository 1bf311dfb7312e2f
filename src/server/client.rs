//! Connected clients and fan-out writes.

use futures::future::join_all;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Why a write to one client failed.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("write timed out after {0:?}")]
    TimedOut(Duration),

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// One accepted TCP client.
#[derive(Debug)]
pub struct ClientConnection {
    id: Uuid,
    peer: SocketAddr,
    stream: TcpStream,
    connected_at: Instant,
}

impl ClientConnection {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer,
            stream,
            connected_at: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn connected_for(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Write all of `bytes`, giving up after `limit`.
    ///
    /// Partial writes are not retried; any failure means the client is gone.
    pub async fn send(&mut self, bytes: &[u8], limit: Duration) -> Result<(), WriteError> {
        match tokio::time::timeout(limit, self.stream.write_all(bytes)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(WriteError::TimedOut(limit)),
        }
    }

    /// Shut down the write half and drop the socket.
    pub async fn close(mut self) {
        tracing::debug!("Closing client {} after {:?}", self.peer, self.connected_for());
        if let Err(e) = self.stream.shutdown().await {
            tracing::debug!("Shutdown of client {} failed: {}", self.peer, e);
        }
    }
}

/// A client removed after a failed write.
#[derive(Debug)]
pub struct DroppedClient {
    pub id: Uuid,
    pub peer: SocketAddr,
    pub error: WriteError,
}

/// Shared set of live clients.
///
/// The accept task inserts, the emission loop writes and prunes. The lock is
/// never held across a socket write.
#[derive(Debug, Clone, Default)]
pub struct ClientSet {
    clients: Arc<Mutex<HashMap<Uuid, ClientConnection>>>,
    served: Arc<AtomicUsize>,
}

impl ClientSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, client: ClientConnection) {
        self.served.fetch_add(1, Ordering::Relaxed);
        self.clients.lock().await.insert(client.id(), client);
    }

    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Connections ever inserted.
    pub fn served(&self) -> usize {
        self.served.load(Ordering::Relaxed)
    }

    /// Write `bytes` to every client concurrently, each bounded by `limit`.
    ///
    /// The clients are taken out of the set for the duration of the writes so
    /// the accept task can keep inserting; survivors are merged back after.
    /// Clients inserted meanwhile start with the next broadcast. Clients whose
    /// write fails or times out are closed and not returned to the set.
    /// Returns the number of clients written to successfully and the dropped
    /// ones.
    pub async fn broadcast(&self, bytes: &[u8], limit: Duration) -> (usize, Vec<DroppedClient>) {
        let mut writing = std::mem::take(&mut *self.clients.lock().await);

        let results = join_all(writing.values_mut().map(|client| async move {
            let result = client.send(bytes, limit).await;
            (client.id(), result)
        }))
        .await;

        let mut failed = Vec::new();
        for (id, result) in results {
            if let Err(error) = result {
                if let Some(client) = writing.remove(&id) {
                    failed.push((client, error));
                }
            }
        }
        let delivered = writing.len();
        self.clients.lock().await.extend(writing);

        let mut dropped = Vec::with_capacity(failed.len());
        for (client, error) in failed {
            let (id, peer) = (client.id(), client.peer());
            client.close().await;
            dropped.push(DroppedClient { id, peer, error });
        }

        (delivered, dropped)
    }

    /// Close and remove every client.
    pub async fn close_all(&self) {
        let drained: Vec<ClientConnection> = {
            let mut clients = self.clients.lock().await;
            clients.drain().map(|(_, client)| client).collect()
        };
        join_all(drained.into_iter().map(ClientConnection::close)).await;
    }
}
