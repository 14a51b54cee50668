use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message as WsMessage, WebSocket};
use callbridge_core::ConnId;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::relay::RelayHandle;

/// Outbound side of one connected WebSocket.
pub struct Client {
    pub tx: mpsc::Sender<String>,
    pub connected_at: Instant,
}

/// Why a frame did not reach a client's queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendError {
    UnknownClient,
    QueueFull,
    Closed,
}

/// Outbound queues of all connected WebSocket clients.
pub struct ClientRegistry {
    clients: DashMap<ConnId, Client>,
    max_send_queue: usize,
}

impl ClientRegistry {
    pub fn new(max_send_queue: usize) -> Self {
        Self {
            clients: DashMap::new(),
            max_send_queue: max_send_queue.max(1),
        }
    }

    /// Register a new client and return its ID + queue receiver.
    pub fn register(&self) -> (ConnId, mpsc::Receiver<String>) {
        let id = ConnId::new();
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        let _ = self.clients.insert(
            id.clone(),
            Client {
                tx,
                connected_at: Instant::now(),
            },
        );
        (id, rx)
    }

    /// Remove a client by ID.
    pub fn unregister(&self, id: &ConnId) {
        if let Some((_, client)) = self.clients.remove(id) {
            tracing::debug!(
                conn_id = %id,
                connected_secs = client.connected_at.elapsed().as_secs(),
                "client removed"
            );
        }
    }

    /// Queue a frame for one client. Never waits: a full queue drops the frame.
    pub fn send_to(&self, id: &ConnId, message: String) -> Result<(), SendError> {
        let Some(client) = self.clients.get(id) else {
            return Err(SendError::UnknownClient);
        };
        match client.tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(msg)) => {
                tracing::warn!(
                    conn_id = %id,
                    msg_len = msg.len(),
                    "send queue full, dropping message"
                );
                Err(SendError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SendError::Closed),
        }
    }

    pub fn count(&self) -> usize {
        self.clients.len()
    }

    pub fn contains(&self, id: &ConnId) -> bool {
        self.clients.contains_key(id)
    }
}

/// Drive one WebSocket until either side closes or shutdown is requested.
///
/// The reader forwards text frames to the relay in arrival order; the writer
/// drains the client's queue and pings every `ping_interval`.
pub async fn handle_ws_connection(
    socket: WebSocket,
    conn_id: ConnId,
    mut rx: mpsc::Receiver<String>,
    registry: Arc<ClientRegistry>,
    relay: RelayHandle,
    ping_interval: Duration,
    shutdown: CancellationToken,
) {
    if relay.connect(conn_id.clone()).await.is_err() {
        registry.unregister(&conn_id);
        return;
    }

    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer_cid = conn_id.clone();
    let mut writer = tokio::spawn(async move {
        let mut ping = tokio::time::interval(ping_interval.max(Duration::from_secs(1)));
        ping.tick().await; // consume first immediate tick

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    let _ = ws_tx.send(WsMessage::Close(None)).await;
                    break;
                }
                msg = rx.recv() => {
                    let Some(text) = msg else { break };
                    if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = ping.tick() => {
                    if ws_tx.send(WsMessage::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                    tracing::trace!(conn_id = %writer_cid, "sent ping");
                }
            }
        }
    });

    let reader_cid = conn_id.clone();
    let reader_relay = relay.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Text(text) => {
                    if reader_relay
                        .inbound(reader_cid.clone(), text.to_string())
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                WsMessage::Binary(bytes) => {
                    tracing::debug!(conn_id = %reader_cid, len = bytes.len(), "ignoring binary frame");
                }
                WsMessage::Close(_) => break,
                // axum answers pings itself
                WsMessage::Ping(_) | WsMessage::Pong(_) => {}
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    let _ = relay.disconnect(conn_id.clone()).await;
    registry.unregister(&conn_id);
}
