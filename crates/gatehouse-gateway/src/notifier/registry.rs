//! Connection registry and fan-out

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use gatehouse_cache::{Delivery, MessageSource, QueueError};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::mpsc;

use super::{ConnectionState, FrameOutcome};

/// Channel buffer size for outgoing messages
pub const MESSAGE_BUFFER_SIZE: usize = 100;

/// Identifies one registered connection
pub type ConnectionId = u64;

/// The only part of a notification the gateway reads
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "userIDs", default)]
    user_ids: Option<Vec<i64>>,
}

/// Errors from dispatching a notification
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("Malformed notification: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Outcome of one dispatch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Connections the payload was queued for
    pub delivered: usize,
    /// Connections dropped because their channel was closed or full
    pub dropped: usize,
}

#[derive(Debug)]
struct ClientConnection {
    id: ConnectionId,
    sender: mpsc::Sender<String>,
}

/// Live WebSocket connections keyed by user id
///
/// One mutex guards registration, removal and fan-out. Fan-out uses
/// `try_send`, so the lock is never held across an await.
#[derive(Debug)]
pub struct Notifier {
    clients: Mutex<HashMap<i64, Vec<ClientConnection>>>,
    next_id: AtomicU64,
    reconnect_delay: Duration,
}

impl Notifier {
    /// Create an empty registry
    ///
    /// `reconnect_delay` is how long [`Notifier::consume`] waits after a
    /// queue error before reading again.
    #[must_use]
    pub fn new(reconnect_delay: Duration) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            reconnect_delay,
        }
    }

    #[must_use]
    pub fn new_shared(reconnect_delay: Duration) -> Arc<Self> {
        Arc::new(Self::new(reconnect_delay))
    }

    /// Register an outbound channel for `user_id`
    pub fn add_client(&self, user_id: i64, sender: mpsc::Sender<String>) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.clients
            .lock()
            .entry(user_id)
            .or_default()
            .push(ClientConnection { id, sender });

        tracing::debug!(user_id = %user_id, connection_id = id, "Connection registered");
        id
    }

    /// Deregister a connection, returning whether it was present
    pub fn remove(&self, user_id: i64, id: ConnectionId) -> bool {
        let mut clients = self.clients.lock();
        let Some(connections) = clients.get_mut(&user_id) else {
            return false;
        };

        let before = connections.len();
        connections.retain(|c| c.id != id);
        let removed = connections.len() != before;
        if connections.is_empty() {
            clients.remove(&user_id);
        }

        if removed {
            tracing::debug!(user_id = %user_id, connection_id = id, "Connection removed");
        }
        removed
    }

    /// Total registered connections
    pub fn connection_count(&self) -> usize {
        self.clients.lock().values().map(Vec::len).sum()
    }

    /// Users with at least one connection
    pub fn user_count(&self) -> usize {
        self.clients.lock().len()
    }

    /// Number of connections registered for `user_id`
    pub fn connections_for(&self, user_id: i64) -> usize {
        self.clients.lock().get(&user_id).map_or(0, Vec::len)
    }

    /// Write `payload` verbatim to the connections it targets
    ///
    /// `userIDs` absent, `null` or empty means every connection. A
    /// connection whose channel is closed or full is dropped, which closes
    /// its socket; the remaining connections still receive the payload.
    pub fn dispatch(&self, payload: &str) -> Result<DispatchReport, NotifierError> {
        let envelope: Envelope = serde_json::from_str(payload)?;
        let targets = envelope.user_ids.filter(|ids| !ids.is_empty());

        let mut report = DispatchReport::default();
        let mut clients = self.clients.lock();

        let mut send_all = |user_id: i64, connections: &mut Vec<ClientConnection>| {
            connections.retain(|c| match c.sender.try_send(payload.to_string()) {
                Ok(()) => {
                    report.delivered += 1;
                    true
                }
                Err(e) => {
                    tracing::debug!(
                        user_id = %user_id,
                        connection_id = c.id,
                        error = %e,
                        "Dropping connection after failed write"
                    );
                    report.dropped += 1;
                    false
                }
            });
        };

        match targets {
            Some(ids) => {
                for user_id in ids {
                    if let Some(connections) = clients.get_mut(&user_id) {
                        send_all(user_id, connections);
                    }
                }
            }
            None => {
                for (user_id, connections) in clients.iter_mut() {
                    send_all(*user_id, connections);
                }
            }
        }

        clients.retain(|_, connections| !connections.is_empty());
        Ok(report)
    }

    /// Attach an upgraded WebSocket for `user_id`
    ///
    /// Spawns a writer task that owns the socket's write half and drains the
    /// connection's channel, and a read pump that discards incoming frames
    /// and deregisters the connection when the client goes away.
    pub fn register(self: &Arc<Self>, user_id: i64, socket: WebSocket) -> ConnectionId {
        let (tx, mut rx) = mpsc::channel::<String>(MESSAGE_BUFFER_SIZE);
        let id = self.add_client(user_id, tx);
        let (mut ws_sink, mut ws_stream) = socket.split();

        tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                if ws_sink.send(Message::Text(text.into())).await.is_err() {
                    tracing::debug!(connection_id = id, "Failed to write to WebSocket");
                    break;
                }
            }
            let _ = ws_sink.close().await;
        });

        let notifier = Arc::clone(self);
        tokio::spawn(async move {
            let mut state = ConnectionState::Open;
            while state.is_open() {
                let outcome = match ws_stream.next().await {
                    Some(frame) => FrameOutcome::from_frame(&frame),
                    None => FrameOutcome::Ended,
                };
                state = state.on_frame(outcome);
            }

            notifier.remove(user_id, id);
            state = state.deregistered();
            tracing::info!(user_id = %user_id, connection_id = id, state = ?state, "WebSocket disconnected");
        });

        tracing::info!(user_id = %user_id, connection_id = id, "WebSocket connected");
        id
    }

    /// Pump notifications from `source` into the registry
    ///
    /// Each delivery is dispatched and then acknowledged, including
    /// malformed ones, which can never succeed. Source errors are logged and
    /// retried after the reconnect delay. Returns when the source closes.
    pub async fn consume(&self, source: &dyn MessageSource) {
        tracing::info!("Notification consumer started");

        loop {
            match source.next_batch().await {
                Ok(batch) => {
                    for delivery in batch {
                        self.deliver(source, delivery).await;
                    }
                }
                Err(QueueError::Closed) => {
                    tracing::info!("Notification source closed, consumer stopping");
                    return;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read notifications, retrying");
                    tokio::time::sleep(self.reconnect_delay).await;
                }
            }
        }
    }

    async fn deliver(&self, source: &dyn MessageSource, delivery: Delivery) {
        match self.dispatch(&delivery.payload) {
            Ok(report) => {
                tracing::trace!(
                    id = %delivery.id,
                    delivered = report.delivered,
                    dropped = report.dropped,
                    "Notification dispatched"
                );
            }
            Err(e) => {
                tracing::warn!(id = %delivery.id, error = %e, "Discarding malformed notification");
            }
        }

        if let Err(e) = source.ack(&delivery.id).await {
            tracing::warn!(id = %delivery.id, error = %e, "Failed to acknowledge notification, it stays pending for redelivery");
        }
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
