//! In-process message source backed by a tokio channel
//!
//! Lets the gateway run without Redis (tests, local development) while
//! exercising the same consume/dispatch/ack path.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::{mpsc, Mutex};

use super::{Delivery, MessageSource, QueueError, QueueResult};

/// Sending half of a [`ChannelSource`]
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelPublisher {
    /// Enqueue a message body
    ///
    /// # Errors
    /// Returns `QueueError::Closed` if the source was dropped
    pub fn publish(&self, payload: impl Into<String>) -> QueueResult<()> {
        self.tx.send(payload.into()).map_err(|_| QueueError::Closed)
    }
}

/// Message source fed through an unbounded channel
#[derive(Debug)]
pub struct ChannelSource {
    rx: Mutex<mpsc::UnboundedReceiver<String>>,
    next_id: AtomicU64,
    acked: SyncMutex<Vec<String>>,
}

impl ChannelSource {
    /// Create a source and the publisher that feeds it
    #[must_use]
    pub fn new() -> (Self, ChannelPublisher) {
        let (tx, rx) = mpsc::unbounded_channel();
        let source = Self {
            rx: Mutex::new(rx),
            next_id: AtomicU64::new(1),
            acked: SyncMutex::new(Vec::new()),
        };
        (source, ChannelPublisher { tx })
    }

    /// IDs acknowledged so far, in order
    pub fn acked(&self) -> Vec<String> {
        self.acked.lock().clone()
    }
}

#[async_trait]
impl MessageSource for ChannelSource {
    async fn next_batch(&self) -> QueueResult<Vec<Delivery>> {
        let mut rx = self.rx.lock().await;
        let first = rx.recv().await.ok_or(QueueError::Closed)?;

        let mut batch = vec![first];
        while let Ok(more) = rx.try_recv() {
            batch.push(more);
        }

        Ok(batch
            .into_iter()
            .map(|payload| {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                Delivery::new(format!("{id}-0"), payload)
            })
            .collect())
    }

    async fn ack(&self, id: &str) -> QueueResult<()> {
        self.acked.lock().push(id.to_string());
        Ok(())
    }
}
