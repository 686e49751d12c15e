//! Message source abstraction for the notification queue

use async_trait::async_trait;

use crate::pool::RedisPoolError;

/// Error type for queue operations
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue connection error: {0}")]
    Pool(#[from] RedisPoolError),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Queue closed")]
    Closed,
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// One message taken from the queue, pending acknowledgement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Queue-assigned identifier used for acknowledgement
    pub id: String,
    /// Raw message body, written verbatim to clients
    pub payload: String,
}

impl Delivery {
    pub fn new(id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
        }
    }
}

/// A queue the gateway consumes notifications from
///
/// Deliveries are at-least-once: a message stays pending until acknowledged.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Wait for the next batch of messages
    ///
    /// May return an empty batch when a blocking read times out.
    /// `QueueError::Closed` means no more messages will ever arrive.
    async fn next_batch(&self) -> QueueResult<Vec<Delivery>>;

    /// Acknowledge a delivery so it is not redelivered
    async fn ack(&self, id: &str) -> QueueResult<()>;
}
