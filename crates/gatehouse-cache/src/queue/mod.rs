//! Notification queue sources
//!
//! The gateway consumes notifications produced by backend services and fans
//! them out to WebSocket clients. Production uses a Redis Stream consumer
//! group; the channel source runs the same path in-process.

mod channel;
mod redis_stream;
mod source;

pub use channel::{ChannelPublisher, ChannelSource};
pub use redis_stream::{publish, RedisStreamSource, StreamSourceConfig, PAYLOAD_FIELD};
pub use source::{Delivery, MessageSource, QueueError, QueueResult};
