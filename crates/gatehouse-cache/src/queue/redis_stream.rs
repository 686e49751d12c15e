//! Redis Streams consumer group source
//!
//! Reads with `XREADGROUP ... STREAMS <stream> >` and acknowledges with
//! `XACK`. The consumer group is created on first use (`MKSTREAM`), and an
//! existing group (`BUSYGROUP`) is not an error.
//!
//! Entries this consumer read but never acknowledged (a crash before the ack,
//! or a failed `XACK`) stay in the group's pending list. They are read back
//! with ID `0` at startup and after any failed ack, until that backlog is
//! empty, before reads switch back to new entries.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use redis::{streams::StreamReadReply, AsyncCommands, Value};

use super::{Delivery, MessageSource, QueueResult};
use crate::pool::SharedRedisPool;

/// Stream entry field carrying the message body
pub const PAYLOAD_FIELD: &str = "payload";

/// Stream consumer settings
#[derive(Debug, Clone)]
pub struct StreamSourceConfig {
    pub stream: String,
    pub group: String,
    pub consumer: String,
    /// How long a read blocks waiting for new entries
    pub block_ms: u64,
    /// Maximum entries per read
    pub batch_size: usize,
}

impl From<&gatehouse_common::QueueConfig> for StreamSourceConfig {
    fn from(config: &gatehouse_common::QueueConfig) -> Self {
        Self {
            stream: config.stream.clone(),
            group: config.group.clone(),
            consumer: config.consumer.clone(),
            block_ms: config.block_ms,
            batch_size: config.batch_size,
        }
    }
}

/// Consumes notifications from a Redis Stream through a consumer group
pub struct RedisStreamSource {
    pool: SharedRedisPool,
    config: StreamSourceConfig,
    group_ready: AtomicBool,
    /// Set while this consumer may still own unacknowledged entries
    backlog: AtomicBool,
}

impl RedisStreamSource {
    #[must_use]
    pub fn new(pool: SharedRedisPool, config: StreamSourceConfig) -> Self {
        Self {
            pool,
            config,
            group_ready: AtomicBool::new(false),
            backlog: AtomicBool::new(true),
        }
    }

    /// Start ID for the next read: `0` replays this consumer's pending list
    fn read_from(&self) -> &'static str {
        if self.backlog.load(Ordering::Acquire) {
            "0"
        } else {
            ">"
        }
    }

    async fn read(&self, from: &str) -> QueueResult<Vec<Delivery>> {
        let mut conn = self.pool.get().await?;
        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP")
            .arg(&self.config.group)
            .arg(&self.config.consumer)
            .arg("COUNT")
            .arg(self.config.batch_size);
        // Pending entries are already there; only new ones are worth waiting for
        if from == ">" {
            cmd.arg("BLOCK").arg(self.config.block_ms);
        }
        let reply: Option<StreamReadReply> = cmd
            .arg("STREAMS")
            .arg(&self.config.stream)
            .arg(from)
            .query_async(&mut conn)
            .await?;

        Ok(reply.map(Self::to_deliveries).unwrap_or_default())
    }

    async fn ensure_group(&self) -> QueueResult<()> {
        if self.group_ready.load(Ordering::Acquire) {
            return Ok(());
        }

        let mut conn = self.pool.get().await?;
        let created: redis::RedisResult<()> = conn
            .xgroup_create_mkstream(&self.config.stream, &self.config.group, "$")
            .await;

        match created {
            Ok(()) => {
                tracing::info!(
                    stream = %self.config.stream,
                    group = %self.config.group,
                    "Created stream consumer group"
                );
            }
            Err(e) if e.code() == Some("BUSYGROUP") => {}
            Err(e) => return Err(e.into()),
        }

        self.group_ready.store(true, Ordering::Release);
        Ok(())
    }

    async fn xack(&self, id: &str) -> QueueResult<()> {
        let mut conn = self.pool.get().await?;
        let _: i64 = conn
            .xack(&self.config.stream, &self.config.group, &[id])
            .await?;
        Ok(())
    }

    fn to_deliveries(reply: StreamReadReply) -> Vec<Delivery> {
        reply
            .keys
            .into_iter()
            .flat_map(|key| key.ids)
            .map(|entry| {
                let payload = match entry.map.get(PAYLOAD_FIELD) {
                    Some(Value::BulkString(bytes)) => String::from_utf8_lossy(bytes).into_owned(),
                    Some(Value::SimpleString(s)) => s.clone(),
                    _ => {
                        tracing::warn!(id = %entry.id, "Stream entry has no payload field");
                        String::new()
                    }
                };
                Delivery::new(entry.id, payload)
            })
            .collect()
    }
}

#[async_trait]
impl MessageSource for RedisStreamSource {
    async fn next_batch(&self) -> QueueResult<Vec<Delivery>> {
        self.ensure_group().await?;

        if self.read_from() == "0" {
            let pending = self.read("0").await?;
            if !pending.is_empty() {
                tracing::info!(
                    stream = %self.config.stream,
                    count = pending.len(),
                    "Redelivering unacknowledged stream entries"
                );
                return Ok(pending);
            }
            self.backlog.store(false, Ordering::Release);
        }

        self.read(">").await
    }

    async fn ack(&self, id: &str) -> QueueResult<()> {
        let acked = self.xack(id).await;
        if acked.is_err() {
            self.backlog.store(true, Ordering::Release);
        }
        acked
    }
}

impl std::fmt::Debug for RedisStreamSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStreamSource")
            .field("config", &self.config)
            .finish()
    }
}

/// Append a notification to a stream (`XADD <stream> * payload <json>`)
pub async fn publish(pool: &SharedRedisPool, stream: &str, payload: &str) -> QueueResult<String> {
    let mut conn = pool.get().await?;
    let id: String = conn.xadd(stream, "*", &[(PAYLOAD_FIELD, payload)]).await?;
    Ok(id)
}
