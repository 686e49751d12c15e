//! # gatehouse-cache
//!
//! Redis-facing infrastructure for the gateway.
//!
//! ## Features
//!
//! - **Connection Pool**: Managed Redis connection pool with deadpool
//! - **Session Stores**: `SessionStore` backends (in-memory and Redis)
//! - **Queue**: Redis Stream consumer group feeding the WebSocket notifier
//!
//! ## Example
//!
//! ```ignore
//! use gatehouse_cache::{create_shared_pool, RedisPoolConfig, RedisStore, StorePolicy};
//!
//! let pool = create_shared_pool(RedisPoolConfig::default())?;
//! let store = RedisStore::new(pool.clone(), StorePolicy::default());
//!
//! store.save_state(&token, &state).await?;
//! let state: SessionState = store.get_state(&token).await?;
//! ```

pub mod pool;
pub mod queue;
pub mod session;

// Re-export pool types
pub use pool::{
    create_shared_pool, RedisPool, RedisPoolConfig, RedisPoolError, RedisResult, SharedRedisPool,
};

// Re-export session store types
pub use session::{MemoryStore, RedisStore, StorePolicy};

// Re-export queue types
pub use queue::{
    ChannelPublisher, ChannelSource, Delivery, MessageSource, QueueError, QueueResult,
    RedisStreamSource, StreamSourceConfig,
};
