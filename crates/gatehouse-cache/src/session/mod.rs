//! Session store backends
//!
//! - `MemoryStore`: process-local, for tests and single-node setups
//! - `RedisStore`: shared across gateway instances

mod memory_store;
mod policy;
mod redis_store;

pub use memory_store::MemoryStore;
pub use policy::StorePolicy;
pub use redis_store::{RedisStore, FAILURE_KEY_PREFIX, SESSION_KEY_PREFIX};
