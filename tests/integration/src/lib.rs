//! Integration test utilities for the gateway
//!
//! Spawns the real router on a loopback port with an in-memory session
//! store, a seeded user directory and an in-process notification queue, so
//! the suite runs without Redis.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
