//! # gatehouse-core
//!
//! Domain layer containing the user snapshot, session state, the session store
//! and user directory ports, and the concurrent prefix-search index.
//! This crate has zero dependencies on infrastructure (Redis, web framework, etc.).

pub mod entities;
pub mod error;
pub mod index;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{SessionState, User};
pub use error::DomainError;
pub use index::{IdSet, Trie};
pub use traits::{
    DirectoryResult, SessionStore, SessionStoreExt, StoreError, StoreResult, UserDirectory,
    UserRecord,
};
pub use value_objects::SessionToken;
