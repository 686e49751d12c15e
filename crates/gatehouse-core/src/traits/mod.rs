//! Ports - interfaces the infrastructure layer implements

mod session_store;
mod user_directory;

pub use session_store::{SessionStore, SessionStoreExt, StoreError, StoreResult};
pub use user_directory::{DirectoryResult, UserDirectory, UserRecord};
