//! In-memory indexes

mod id_set;
mod trie;

pub use id_set::IdSet;
pub use trie::Trie;
