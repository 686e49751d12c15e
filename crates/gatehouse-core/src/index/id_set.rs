//! Ordered set of user IDs attached to a trie node

use std::collections::BTreeSet;

/// Ordered set of user IDs
///
/// Iteration is in ascending ID order, which keeps search results stable
/// across calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdSet(BTreeSet<i64>);

impl IdSet {
    /// Insert `id`, returning `true` if it was not already present
    pub fn add(&mut self, id: i64) -> bool {
        self.0.insert(id)
    }

    /// Remove `id`, returning `true` if it was present
    pub fn remove(&mut self, id: i64) -> bool {
        self.0.remove(&id)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<i64> for IdSet {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
