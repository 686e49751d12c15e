//! Concurrent prefix-search trie mapping string keys to sets of user IDs
//!
//! Nodes live in an arena and refer to each other by index. Each node keeps
//! its children ordered by code point and a back-reference to its parent,
//! which is only used to prune empty branches after a removal.
//!
//! The whole arena sits behind a single `RwLock`: searches share the read
//! lock, insertions and removals take the write lock.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::IdSet;

type NodeId = usize;

const ROOT: NodeId = 0;

#[derive(Debug, Default)]
struct Node {
    children: BTreeMap<char, NodeId>,
    ids: IdSet,
    /// Parent node and the edge label leading here. `None` for the root.
    parent: Option<(NodeId, char)>,
}

impl Node {
    fn is_prunable(&self) -> bool {
        self.ids.is_empty() && self.children.is_empty()
    }
}

#[derive(Debug)]
struct Arena {
    nodes: Vec<Node>,
    free: Vec<NodeId>,
    /// Distinct (key, id) pairs currently stored
    entries: usize,
}

impl Arena {
    fn new() -> Self {
        Self {
            nodes: vec![Node::default()],
            free: Vec::new(),
            entries: 0,
        }
    }

    fn alloc(&mut self, parent: NodeId, label: char) -> NodeId {
        let node = Node {
            parent: Some((parent, label)),
            ..Node::default()
        };
        if let Some(id) = self.free.pop() {
            self.nodes[id] = node;
            id
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }

    fn release(&mut self, id: NodeId) {
        self.nodes[id] = Node::default();
        self.free.push(id);
    }

    fn walk(&self, key: &str) -> Option<NodeId> {
        key.chars()
            .try_fold(ROOT, |node, c| self.nodes[node].children.get(&c).copied())
    }

    fn insert(&mut self, key: &str, id: i64) -> bool {
        let mut node = ROOT;
        for c in key.chars() {
            node = match self.nodes[node].children.get(&c) {
                Some(&child) => child,
                None => {
                    let child = self.alloc(node, c);
                    self.nodes[node].children.insert(c, child);
                    child
                }
            };
        }

        let added = self.nodes[node].ids.add(id);
        if added {
            self.entries += 1;
        }
        added
    }

    fn delete(&mut self, key: &str, id: i64) -> bool {
        let Some(mut node) = self.walk(key) else {
            return false;
        };
        if !self.nodes[node].ids.remove(id) {
            return false;
        }
        self.entries -= 1;

        while node != ROOT && self.nodes[node].is_prunable() {
            let Some((parent, label)) = self.nodes[node].parent else {
                break;
            };
            self.nodes[parent].children.remove(&label);
            self.release(node);
            node = parent;
        }
        true
    }

    /// Depth-first collection: a node's own IDs, then each child subtree in
    /// ascending code-point order.
    fn collect(&self, start: NodeId, limit: usize) -> Vec<i64> {
        let mut found = Vec::with_capacity(limit.min(64));
        let mut stack = vec![start];

        while let Some(node) = stack.pop() {
            let node = &self.nodes[node];
            for id in node.ids.iter() {
                if found.len() == limit {
                    return found;
                }
                found.push(id);
            }
            if found.len() == limit {
                break;
            }
            stack.extend(node.children.values().rev().copied());
        }
        found
    }
}

/// Thread-safe prefix index from lower-cased name tokens to user IDs
#[derive(Debug)]
pub struct Trie {
    inner: RwLock<Arena>,
}

impl Trie {
    /// Create an empty trie
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Arena::new()),
        }
    }

    /// Associate `id` with `key`
    ///
    /// Returns `false` if the pair was already present.
    pub fn add(&self, key: &str, id: i64) -> bool {
        self.inner.write().insert(key, id)
    }

    /// Up to `n` IDs stored under keys starting with `prefix`
    ///
    /// Empty when the trie is empty, `prefix` is empty, `n` is zero, or no
    /// key starts with `prefix`.
    pub fn find(&self, prefix: &str, n: usize) -> Vec<i64> {
        if prefix.is_empty() || n == 0 {
            return Vec::new();
        }

        let arena = self.inner.read();
        if arena.entries == 0 {
            return Vec::new();
        }
        match arena.walk(prefix) {
            Some(node) => arena.collect(node, n),
            None => Vec::new(),
        }
    }

    /// Remove the pair `(key, id)` and prune branches left empty
    ///
    /// Returns `false` (and changes nothing) if the pair was not present.
    pub fn remove(&self, key: &str, id: i64) -> bool {
        self.inner.write().delete(key, id)
    }

    /// Index a user under every whitespace-separated token of their first
    /// and last name, plus their user name. Tokens are lower-cased.
    ///
    /// Returns the number of new pairs inserted.
    pub fn add_indexed_user(&self, first_name: &str, last_name: &str, user_name: &str, id: i64) -> usize {
        let mut arena = self.inner.write();
        name_tokens(first_name, last_name)
            .chain(std::iter::once(user_name.to_lowercase()))
            .filter(|token| !token.is_empty())
            .filter(|token| arena.insert(token, id))
            .count()
    }

    /// Undo [`Trie::add_indexed_user`] for the name tokens
    ///
    /// User names are immutable, so they stay indexed across profile edits.
    pub fn remove_indexed_user(&self, first_name: &str, last_name: &str, id: i64) -> usize {
        let mut arena = self.inner.write();
        name_tokens(first_name, last_name)
            .filter(|token| arena.delete(token, id))
            .count()
    }

    /// Number of distinct (key, id) pairs stored
    pub fn len(&self) -> usize {
        self.inner.read().entries
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live nodes in the arena, root included
    pub fn node_count(&self) -> usize {
        let arena = self.inner.read();
        arena.nodes.len() - arena.free.len()
    }
}

impl Default for Trie {
    fn default() -> Self {
        Self::new()
    }
}

fn name_tokens<'a>(first_name: &'a str, last_name: &'a str) -> impl Iterator<Item = String> + 'a {
    first_name
        .split_whitespace()
        .chain(last_name.split_whitespace())
        .map(str::to_lowercase)
}
