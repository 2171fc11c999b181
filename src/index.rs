//! Key to record-root lookup, one map per record kind plus a unified map.

use core::hash::BuildHasherDefault;
use std::collections::HashMap;

use seahash::SeaHasher;

use crate::node::NodeId;
use crate::record::{compare_keys, RecordKind};

// we will use a fast hashing algo for maps keyed by record keys and refns
pub type OtherHasher = BuildHasherDefault<SeaHasher>;

#[derive(Debug, Default)]
pub struct RecordIndex {
    unified: HashMap<String, (RecordKind, NodeId), OtherHasher>,
    kinds: [HashMap<String, NodeId, OtherHasher>; 5],
}

impl RecordIndex {
    pub fn new() -> Self {
        Self::default()
    }
    /// Adds a record; false when the key is already taken.
    pub fn insert(&mut self, key: &str, kind: RecordKind, root: NodeId) -> bool {
        if self.unified.contains_key(key) {
            return false;
        }
        self.unified.insert(key.to_string(), (kind, root));
        self.kinds[kind.index()].insert(key.to_string(), root);
        true
    }
    /// Points an existing key at a new root, returning the previous one.
    pub fn replace(&mut self, key: &str, root: NodeId) -> Option<NodeId> {
        let (kind, old) = self.unified.get_mut(key).map(|entry| {
            let old = entry.1;
            entry.1 = root;
            (entry.0, old)
        })?;
        self.kinds[kind.index()].insert(key.to_string(), root);
        Some(old)
    }
    pub fn remove(&mut self, key: &str) -> Option<(RecordKind, NodeId)> {
        let (kind, root) = self.unified.remove(key)?;
        self.kinds[kind.index()].remove(key);
        Some((kind, root))
    }
    pub fn get(&self, key: &str) -> Option<NodeId> {
        self.unified.get(key).map(|&(_, root)| root)
    }
    pub fn get_of_kind(&self, key: &str, kind: RecordKind) -> Option<NodeId> {
        self.kinds[kind.index()].get(key).copied()
    }
    pub fn kind_of(&self, key: &str) -> Option<RecordKind> {
        self.unified.get(key).map(|&(kind, _)| kind)
    }
    pub fn contains(&self, key: &str) -> bool {
        self.unified.contains_key(key)
    }
    pub fn count(&self, kind: RecordKind) -> usize {
        self.kinds[kind.index()].len()
    }
    pub fn len(&self) -> usize {
        self.unified.len()
    }
    pub fn is_empty(&self) -> bool {
        self.unified.is_empty()
    }
    /// Keys of one kind in database key order.
    pub fn keys(&self, kind: RecordKind) -> Vec<String> {
        let mut keys: Vec<String> = self.kinds[kind.index()].keys().cloned().collect();
        keys.sort_by(|a, b| compare_keys(a, b));
        keys
    }
    /// Every key in database key order.
    pub fn all_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.unified.keys().cloned().collect();
        keys.sort_by(|a, b| compare_keys(a, b));
        keys
    }
}
