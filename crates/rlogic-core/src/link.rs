//! Link registry: directed edges between leaf properties.
//!
//! Links are keyed by their target leaf, which has at most one incoming link
//! of either kind. Sources may fan out. Insertion order is preserved and is
//! the order links are persisted in.

use std::collections::HashMap;

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::id::{ObjectId, PropertyIndex};

/// A leaf property addressed by owning node and arena index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeafKey {
    pub node: ObjectId,
    pub index: PropertyIndex,
}

impl LeafKey {
    pub fn new(node: ObjectId, index: PropertyIndex) -> Self {
        LeafKey { node, index }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Link {
    pub source: LeafKey,
    pub target: LeafKey,
    pub weak: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LinkRegistry {
    by_target: IndexMap<LeafKey, Link>,
    outgoing: HashMap<LeafKey, SmallVec<[LeafKey; 2]>>,
}

impl LinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an already validated link.
    pub(crate) fn insert(&mut self, link: Link) {
        self.by_target.insert(link.target, link);
        self.outgoing.entry(link.source).or_default().push(link.target);
    }

    /// Removes the link into `target`, if any.
    pub(crate) fn remove(&mut self, target: LeafKey) -> Option<Link> {
        let link = self.by_target.shift_remove(&target)?;
        if let Some(targets) = self.outgoing.get_mut(&link.source) {
            targets.retain(|t| *t != target);
            if targets.is_empty() {
                self.outgoing.remove(&link.source);
            }
        }
        Some(link)
    }

    /// Removes every link touching a leaf of `node`.
    pub(crate) fn remove_node(&mut self, node: ObjectId) -> Vec<Link> {
        let doomed: Vec<LeafKey> = self
            .by_target
            .values()
            .filter(|l| l.source.node == node || l.target.node == node)
            .map(|l| l.target)
            .collect();
        doomed.into_iter().filter_map(|t| self.remove(t)).collect()
    }

    pub fn incoming(&self, target: LeafKey) -> Option<&Link> {
        self.by_target.get(&target)
    }

    pub fn outgoing(&self, source: LeafKey) -> &[LeafKey] {
        self.outgoing.get(&source).map_or(&[], |v| v.as_slice())
    }

    pub fn has_outgoing(&self, source: LeafKey) -> bool {
        !self.outgoing(source).is_empty()
    }

    pub fn touches_node(&self, node: ObjectId) -> bool {
        self.by_target
            .values()
            .any(|l| l.source.node == node || l.target.node == node)
    }

    /// All links in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Link> {
        self.by_target.values()
    }

    /// Incoming links grouped by target node.
    pub(crate) fn incoming_by_node(&self) -> HashMap<ObjectId, Vec<Link>> {
        let mut map: HashMap<ObjectId, Vec<Link>> = HashMap::new();
        for link in self.by_target.values() {
            map.entry(link.target.node).or_default().push(*link);
        }
        map
    }

    /// Source leaves of weak links, deduplicated.
    pub(crate) fn weak_sources(&self) -> Vec<LeafKey> {
        let mut out: Vec<LeafKey> = self
            .by_target
            .values()
            .filter(|l| l.weak)
            .map(|l| l.source)
            .collect();
        out.sort();
        out.dedup();
        out
    }

    pub fn len(&self) -> usize {
        self.by_target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_target.is_empty()
    }
}
