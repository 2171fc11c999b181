//! The node tree that every genealogical record is made of.
//!
//! # Arena-based allocation
//!
//! Nodes live in a `Vec`-based arena and are referenced by [`NodeId`]
//! handles. First-child and next-sibling links are the ownership edges of a
//! record; the parent link is a plain handle used for navigation only.
//! Freed slots are recycled, and every slot carries a generation counter so a
//! handle to a removed node never silently resolves to its successor.

use std::fmt;

/// Handle to a node in a [`NodeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    /// Slot index, stable for as long as the node lives.
    pub fn index(self) -> u32 {
        self.index
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// One line of genealogical data.
#[derive(Debug, Clone)]
pub struct Node {
    pub key: Option<String>,
    pub tag: String,
    pub value: Option<String>,
    /// Source line the node was read from, if it was read from text.
    pub line: Option<usize>,
    parent: Option<NodeId>,
    child: Option<NodeId>,
    sibling: Option<NodeId>,
}

impl Node {
    fn new(key: Option<&str>, tag: &str, value: Option<&str>) -> Self {
        Self {
            key: key.map(str::to_string),
            tag: tag.to_string(),
            value: value.map(str::to_string),
            line: None,
            parent: None,
            child: None,
            sibling: None,
        }
    }
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
    pub fn first_child(&self) -> Option<NodeId> {
        self.child
    }
    pub fn next_sibling(&self) -> Option<NodeId> {
        self.sibling
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

#[derive(Debug, Default)]
pub struct NodeArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }
    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.live
    }
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    // ===== Arena operations =====

    /// Allocate a detached node.
    pub fn create(&mut self, key: Option<&str>, tag: &str, value: Option<&str>) -> NodeId {
        let node = Node::new(key, tag, value);
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId { index, generation: slot.generation }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot { generation: 0, node: Some(node) });
            NodeId { index, generation: 0 }
        }
    }
    fn free_node(&mut self, id: NodeId) {
        if let Some(slot) = self.slots.get_mut(id.index as usize) {
            if slot.generation == id.generation && slot.node.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index);
                self.live -= 1;
            }
        }
    }
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    // ===== Field accessors =====

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.get(id).map(|n| n.tag.as_str())
    }
    pub fn value(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| n.value.as_deref())
    }
    pub fn key(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| n.key.as_deref())
    }
    pub fn line(&self, id: NodeId) -> Option<usize> {
        self.get(id).and_then(|n| n.line)
    }
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.child)
    }
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.sibling)
    }
    pub fn set_value(&mut self, id: NodeId, value: Option<&str>) {
        if let Some(node) = self.get_mut(id) {
            node.value = value.map(str::to_string);
        }
    }
    pub fn set_line(&mut self, id: NodeId, line: usize) {
        if let Some(node) = self.get_mut(id) {
            node.line = Some(line);
        }
    }
    pub fn set_key(&mut self, id: NodeId, key: Option<&str>) {
        if let Some(node) = self.get_mut(id) {
            node.key = key.map(str::to_string);
        }
    }

    // ===== Structure =====

    /// Iterate the direct children of `id` in document order.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children { arena: self, next: self.first_child(id) }
    }
    pub fn child_with_tag(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        self.children(id).find(|&c| self.tag(c) == Some(tag))
    }
    pub fn children_with_tag(&self, id: NodeId, tag: &str) -> Vec<NodeId> {
        self.children(id).filter(|&c| self.tag(c) == Some(tag)).collect()
    }
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).last()
    }
    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        self.children(parent).take_while(|&c| c != id).last()
    }

    /// Append a detached node as the last child of `parent`.
    /// Returns false when either handle is stale or `child` is still attached.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let last = self.last_child(parent);
        self.insert_child(parent, child, last)
    }

    /// Insert a detached node under `parent`, directly after `after`
    /// (or first when `after` is `None`).
    pub fn insert_child(&mut self, parent: NodeId, child: NodeId, after: Option<NodeId>) -> bool {
        if !self.contains(parent) || self.root_of(parent) == child {
            return false;
        }
        match self.get(child) {
            Some(node) if node.parent.is_none() && node.sibling.is_none() => {}
            _ => return false,
        }
        if let Some(prev) = after {
            if self.parent(prev) != Some(parent) {
                return false;
            }
        }
        let next = match after {
            Some(prev) => self.next_sibling(prev),
            None => self.first_child(parent),
        };
        if let Some(node) = self.get_mut(child) {
            node.parent = Some(parent);
            node.sibling = next;
        }
        match after {
            Some(prev) => {
                if let Some(node) = self.get_mut(prev) {
                    node.sibling = Some(child);
                }
            }
            None => {
                if let Some(node) = self.get_mut(parent) {
                    node.child = Some(child);
                }
            }
        }
        true
    }

    /// Unlink `id` (and its subtree) from its parent and siblings.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            if let Some(node) = self.get_mut(id) {
                node.sibling = None;
            }
            return;
        };
        let next = self.next_sibling(id);
        match self.previous_sibling(id) {
            Some(prev) => {
                if let Some(node) = self.get_mut(prev) {
                    node.sibling = next;
                }
            }
            None => {
                if let Some(node) = self.get_mut(parent) {
                    node.child = next;
                }
            }
        }
        if let Some(node) = self.get_mut(id) {
            node.parent = None;
            node.sibling = None;
        }
    }

    /// Remove every child of `id`, returning them detached and in order.
    pub fn take_children(&mut self, id: NodeId) -> Vec<NodeId> {
        let children: Vec<NodeId> = self.children(id).collect();
        if let Some(node) = self.get_mut(id) {
            node.child = None;
        }
        for &c in &children {
            if let Some(node) = self.get_mut(c) {
                node.parent = None;
                node.sibling = None;
            }
        }
        children
    }

    /// Attach `children` as the complete child list of `id`, replacing none:
    /// `id` is expected to have no children.
    pub fn set_children(&mut self, id: NodeId, children: &[NodeId]) {
        if let Some(node) = self.get_mut(id) {
            node.child = children.first().copied();
        }
        for (i, &c) in children.iter().enumerate() {
            let next = children.get(i + 1).copied();
            if let Some(node) = self.get_mut(c) {
                node.parent = Some(id);
                node.sibling = next;
            }
        }
    }

    /// Detach `id` and free it together with all its descendants.
    pub fn remove(&mut self, id: NodeId) {
        self.detach(id);
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            stack.extend(self.children(current));
            self.free_node(current);
        }
    }

    /// Deep copy of `id` and its descendants; the copy is detached.
    pub fn copy_tree(&mut self, id: NodeId) -> Option<NodeId> {
        let (key, tag, value) = {
            let node = self.get(id)?;
            (node.key.clone(), node.tag.clone(), node.value.clone())
        };
        let copy = self.create(key.as_deref(), &tag, value.as_deref());
        let children: Vec<NodeId> = self.children(id).collect();
        for c in children {
            if let Some(child_copy) = self.copy_tree(c) {
                self.append_child(copy, child_copy);
            }
        }
        Some(copy)
    }

    /// Depth below the record root (the root itself is level 0).
    pub fn level(&self, id: NodeId) -> usize {
        let mut level = 0;
        let mut current = self.parent(id);
        while let Some(p) = current {
            level += 1;
            current = self.parent(p);
        }
        level
    }

    /// The record root that `id` belongs to.
    pub fn root_of(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(p) = self.parent(current) {
            current = p;
        }
        current
    }

    /// Pre-order list of `id` and its descendants with levels relative to `id`.
    pub fn traverse(&self, id: NodeId) -> Vec<(NodeId, usize)> {
        let mut out = Vec::new();
        if !self.contains(id) {
            return out;
        }
        let mut stack = vec![(id, 0usize)];
        while let Some((current, level)) = stack.pop() {
            out.push((current, level));
            let children: Vec<NodeId> = self.children(current).collect();
            for c in children.into_iter().rev() {
                stack.push((c, level + 1));
            }
        }
        out
    }

    /// Number of nodes in the subtree rooted at `id`.
    pub fn count(&self, id: NodeId) -> usize {
        self.traverse(id).len()
    }
}

pub struct Children<'a> {
    arena: &'a NodeArena,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;
    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.arena.next_sibling(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(arena: &mut NodeArena) -> (NodeId, NodeId, NodeId) {
        let root = arena.create(Some("F1"), "FAM", None);
        let husb = arena.create(None, "HUSB", Some("@I1@"));
        let chil = arena.create(None, "CHIL", Some("@I2@"));
        arena.append_child(root, husb);
        arena.append_child(root, chil);
        (root, husb, chil)
    }

    #[test]
    fn links_stay_consistent_after_detach() {
        let mut arena = NodeArena::new();
        let (root, husb, chil) = family(&mut arena);
        arena.detach(husb);
        assert_eq!(arena.first_child(root), Some(chil));
        assert_eq!(arena.parent(husb), None);
        assert_eq!(arena.parent(chil), Some(root));
        assert!(arena.insert_child(root, husb, None));
        assert_eq!(arena.children(root).collect::<Vec<_>>(), vec![husb, chil]);
    }

    #[test]
    fn removed_handles_go_stale() {
        let mut arena = NodeArena::new();
        let (root, husb, _) = family(&mut arena);
        arena.remove(root);
        assert!(arena.is_empty());
        assert!(!arena.contains(husb));
        let reused = arena.create(None, "NOTE", None);
        assert!(reused.index() < 3);
        assert_eq!(arena.tag(husb), None, "stale handle must not see the new node");
    }

    #[test]
    fn copy_and_traverse() {
        let mut arena = NodeArena::new();
        let (root, _, chil) = family(&mut arena);
        let date = arena.create(None, "DATE", Some("1900"));
        arena.append_child(chil, date);
        let copy = arena.copy_tree(root).expect("copy");
        let levels: Vec<usize> = arena.traverse(copy).into_iter().map(|(_, l)| l).collect();
        assert_eq!(levels, vec![0, 1, 1, 2]);
        assert_eq!(arena.level(date), 2);
        assert_eq!(arena.root_of(date), root);
    }

    #[test]
    fn refuses_attached_child() {
        let mut arena = NodeArena::new();
        let (root, husb, _) = family(&mut arena);
        let other = arena.create(None, "FAM", None);
        assert!(!arena.append_child(other, husb));
        assert_eq!(arena.parent(husb), Some(root));
    }
}
