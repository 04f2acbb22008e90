//! # Project Tree
//!
//! The hierarchy is kept the way it is stored: one flat, ordered list of
//! [`Node`]s where each node names its parent. An `id -> position` map is
//! rebuilt after every structural change so lookups stay O(1).
//!
//! Sibling order is the order nodes appear in the flat list. Moves re-splice
//! a node inside that list, so a drop at a given index also decides where
//! the node lands among its new siblings.
//!
//! [`Tree`] holds only structure. Content blobs are handled by
//! [`crate::engine::TreeEngine`], which owns a `Tree`.

use crate::error::{Result, WordsError};
use crate::model::{Node, NodeId, ROOT_ID};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tree {
    nodes: Vec<Node>,
    positions: HashMap<NodeId, usize>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tree from stored nodes, rejecting anything that breaks a
    /// structural invariant with [`WordsError::Corrupt`].
    pub fn from_nodes(nodes: Vec<Node>) -> Result<Self> {
        let mut tree = Self {
            nodes,
            positions: HashMap::new(),
        };
        for (pos, node) in tree.nodes.iter().enumerate() {
            if node.id == ROOT_ID {
                return Err(WordsError::Corrupt(format!(
                    "node '{}' uses the reserved id {}",
                    node.name, ROOT_ID
                )));
            }
            if tree.positions.insert(node.id, pos).is_some() {
                return Err(WordsError::Corrupt(format!("duplicate node id {}", node.id)));
            }
        }
        for node in &tree.nodes {
            if node.parent_id == ROOT_ID {
                continue;
            }
            match tree.get(node.parent_id) {
                Some(parent) if parent.is_folder() => {}
                Some(_) => {
                    return Err(WordsError::Corrupt(format!(
                        "node {} has a document as its parent",
                        node.id
                    )))
                }
                None => {
                    return Err(WordsError::Corrupt(format!(
                        "node {} references missing parent {}",
                        node.id, node.parent_id
                    )))
                }
            }
        }
        for node in &tree.nodes {
            if tree.has_cycle_above(node.id) {
                return Err(WordsError::Corrupt(format!(
                    "node {} is its own ancestor",
                    node.id
                )));
            }
        }
        Ok(tree)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.positions.get(&id).map(|&pos| &self.nodes[pos])
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        match self.positions.get(&id) {
            Some(&pos) => self.nodes.get_mut(pos),
            None => None,
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.positions.contains_key(&id)
    }

    /// `max(existing ids) + 1`, or 1 for an empty tree.
    pub fn next_id(&self) -> NodeId {
        self.nodes.iter().map(|n| n.id).max().unwrap_or(ROOT_ID) + 1
    }

    /// Direct children of `parent` in sibling order.
    pub fn children(&self, parent: NodeId) -> Vec<&Node> {
        self.nodes.iter().filter(|n| n.parent_id == parent).collect()
    }

    /// Every node below `id`, parents before their children.
    pub fn descendants(&self, id: NodeId) -> Vec<&Node> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        self.collect_descendants(id, &mut visited, &mut out);
        out
    }

    fn collect_descendants<'a>(
        &'a self,
        id: NodeId,
        visited: &mut HashSet<NodeId>,
        out: &mut Vec<&'a Node>,
    ) {
        for child in self.children(id) {
            if visited.insert(child.id) {
                out.push(child);
                self.collect_descendants(child.id, visited, out);
            }
        }
    }

    /// `id` and everything below it, children before parents.
    pub fn delete_order(&self, id: NodeId) -> Vec<NodeId> {
        let mut to_visit = vec![id];
        let mut discovered = Vec::new();
        let mut visited = HashSet::new();

        while let Some(current) = to_visit.pop() {
            if !visited.insert(current) {
                continue;
            }
            discovered.push(current);
            for child in self.nodes.iter().filter(|n| n.parent_id == current) {
                to_visit.push(child.id);
            }
        }

        discovered.reverse();
        discovered
    }

    /// True when `candidate` sits somewhere below `ancestor`.
    pub fn is_descendant(&self, ancestor: NodeId, candidate: NodeId) -> bool {
        let mut current = self.get(candidate).map(|n| n.parent_id);
        let mut visited = HashSet::new();

        while let Some(curr) = current {
            if curr == ancestor {
                return true;
            }
            if curr == ROOT_ID || !visited.insert(curr) {
                return false;
            }
            current = self.get(curr).map(|n| n.parent_id);
        }

        false
    }

    fn has_cycle_above(&self, id: NodeId) -> bool {
        let mut current = self.get(id).map(|n| n.parent_id);
        let mut visited = HashSet::new();

        while let Some(curr) = current {
            if curr == ROOT_ID {
                return false;
            }
            if curr == id || !visited.insert(curr) {
                return true;
            }
            current = self.get(curr).map(|n| n.parent_id);
        }

        false
    }

    /// Appends a node. Its id must be fresh and its parent the root or an
    /// existing folder.
    pub(crate) fn insert(&mut self, node: Node) -> Result<()> {
        if node.id == ROOT_ID || self.contains(node.id) {
            return Err(WordsError::InvalidInput(format!(
                "node id {} is already taken",
                node.id
            )));
        }
        self.check_parent(node.parent_id)?;
        self.positions.insert(node.id, self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    fn check_parent(&self, parent: NodeId) -> Result<()> {
        if parent == ROOT_ID {
            return Ok(());
        }
        match self.get(parent) {
            Some(node) if node.is_folder() => Ok(()),
            Some(node) => Err(WordsError::InvalidMove(format!(
                "'{}' is a document and cannot hold other items",
                node.name
            ))),
            None => Err(WordsError::InvalidMove(format!(
                "parent {} does not exist",
                parent
            ))),
        }
    }

    /// Drops every listed node. Callers keep the parent invariant.
    pub(crate) fn remove_all(&mut self, ids: &HashSet<NodeId>) {
        self.nodes.retain(|n| !ids.contains(&n.id));
        self.reindex();
    }

    /// Reparents `id` under `new_parent` and re-splices it at `index` in the
    /// flat list (clamped to the end). The tree is untouched on error.
    pub(crate) fn relocate(&mut self, id: NodeId, new_parent: NodeId, index: usize) -> Result<()> {
        let source = self
            .positions
            .get(&id)
            .copied()
            .ok_or_else(|| WordsError::NotFound(format!("node {}", id)))?;

        if new_parent == id {
            return Err(WordsError::InvalidMove(
                "an item cannot be moved into itself".to_string(),
            ));
        }
        if new_parent != ROOT_ID {
            match self.get(new_parent) {
                None => {
                    return Err(WordsError::InvalidMove(format!(
                        "target {} does not exist",
                        new_parent
                    )))
                }
                Some(target) if !target.accepts_children() => {
                    return Err(WordsError::InvalidMove(format!(
                        "'{}' does not accept drops",
                        target.name
                    )))
                }
                Some(_) => {}
            }
            if self.is_descendant(id, new_parent) {
                return Err(WordsError::InvalidMove(
                    "an item cannot be moved into one of its own descendants".to_string(),
                ));
            }
        }

        let mut node = self.nodes.remove(source);
        node.parent_id = new_parent;
        let index = index.min(self.nodes.len());
        self.nodes.insert(index, node);
        self.reindex();
        Ok(())
    }

    fn reindex(&mut self) {
        self.positions = self
            .nodes
            .iter()
            .enumerate()
            .map(|(pos, n)| (n.id, pos))
            .collect();
    }

    /// Sum of every document's word count.
    pub fn aggregate_word_count(&self) -> u64 {
        self.nodes.iter().map(Node::word_count).sum()
    }

    /// Word count of a folder, derived from the documents below it. For a
    /// document this is its own count.
    pub fn subtree_word_count(&self, id: NodeId) -> u64 {
        match self.get(id) {
            Some(node) if node.is_file() => node.word_count(),
            Some(_) => self.descendants(id).into_iter().map(Node::word_count).sum(),
            None => 0,
        }
    }

    /// Depth-first walk from the root in sibling order, with depth (0 for
    /// top-level nodes).
    pub fn outline(&self) -> Vec<(usize, &Node)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut visited = HashSet::new();
        self.walk(ROOT_ID, 0, &mut visited, &mut out);
        out
    }

    fn walk<'a>(
        &'a self,
        parent: NodeId,
        depth: usize,
        visited: &mut HashSet<NodeId>,
        out: &mut Vec<(usize, &'a Node)>,
    ) {
        for child in self.children(parent) {
            if visited.insert(child.id) {
                out.push((depth, child));
                self.walk(child.id, depth + 1, visited, out);
            }
        }
    }
}
