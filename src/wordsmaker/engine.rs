//! # Tree Engine
//!
//! Applies structural mutations to the in-memory [`Tree`] and keeps content
//! blobs in step with it. Every operation either succeeds or leaves the
//! tree exactly as it was, with one exception: [`TreeEngine::delete`] removes
//! whatever it managed to remove and reports the rest.
//!
//! The engine never writes metadata. Callers hand the resulting node list to
//! the persistence coordinator.

use crate::error::{Result, WordsError};
use crate::model::{ContentKey, Node, NodeId, NodeKind, ProjectName, ROOT_ID};
use crate::store::{ContentStore, StorageBackend};
use crate::tree::Tree;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Outcome of a delete. `removed` is in the order nodes left the tree
/// (children before parents).
#[derive(Debug, Default)]
pub struct DeleteReport {
    pub removed: Vec<NodeId>,
    pub failed: Vec<(NodeId, WordsError)>,
}

impl DeleteReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Turns a partial delete into [`WordsError::PartialDelete`].
    pub fn into_result(self) -> Result<Vec<NodeId>> {
        match self.failed.first() {
            None => Ok(self.removed),
            Some((id, err)) => Err(WordsError::PartialDelete {
                removed: self.removed.len(),
                failed: self.failed.len(),
                first_failure: format!("node {}: {}", id, err),
            }),
        }
    }
}

pub struct TreeEngine<B: StorageBackend> {
    tree: Tree,
    content: ContentStore<B>,
}

impl<B: StorageBackend> TreeEngine<B> {
    pub fn new(tree: Tree, content: ContentStore<B>) -> Self {
        Self { tree, content }
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn project(&self) -> &ProjectName {
        self.content.project()
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.tree.nodes().to_vec()
    }

    fn node(&self, id: NodeId) -> Result<&Node> {
        self.tree
            .get(id)
            .ok_or_else(|| WordsError::NotFound(format!("node {}", id)))
    }

    fn document_key(&self, id: NodeId) -> Result<ContentKey> {
        let node = self.node(id)?;
        node.content_key().cloned().ok_or_else(|| {
            WordsError::InvalidInput(format!("'{}' is a folder and has no content", node.name))
        })
    }

    /// Adds a node at the end of the list under `parent`. A document's empty
    /// blob is written before the node becomes visible.
    pub fn create_node(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<Node> {
        let name = name.trim();
        if name.is_empty() {
            return Err(WordsError::InvalidInput("Name cannot be empty".to_string()));
        }
        if parent != ROOT_ID && !self.tree.get(parent).is_some_and(Node::is_folder) {
            return Err(WordsError::InvalidMove(format!(
                "parent {} is not a folder",
                parent
            )));
        }

        let id = self.tree.next_id();
        let node = match kind {
            NodeKind::File => Node::file(id, parent, name, now),
            NodeKind::Folder => Node::folder(id, parent, name, now),
        };
        if let Some(key) = node.content_key() {
            self.content.save(key, "")?;
        }
        self.tree.insert(node.clone())?;
        debug!(project = %self.project(), id, kind = %kind, "node created");
        Ok(node)
    }

    pub fn rename(&mut self, id: NodeId, name: &str, now: DateTime<Utc>) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(WordsError::InvalidInput("Name cannot be empty".to_string()));
        }
        let node = self
            .tree
            .get_mut(id)
            .ok_or_else(|| WordsError::NotFound(format!("node {}", id)))?;
        node.set_name(name, now);
        Ok(())
    }

    /// Removes a node and everything below it. Documents lose their blob
    /// first; a document whose blob cannot be removed stays, together with
    /// the folders between it and `id`, so nothing is left without a parent.
    pub fn delete(&mut self, id: NodeId) -> Result<DeleteReport> {
        self.node(id)?;
        let order = self.tree.delete_order(id);
        let mut report = DeleteReport::default();
        let mut keep: HashSet<NodeId> = HashSet::new();

        for &node_id in &order {
            let Some(key) = self.tree.get(node_id).and_then(Node::content_key).cloned() else {
                continue;
            };
            // Placeholder keys (e.g. "") never had a blob.
            if !key.is_path_safe() {
                debug!(project = %self.project(), id = node_id, key = %key, "no blob to remove");
                continue;
            }
            if let Err(e) = self.content.delete(&key) {
                warn!(project = %self.project(), id = node_id, error = %e, "content blob not removed");
                self.keep_with_ancestors(node_id, id, &mut keep);
                report.failed.push((node_id, e));
            }
        }

        let doomed: HashSet<NodeId> = order
            .iter()
            .copied()
            .filter(|n| !keep.contains(n))
            .collect();
        report.removed = order.into_iter().filter(|n| doomed.contains(n)).collect();
        self.tree.remove_all(&doomed);
        debug!(
            project = %self.project(),
            removed = report.removed.len(),
            failed = report.failed.len(),
            "delete finished"
        );
        Ok(report)
    }

    fn keep_with_ancestors(&self, from: NodeId, top: NodeId, keep: &mut HashSet<NodeId>) {
        let mut current = Some(from);
        while let Some(curr) = current {
            if !keep.insert(curr) || curr == top {
                break;
            }
            current = self.tree.get(curr).map(|n| n.parent_id);
        }
    }

    pub fn move_node(&mut self, id: NodeId, new_parent: NodeId, index: usize) -> Result<()> {
        self.tree.relocate(id, new_parent, index)
    }

    pub fn set_word_count(&mut self, id: NodeId, words: u64, now: DateTime<Utc>) -> Result<()> {
        self.document_key(id)?;
        if let Some(node) = self.tree.get_mut(id) {
            node.data.word_count = Some(words);
            node.data.last_modified = now;
        }
        Ok(())
    }

    /// Writes a document body and records its word count. The node is only
    /// touched once the blob is on disk.
    pub fn save_document(
        &mut self,
        id: NodeId,
        body: &str,
        words: u64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let key = self.document_key(id)?;
        self.content.save(&key, body)?;
        self.set_word_count(id, words, now)
    }

    pub fn load_document(&self, id: NodeId) -> Result<String> {
        let key = self.document_key(id)?;
        self.content.load(&key)
    }

    pub fn aggregate_word_count(&self) -> u64 {
        self.tree.aggregate_word_count()
    }

    pub fn list_descendants(&self, id: NodeId) -> Result<Vec<Node>> {
        if id != ROOT_ID {
            self.node(id)?;
        }
        Ok(self.tree.descendants(id).into_iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Area, MemBackend};
    use chrono::TimeZone;
    use std::rc::Rc;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn engine() -> (Rc<MemBackend>, TreeEngine<MemBackend>) {
        let backend = Rc::new(MemBackend::new());
        let project = ProjectName::new("Book").unwrap();
        backend.create_area(Area::Project(&project)).unwrap();
        let content = ContentStore::new(backend.clone(), project);
        (backend, TreeEngine::new(Tree::new(), content))
    }

    fn blob_exists(backend: &MemBackend, node: &Node) -> bool {
        let project = ProjectName::new("Book").unwrap();
        backend
            .read_content(&project, node.content_key().unwrap())
            .unwrap()
            .is_some()
    }

    #[test]
    fn create_file_writes_empty_blob() {
        let (backend, mut engine) = engine();
        let node = engine
            .create_node(ROOT_ID, NodeKind::File, "Prologue", at(0))
            .unwrap();
        assert_eq!(node.id, 1);
        assert!(blob_exists(&backend, &node));
        assert_eq!(engine.load_document(node.id).unwrap(), "");
    }

    #[test]
    fn failed_blob_write_adds_nothing() {
        let (backend, mut engine) = engine();
        backend.set_simulate_write_error(true);
        let err = engine
            .create_node(ROOT_ID, NodeKind::File, "Prologue", at(0))
            .unwrap_err();
        assert!(matches!(err, WordsError::Storage(_)));
        assert!(engine.tree().is_empty());
    }

    #[test]
    fn create_under_document_is_invalid_move() {
        let (_backend, mut engine) = engine();
        let doc = engine
            .create_node(ROOT_ID, NodeKind::File, "Doc", at(0))
            .unwrap();
        assert!(matches!(
            engine.create_node(doc.id, NodeKind::File, "Inner", at(1)),
            Err(WordsError::InvalidMove(_))
        ));
        assert!(matches!(
            engine.create_node(77, NodeKind::Folder, "Inner", at(1)),
            Err(WordsError::InvalidMove(_))
        ));
    }

    #[test]
    fn rename_updates_both_names() {
        let (_backend, mut engine) = engine();
        let folder = engine
            .create_node(ROOT_ID, NodeKind::Folder, "Draft", at(0))
            .unwrap();
        engine.rename(folder.id, "Act One", at(5)).unwrap();
        let node = engine.tree().get(folder.id).unwrap();
        assert_eq!(node.name, "Act One");
        assert_eq!(node.data.file_name, "Act One");
        assert_eq!(node.data.last_modified, at(5));
        assert!(matches!(
            engine.rename(42, "x", at(6)),
            Err(WordsError::NotFound(_))
        ));
    }

    #[test]
    fn document_with_placeholder_key_can_be_deleted() {
        let (_backend, engine) = engine();
        let mut doc = Node::file(1, ROOT_ID, "Imported", at(0));
        doc.data.file_id = Some(ContentKey::from(""));
        let tree = Tree::from_nodes(vec![doc]).unwrap();
        let mut engine = TreeEngine::new(tree, engine.content);

        let report = engine.delete(1).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.removed, vec![1]);
        assert!(engine.tree().is_empty());
    }

    #[test]
    fn deleting_a_folder_removes_every_descendant_and_blob() {
        let (backend, mut engine) = engine();
        let f = engine.create_node(ROOT_ID, NodeKind::Folder, "F", at(0)).unwrap();
        let a = engine.create_node(f.id, NodeKind::File, "a", at(0)).unwrap();
        let b = engine.create_node(f.id, NodeKind::Folder, "b", at(0)).unwrap();
        let c = engine.create_node(b.id, NodeKind::File, "c", at(0)).unwrap();
        let keep = engine.create_node(ROOT_ID, NodeKind::File, "keep", at(0)).unwrap();

        let report = engine.delete(f.id).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.removed.len(), 4);

        let gone: HashSet<NodeId> = [f.id, a.id, b.id, c.id].into_iter().collect();
        assert!(engine
            .tree()
            .nodes()
            .iter()
            .all(|n| !gone.contains(&n.parent_id) && !gone.contains(&n.id)));
        assert!(!blob_exists(&backend, &a));
        assert!(!blob_exists(&backend, &c));
        assert!(blob_exists(&backend, &keep));
    }

    #[test]
    fn partial_delete_keeps_failed_document_and_its_folders() {
        let (backend, mut engine) = engine();
        let f = engine.create_node(ROOT_ID, NodeKind::Folder, "F", at(0)).unwrap();
        let a = engine.create_node(f.id, NodeKind::File, "a", at(0)).unwrap();
        let b = engine.create_node(f.id, NodeKind::Folder, "b", at(0)).unwrap();
        let c = engine.create_node(b.id, NodeKind::File, "c", at(0)).unwrap();
        backend.fail_delete_of(c.content_key().unwrap());

        let report = engine.delete(f.id).unwrap();
        assert_eq!(report.removed, vec![a.id]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, c.id);

        let ids: Vec<NodeId> = engine.tree().nodes().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![f.id, b.id, c.id]);
        assert!(matches!(
            report.into_result(),
            Err(WordsError::PartialDelete { removed: 1, failed: 1, .. })
        ));
    }

    #[test]
    fn word_counts_follow_saves_and_deletes() {
        let (_backend, mut engine) = engine();
        let f = engine.create_node(ROOT_ID, NodeKind::Folder, "F", at(0)).unwrap();
        let a = engine.create_node(f.id, NodeKind::File, "a", at(0)).unwrap();
        let b = engine.create_node(ROOT_ID, NodeKind::File, "b", at(0)).unwrap();

        engine.save_document(a.id, "one two three", 3, at(1)).unwrap();
        engine.save_document(b.id, "four five", 2, at(1)).unwrap();
        assert_eq!(engine.aggregate_word_count(), 5);
        assert_eq!(engine.load_document(a.id).unwrap(), "one two three");

        engine.move_node(a.id, ROOT_ID, 0).unwrap();
        assert_eq!(engine.aggregate_word_count(), 5);

        engine.delete(b.id).unwrap();
        assert_eq!(engine.aggregate_word_count(), 3);
    }

    #[test]
    fn folders_have_no_document() {
        let (_backend, mut engine) = engine();
        let f = engine.create_node(ROOT_ID, NodeKind::Folder, "F", at(0)).unwrap();
        assert!(matches!(
            engine.save_document(f.id, "text", 1, at(1)),
            Err(WordsError::InvalidInput(_))
        ));
    }

    #[test]
    fn list_descendants_of_missing_node_fails() {
        let (_backend, mut engine) = engine();
        let f = engine.create_node(ROOT_ID, NodeKind::Folder, "F", at(0)).unwrap();
        engine.create_node(f.id, NodeKind::File, "a", at(0)).unwrap();
        assert_eq!(engine.list_descendants(f.id).unwrap().len(), 1);
        assert_eq!(engine.list_descendants(ROOT_ID).unwrap().len(), 2);
        assert!(engine.list_descendants(9).is_err());
    }
}
