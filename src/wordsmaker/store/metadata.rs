use super::backend::{Area, StorageBackend};
use crate::error::{Result, WordsError};
use crate::model::{ProjectName, ProjectSummary, ProjectType, Snapshot, SnapshotPatch};
use crate::tree::Tree;
use chrono::{DateTime, Utc};
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Reads, writes and merges project snapshots, and owns the project
/// directory lifecycle.
pub struct MetadataStore<B: StorageBackend> {
    backend: Rc<B>,
}

impl<B: StorageBackend> Clone for MetadataStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Rc::clone(&self.backend),
        }
    }
}

impl<B: StorageBackend> MetadataStore<B> {
    pub fn new(backend: Rc<B>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Rc<B> {
        &self.backend
    }

    /// Loads and validates a snapshot. The tree must satisfy every
    /// structural invariant or the project is reported corrupt.
    pub fn read(&self, project: &ProjectName) -> Result<Snapshot> {
        let raw = self
            .backend
            .read_metadata(project)?
            .ok_or_else(|| WordsError::NotFound(format!("project {}", project)))?;
        let snapshot = Snapshot::from_json(&raw)?;
        Tree::from_nodes(snapshot.tree_data.clone())?;
        Ok(snapshot)
    }

    /// Full overwrite.
    pub fn write(&self, project: &ProjectName, snapshot: &Snapshot) -> Result<()> {
        let raw = snapshot.to_json()?;
        self.backend.write_metadata(project, &raw)
    }

    /// Read, shallow-merge, write. Last write wins.
    pub fn update(&self, project: &ProjectName, patch: SnapshotPatch) -> Result<Snapshot> {
        let mut snapshot = self.read(project)?;
        patch.apply_to(&mut snapshot);
        self.write(project, &snapshot)?;
        debug!(project = %project, nodes = snapshot.tree_data.len(), "snapshot updated");
        Ok(snapshot)
    }

    pub fn exists(&self, project: &ProjectName) -> Result<bool> {
        self.backend.area_exists(Area::Project(project))
    }

    pub fn create_project(
        &self,
        project: &ProjectName,
        project_type: ProjectType,
        now: DateTime<Utc>,
    ) -> Result<Snapshot> {
        if self.exists(project)? {
            return Err(WordsError::InvalidInput(format!(
                "Project already exists: {}",
                project
            )));
        }
        self.backend.create_area(Area::Project(project))?;
        let snapshot = Snapshot::empty(project, project_type, now);
        self.write(project, &snapshot)?;
        info!(project = %project, kind = project_type.as_str(), "project created");
        Ok(snapshot)
    }

    /// Removes the project directory with every blob in it. Backups are kept.
    pub fn delete_project(&self, project: &ProjectName) -> Result<()> {
        if !self.exists(project)? {
            return Err(WordsError::NotFound(format!("project {}", project)));
        }
        self.backend.remove_tree(Area::Project(project))?;
        info!(project = %project, "project deleted");
        Ok(())
    }

    /// Summaries of every readable project, sorted by name.
    pub fn list_summaries(&self) -> Result<Vec<ProjectSummary>> {
        let mut summaries = Vec::new();
        for project in self.backend.list_projects()? {
            match self.read(&project) {
                Ok(snapshot) => summaries.push(snapshot.summary()),
                Err(e) => warn!(project = %project, error = %e, "skipping unreadable project"),
            }
        }
        summaries.sort_by(|a, b| a.project_name.cmp(&b.project_name));
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, ROOT_ID};
    use crate::store::mem_backend::MemBackend;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn setup() -> (Rc<MemBackend>, MetadataStore<MemBackend>, ProjectName) {
        let backend = Rc::new(MemBackend::new());
        let store = MetadataStore::new(backend.clone());
        let project = ProjectName::new("Book").unwrap();
        store
            .create_project(&project, ProjectType::Novel, at(0))
            .unwrap();
        (backend, store, project)
    }

    #[test]
    fn created_project_reads_back_empty() {
        let (_backend, store, project) = setup();
        let snapshot = store.read(&project).unwrap();
        assert_eq!(snapshot.project_name, "Book");
        assert_eq!(snapshot.project_type, ProjectType::Novel);
        assert!(snapshot.tree_data.is_empty());
        assert_eq!(snapshot.last_modified, None);
        assert_eq!(snapshot.word_count, 0);
    }

    #[test]
    fn creating_twice_fails() {
        let (_backend, store, project) = setup();
        assert!(store
            .create_project(&project, ProjectType::Unset, at(1))
            .is_err());
    }

    #[test]
    fn read_missing_project_is_not_found() {
        let (_backend, store, _) = setup();
        let other = ProjectName::new("Other").unwrap();
        assert!(matches!(store.read(&other), Err(WordsError::NotFound(_))));
    }

    #[test]
    fn dangling_parent_is_corrupt() {
        let (backend, store, project) = setup();
        let mut snapshot = store.read(&project).unwrap();
        snapshot.tree_data = vec![Node::file(1, 42, "orphan", at(1))];
        backend
            .write_metadata(&project, &snapshot.to_json().unwrap())
            .unwrap();
        assert!(matches!(store.read(&project), Err(WordsError::Corrupt(_))));
    }

    #[test]
    fn write_of_read_is_idempotent() {
        let (backend, store, project) = setup();
        let patch = SnapshotPatch::tree_state(
            vec![
                Node::folder(1, ROOT_ID, "Part I", at(1)),
                Node::file(2, 1, "Opening", at(1)),
            ],
            at(1),
        );
        store.update(&project, patch).unwrap();

        let first = backend.read_metadata(&project).unwrap().unwrap();
        store.write(&project, &store.read(&project).unwrap()).unwrap();
        let second = backend.read_metadata(&project).unwrap().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn summaries_report_the_tree_sum_not_the_stored_aggregate() {
        let (backend, store, project) = setup();
        let mut doc = Node::file(1, ROOT_ID, "Opening", at(1));
        doc.data.word_count = Some(42);
        let mut snapshot = store.read(&project).unwrap();
        snapshot.tree_data = vec![doc];
        snapshot.word_count = 5000;
        backend
            .write_metadata(&project, &snapshot.to_json().unwrap())
            .unwrap();

        let summaries = store.list_summaries().unwrap();
        assert_eq!(summaries[0].word_count, 42);
    }

    #[test]
    fn update_merges_over_stored_fields() {
        let (_backend, store, project) = setup();
        store
            .update(&project, SnapshotPatch::backed_up_at(at(30)))
            .unwrap();
        let merged = store
            .update(
                &project,
                SnapshotPatch::tree_state(vec![Node::folder(1, ROOT_ID, "A", at(40))], at(40)),
            )
            .unwrap();
        assert_eq!(merged.last_backed_up, Some(at(30)));
        assert_eq!(merged.last_modified, Some(at(40)));
        assert_eq!(merged.project_type, ProjectType::Novel);
    }

    #[test]
    fn listing_skips_corrupt_projects() {
        let (backend, store, _) = setup();
        backend.put_file("/mem/app/Projects/Broken/metadata.json", "{ not json");
        let summaries = store.list_summaries().unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].project_name, "Book");
    }

    #[test]
    fn delete_project_removes_everything() {
        let (backend, store, project) = setup();
        backend.put_file("/mem/app/Projects/Book/k.json", "{\"content\":\"x\"}");
        store.delete_project(&project).unwrap();
        assert!(!store.exists(&project).unwrap());
        assert_eq!(
            backend.file_count_under(std::path::Path::new("/mem/app/Projects/Book")),
            0
        );
    }
}
