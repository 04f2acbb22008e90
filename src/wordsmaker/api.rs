//! # API Facade
//!
//! The API layer is the single entry point for every client (the bundled
//! CLI, an editor front end, tests). It:
//!
//! - **Takes decoded names**: project names are accepted exactly as
//!   [`Workspace::list_projects`] reports them. Raw, possibly percent-encoded
//!   input is decoded once by the caller with [`ProjectName::decode`]
//! - **Wires components**: builds stores, engine, coordinator and backup
//!   manager around one shared backend and clock
//! - **Returns structured types**: snapshots, nodes, reports; never strings
//!   meant for a terminal
//!
//! ## Two Levels
//!
//! - [`Workspace`]: everything that does not need an open project (project
//!   lifecycle, settings, backups and restores).
//! - [`ProjectSession`]: one open project. Structural mutations go through
//!   the tree engine and are handed to the persistence coordinator, which
//!   writes them once edits pause. Call [`ProjectSession::tick`] from the
//!   event loop and [`ProjectSession::flush`] before closing.
//!
//! ## Generic Over Backend and Clock
//!
//! - Production: `Workspace<FsBackend, SystemClock>`
//! - Testing: `Workspace<MemBackend, ManualClock>`

use crate::backup::{BackupEntry, BackupManager};
use crate::clock::Clock;
use crate::config::UserSettings;
use crate::coordinator::{CoordinatorConfig, FlushFailure, FlushOutcome, PersistenceCoordinator};
use crate::engine::{DeleteReport, TreeEngine};
use crate::error::Result;
use crate::export;
use crate::model::{
    Node, NodeId, NodeKind, ProjectName, ProjectSummary, ProjectType, Snapshot, SnapshotPatch,
};
use crate::store::{ContentStore, MetadataStore, StorageBackend};
use crate::tree::Tree;
use crossbeam_channel::Receiver;
use std::io::Write;
use std::rc::Rc;

pub struct Workspace<B: StorageBackend, C: Clock + Clone> {
    backend: Rc<B>,
    store: MetadataStore<B>,
    clock: C,
    coordinator_config: CoordinatorConfig,
}

impl<B: StorageBackend, C: Clock + Clone> Workspace<B, C> {
    pub fn new(backend: B, clock: C) -> Self {
        let backend = Rc::new(backend);
        Self {
            store: MetadataStore::new(Rc::clone(&backend)),
            backend,
            clock,
            coordinator_config: CoordinatorConfig::default(),
        }
    }

    pub fn with_coordinator_config(mut self, config: CoordinatorConfig) -> Self {
        self.coordinator_config = config;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn backups(&self) -> BackupManager<B, C> {
        BackupManager::new(self.store.clone(), self.clock.clone())
    }

    pub fn settings(&self) -> Result<UserSettings> {
        UserSettings::load_or_init(self.backend.as_ref())
    }

    pub fn save_settings(&self, settings: &UserSettings) -> Result<()> {
        settings.save(self.backend.as_ref())
    }

    pub fn create_project(&self, name: &str, project_type: ProjectType) -> Result<ProjectSummary> {
        let project = ProjectName::new(name)?;
        let snapshot = self
            .store
            .create_project(&project, project_type, self.clock.now())?;
        Ok(snapshot.summary())
    }

    /// Removes the project and all its documents. Its backups are kept.
    pub fn delete_project(&self, name: &str) -> Result<()> {
        let project = ProjectName::new(name)?;
        self.store.delete_project(&project)
    }

    pub fn list_projects(&self) -> Result<Vec<ProjectSummary>> {
        self.store.list_summaries()
    }

    pub fn open_project(&self, name: &str) -> Result<ProjectSession<B, C>> {
        let project = ProjectName::new(name)?;
        ProjectSession::open(
            self.store.clone(),
            project,
            self.clock.clone(),
            self.coordinator_config,
        )
    }

    /// Backups of a project, newest first.
    pub fn list_backups(&self, name: &str) -> Result<Vec<BackupEntry>> {
        let project = ProjectName::new(name)?;
        let mut entries = self.backups().list_backups(&project)?;
        entries.reverse();
        Ok(entries)
    }

    /// Copies the stored state of the project. Flush any open session first
    /// so the entry includes its latest edits.
    pub fn backup_project(&self, name: &str) -> Result<BackupEntry> {
        let project = ProjectName::new(name)?;
        self.backups().backup(&project)
    }

    /// Backs up only when the configured backup interval has elapsed.
    pub fn backup_if_due(&self, name: &str) -> Result<Option<BackupEntry>> {
        let project = ProjectName::new(name)?;
        let interval = self.settings()?.backup_interval();
        self.backups().backup_if_due(&project, interval)
    }

    /// Replaces the live project with a backup entry. Open sessions of the
    /// project must call [`ProjectSession::reload`] afterwards.
    pub fn restore_backup(&self, name: &str, entry: &str) -> Result<()> {
        let project = ProjectName::new(name)?;
        self.backups().restore(&project, entry)
    }
}

/// One open project.
pub struct ProjectSession<B: StorageBackend, C: Clock + Clone> {
    store: MetadataStore<B>,
    clock: C,
    snapshot: Snapshot,
    engine: TreeEngine<B>,
    coordinator: PersistenceCoordinator<B, C>,
    failures: Receiver<FlushFailure>,
}

impl<B: StorageBackend, C: Clock + Clone> ProjectSession<B, C> {
    fn open(
        store: MetadataStore<B>,
        project: ProjectName,
        clock: C,
        config: CoordinatorConfig,
    ) -> Result<Self> {
        let snapshot = store.read(&project)?;
        let tree = Tree::from_nodes(snapshot.tree_data.clone())?;
        let content = ContentStore::new(Rc::clone(store.backend()), project.clone());
        let (coordinator, failures) =
            PersistenceCoordinator::new(store.clone(), project, clock.clone(), config);
        Ok(Self {
            store,
            clock,
            snapshot,
            engine: TreeEngine::new(tree, content),
            coordinator,
            failures,
        })
    }

    pub fn project(&self) -> &ProjectName {
        self.engine.project()
    }

    pub fn tree(&self) -> &Tree {
        self.engine.tree()
    }

    /// The stored summary fields combined with the in-memory tree.
    pub fn snapshot(&self) -> Snapshot {
        let mut snapshot = self.snapshot.clone();
        snapshot.tree_data = self.engine.nodes();
        snapshot.word_count = self.engine.aggregate_word_count();
        snapshot
    }

    pub fn summary(&self) -> ProjectSummary {
        self.snapshot().summary()
    }

    pub fn word_count(&self) -> u64 {
        self.engine.aggregate_word_count()
    }

    fn schedule_flush(&mut self) {
        let now = self.clock.now();
        self.snapshot.last_modified = Some(now);
        self.coordinator
            .submit(SnapshotPatch::tree_state(self.engine.nodes(), now));
    }

    pub fn create_node(&mut self, parent: NodeId, kind: NodeKind, name: &str) -> Result<Node> {
        let node = self
            .engine
            .create_node(parent, kind, name, self.clock.now())?;
        self.schedule_flush();
        Ok(node)
    }

    pub fn rename(&mut self, id: NodeId, name: &str) -> Result<()> {
        self.engine.rename(id, name, self.clock.now())?;
        self.schedule_flush();
        Ok(())
    }

    /// Whatever was removed is scheduled for persistence even when the
    /// report lists failures.
    pub fn delete(&mut self, id: NodeId) -> Result<DeleteReport> {
        let report = self.engine.delete(id)?;
        if !report.removed.is_empty() {
            self.schedule_flush();
        }
        Ok(report)
    }

    pub fn move_node(&mut self, id: NodeId, new_parent: NodeId, index: usize) -> Result<()> {
        self.engine.move_node(id, new_parent, index)?;
        self.schedule_flush();
        Ok(())
    }

    /// Stores a document body. `words` comes from the editing surface.
    pub fn save_content(&mut self, id: NodeId, body: &str, words: u64) -> Result<()> {
        self.engine
            .save_document(id, body, words, self.clock.now())?;
        self.schedule_flush();
        Ok(())
    }

    pub fn load_content(&self, id: NodeId) -> Result<String> {
        self.engine.load_document(id)
    }

    pub fn list_descendants(&self, id: NodeId) -> Result<Vec<Node>> {
        self.engine.list_descendants(id)
    }

    pub fn has_pending(&self) -> bool {
        self.coordinator.has_pending()
    }

    pub fn tick(&mut self) -> FlushOutcome {
        let outcome = self.coordinator.tick();
        if let FlushOutcome::Flushed(stored) = &outcome {
            self.adopt(stored);
        }
        outcome
    }

    /// Writes any pending state now.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(stored) = self.coordinator.flush_now()? {
            self.adopt(&stored);
        }
        Ok(())
    }

    fn adopt(&mut self, stored: &Snapshot) {
        self.snapshot.last_modified = stored.last_modified;
        self.snapshot.last_backed_up = stored.last_backed_up;
        self.snapshot.project_type = stored.project_type;
    }

    /// Flushes that failed in [`Self::tick`].
    pub fn failures(&self) -> &Receiver<FlushFailure> {
        &self.failures
    }

    /// Drops pending state and rebuilds the session from disk, e.g. after a
    /// restore.
    pub fn reload(&mut self) -> Result<()> {
        self.coordinator.discard();
        let project = self.project().clone();
        let snapshot = self.store.read(&project)?;
        let tree = Tree::from_nodes(snapshot.tree_data.clone())?;
        let content = ContentStore::new(Rc::clone(self.store.backend()), project);
        self.engine = TreeEngine::new(tree, content);
        self.snapshot = snapshot;
        Ok(())
    }

    pub fn export<W: Write>(&self, writer: W) -> Result<()> {
        export::write_archive(writer, &self.engine)
    }
}
