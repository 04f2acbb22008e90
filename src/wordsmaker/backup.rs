//! # Backup & Restore
//!
//! A backup entry is a full copy of `Projects/<name>/` placed under the
//! backup root as `<name>_<YYYYMMDDThhmmss>` (UTC). Entries are discovered by
//! listing the backup root; there is no index file. Because the timestamp
//! sorts lexicographically, the smallest matching name is always the oldest
//! entry, and that is the one evicted once a project has
//! [`MAX_BACKUPS`] of them.
//!
//! Restore is staged: the entry is copied next to the live project first and
//! only swapped in once the copy is complete, so a failed restore leaves the
//! live project as it was.

use crate::clock::Clock;
use crate::error::{Result, WordsError};
use crate::model::{ProjectName, SnapshotPatch};
use crate::store::{Area, MetadataStore, StorageBackend};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use tracing::{info, warn};

pub const MAX_BACKUPS: usize = 5;
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";
const TIMESTAMP_LEN: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub name: String,
    pub project: String,
    pub created_at: DateTime<Utc>,
}

impl BackupEntry {
    pub fn entry_name(project: &ProjectName, at: DateTime<Utc>) -> String {
        format!("{}_{}", project, at.format(TIMESTAMP_FORMAT))
    }

    /// Recognises an entry of `project`: the `<project>_` prefix followed by
    /// a well-formed timestamp and nothing else.
    pub fn parse(name: &str, project: &ProjectName) -> Option<Self> {
        let suffix = name.strip_prefix(project.as_str())?.strip_prefix('_')?;
        if suffix.len() != TIMESTAMP_LEN {
            return None;
        }
        let naive = NaiveDateTime::parse_from_str(suffix, TIMESTAMP_FORMAT).ok()?;
        Some(Self {
            name: name.to_string(),
            project: project.as_str().to_string(),
            created_at: naive.and_utc(),
        })
    }
}

/// A backup is due when there has never been one, or the last one is older
/// than `interval`.
pub fn is_backup_due(
    last_backed_up: Option<DateTime<Utc>>,
    interval: Duration,
    now: DateTime<Utc>,
) -> bool {
    match last_backed_up {
        None => true,
        Some(last) => now - last > interval,
    }
}

pub struct BackupManager<B: StorageBackend, C: Clock> {
    store: MetadataStore<B>,
    clock: C,
    max_backups: usize,
}

impl<B: StorageBackend, C: Clock> BackupManager<B, C> {
    pub fn new(store: MetadataStore<B>, clock: C) -> Self {
        Self {
            store,
            clock,
            max_backups: MAX_BACKUPS,
        }
    }

    fn backend(&self) -> &B {
        self.store.backend()
    }

    /// Entries of `project`, oldest first.
    pub fn list_backups(&self, project: &ProjectName) -> Result<Vec<BackupEntry>> {
        let mut entries: Vec<BackupEntry> = self
            .backend()
            .list_backup_dirs()?
            .iter()
            .filter_map(|name| BackupEntry::parse(name, project))
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Copies the live project into a new entry, evicting the oldest entries
    /// first so at most [`MAX_BACKUPS`] remain. Records `lastBackedUp` on
    /// success.
    pub fn backup(&self, project: &ProjectName) -> Result<BackupEntry> {
        let backend = self.backend();
        if !backend.area_exists(Area::Project(project))? {
            return Err(WordsError::NotFound(format!("project {}", project)));
        }
        backend.ensure_backup_root()?;

        let now = self.clock.now();
        let name = BackupEntry::entry_name(project, now);
        let mut existing = self.list_backups(project)?;

        if existing.iter().any(|e| e.name == name) {
            backend.remove_tree(Area::Backup(&name))?;
            existing.retain(|e| e.name != name);
        }
        while existing.len() >= self.max_backups {
            let oldest = existing.remove(0);
            backend.remove_tree(Area::Backup(&oldest.name))?;
            info!(project = %project, entry = %oldest.name, "evicted oldest backup");
        }

        if let Err(e) = backend.copy_tree(Area::Project(project), Area::Backup(&name)) {
            if let Err(cleanup) = backend.remove_tree(Area::Backup(&name)) {
                warn!(entry = %name, error = %cleanup, "partial backup left behind");
            }
            return Err(e);
        }
        info!(project = %project, entry = %name, "backup created");

        if let Err(e) = self
            .store
            .update(project, SnapshotPatch::backed_up_at(now))
        {
            warn!(project = %project, error = %e, "backup taken but lastBackedUp not recorded");
        }

        Ok(BackupEntry {
            name,
            project: project.as_str().to_string(),
            created_at: now,
        })
    }

    /// Runs [`Self::backup`] only when one is due.
    pub fn backup_if_due(
        &self,
        project: &ProjectName,
        interval: Duration,
    ) -> Result<Option<BackupEntry>> {
        let snapshot = self.store.read(project)?;
        if !is_backup_due(snapshot.last_backed_up, interval, self.clock.now()) {
            return Ok(None);
        }
        self.backup(project).map(Some)
    }

    /// Replaces the live project directory with the contents of `entry`.
    /// Any open session of the project must be reloaded afterwards.
    pub fn restore(&self, project: &ProjectName, entry: &str) -> Result<()> {
        let backend = self.backend();
        let entry = BackupEntry::parse(entry, project).ok_or_else(|| {
            WordsError::InvalidInput(format!(
                "'{}' is not a backup of project {}",
                entry, project
            ))
        })?;
        if !backend.area_exists(Area::Backup(&entry.name))? {
            return Err(WordsError::NotFound(format!("backup {}", entry.name)));
        }

        backend.remove_tree(Area::Staging(project))?;
        if let Err(e) = backend.copy_tree(Area::Backup(&entry.name), Area::Staging(project)) {
            if let Err(cleanup) = backend.remove_tree(Area::Staging(project)) {
                warn!(project = %project, error = %cleanup, "restore staging left behind");
            }
            return Err(e);
        }

        backend.remove_tree(Area::Project(project))?;
        backend.rename_tree(Area::Staging(project), Area::Project(project))?;
        info!(project = %project, entry = %entry.name, "backup restored");
        Ok(())
    }
}
