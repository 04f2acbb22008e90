use crate::error::{Result, WordsError};
use crate::model::{ContentKey, ProjectName};
use std::path::{Path, PathBuf};

pub const PROJECTS_DIR: &str = "Projects";
pub const USER_DIR: &str = "User";
pub const SETTINGS_FILE: &str = "settings.json";
pub const METADATA_FILE: &str = "metadata.json";

/// A directory tree the backend can copy, move or remove as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Area<'a> {
    /// `Projects/<name>/` under the application root.
    Project(&'a ProjectName),
    /// Hidden sibling of a project directory used while a restore is copied in.
    Staging(&'a ProjectName),
    /// `<backup root>/<entry name>/`.
    Backup(&'a str),
}

/// Where every piece of state lives relative to the two storage roots.
/// Shared by the filesystem and in-memory backends so both see the same
/// layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    app_root: PathBuf,
    backup_root: PathBuf,
}

impl StorageLayout {
    pub fn new(app_root: impl Into<PathBuf>, backup_root: impl Into<PathBuf>) -> Self {
        Self {
            app_root: app_root.into(),
            backup_root: backup_root.into(),
        }
    }

    pub fn app_root(&self) -> &Path {
        &self.app_root
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    pub fn projects_dir(&self) -> PathBuf {
        self.app_root.join(PROJECTS_DIR)
    }

    pub fn settings_file(&self) -> PathBuf {
        self.app_root.join(USER_DIR).join(SETTINGS_FILE)
    }

    pub fn area_dir(&self, area: Area<'_>) -> Result<PathBuf> {
        match area {
            Area::Project(name) => Ok(self.projects_dir().join(name.as_str())),
            Area::Staging(name) => Ok(self
                .projects_dir()
                .join(format!(".restore-{}", name.as_str()))),
            Area::Backup(entry) => {
                if entry.is_empty()
                    || entry.starts_with('.')
                    || entry.chars().any(|c| c == '/' || c == '\\')
                {
                    return Err(WordsError::InvalidInput(format!(
                        "Invalid backup name: {}",
                        entry
                    )));
                }
                Ok(self.backup_root.join(entry))
            }
        }
    }

    pub fn metadata_file(&self, project: &ProjectName) -> PathBuf {
        self.projects_dir().join(project.as_str()).join(METADATA_FILE)
    }

    pub fn content_file(&self, project: &ProjectName, key: &ContentKey) -> Result<PathBuf> {
        if !key.is_path_safe() {
            return Err(WordsError::InvalidInput(format!(
                "Invalid content key: {}",
                key
            )));
        }
        Ok(self
            .projects_dir()
            .join(project.as_str())
            .join(format!("{}.json", key.as_str())))
    }
}

/// Abstract interface for raw storage I/O.
///
/// This trait handles the "how" of storage (filesystem vs memory) on plain
/// strings; the content store, metadata store and backup manager handle the
/// "what" (encoding, merging, rotation).
pub trait StorageBackend {
    fn layout(&self) -> &StorageLayout;

    // --- Projects ---

    /// Names of all project directories. Staging directories are skipped.
    fn list_projects(&self) -> Result<Vec<ProjectName>>;

    /// Read `metadata.json`. `Ok(None)` when the project or file is absent.
    fn read_metadata(&self, project: &ProjectName) -> Result<Option<String>>;

    /// Overwrite `metadata.json`. The project directory must exist.
    fn write_metadata(&self, project: &ProjectName, raw: &str) -> Result<()>;

    // --- Content ---

    /// Read a raw content blob. `Ok(None)` when it does not exist.
    fn read_content(&self, project: &ProjectName, key: &ContentKey) -> Result<Option<String>>;

    /// Write a raw content blob (temp file then rename).
    fn write_content(&self, project: &ProjectName, key: &ContentKey, raw: &str) -> Result<()>;

    /// Remove a content blob. Removing a missing blob is not an error.
    fn delete_content(&self, project: &ProjectName, key: &ContentKey) -> Result<()>;

    // --- Whole trees ---

    fn area_exists(&self, area: Area<'_>) -> Result<bool>;

    /// Create an empty directory for `area` (and any missing parents).
    fn create_area(&self, area: Area<'_>) -> Result<()>;

    /// Mirror every container and item under `from` into `to`, creating `to`
    /// if needed. Stops at the first failure.
    fn copy_tree(&self, from: Area<'_>, to: Area<'_>) -> Result<()>;

    /// Recursively remove `area`. Removing a missing area is not an error.
    fn remove_tree(&self, area: Area<'_>) -> Result<()>;

    /// Move `from` to `to`. `to` must not exist.
    fn rename_tree(&self, from: Area<'_>, to: Area<'_>) -> Result<()>;

    // --- Backups ---

    fn ensure_backup_root(&self) -> Result<()>;

    /// Names of the directories directly under the backup root.
    fn list_backup_dirs(&self) -> Result<Vec<String>>;

    // --- Settings ---

    fn read_settings(&self) -> Result<Option<String>>;

    fn write_settings(&self, raw: &str) -> Result<()>;
}
