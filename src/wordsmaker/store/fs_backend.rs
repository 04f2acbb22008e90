use super::backend::{Area, StorageBackend, StorageLayout};
use crate::error::{Result, WordsError};
use crate::model::{ContentKey, ProjectName};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Production backend: projects under `<app root>/Projects`, backups under a
/// separate (user-visible) backup root.
pub struct FsBackend {
    layout: StorageLayout,
}

impl FsBackend {
    pub fn new(app_root: impl Into<PathBuf>, backup_root: impl Into<PathBuf>) -> Self {
        Self {
            layout: StorageLayout::new(app_root, backup_root),
        }
    }

    fn ensure_dir(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).map_err(WordsError::Io)?;
        }
        Ok(())
    }

    fn read_optional(&self, path: &Path) -> Result<Option<String>> {
        if !path.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(path).map_err(WordsError::Io)?;
        Ok(Some(content))
    }

    fn write_atomic(&self, path: &Path, content: &str) -> Result<()> {
        let dir = path
            .parent()
            .ok_or_else(|| WordsError::Storage(format!("No parent directory for {:?}", path)))?;
        let tmp_path = dir.join(format!(".write-{}.tmp", Uuid::new_v4()));
        fs::write(&tmp_path, content).map_err(WordsError::Io)?;
        if let Err(e) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(WordsError::Io(e));
        }
        Ok(())
    }

    fn list_dir_names(&self, path: &Path) -> Result<Vec<String>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(path).map_err(WordsError::Io)? {
            let entry = entry.map_err(WordsError::Io)?;
            if !entry.file_type().map_err(WordsError::Io)?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Recursive tree copy. Containers are mirrored, items copied one by one.
fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).map_err(WordsError::Io)?;

    for entry in fs::read_dir(src).map_err(WordsError::Io)? {
        let entry = entry.map_err(WordsError::Io)?;
        let path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if entry.file_type().map_err(WordsError::Io)?.is_dir() {
            copy_dir_recursive(&path, &dst_path)?;
        } else {
            fs::copy(&path, &dst_path).map_err(|e| {
                WordsError::Storage(format!("Failed to copy {:?}: {}", path, e))
            })?;
        }
    }

    Ok(())
}

impl StorageBackend for FsBackend {
    fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    fn list_projects(&self) -> Result<Vec<ProjectName>> {
        let mut projects = Vec::new();
        for name in self.list_dir_names(&self.layout.projects_dir())? {
            if name.starts_with('.') {
                continue;
            }
            match ProjectName::new(name.clone()) {
                Ok(project) => projects.push(project),
                Err(e) => warn!(dir = %name, error = %e, "skipping unusable project directory"),
            }
        }
        Ok(projects)
    }

    fn read_metadata(&self, project: &ProjectName) -> Result<Option<String>> {
        self.read_optional(&self.layout.metadata_file(project))
    }

    fn write_metadata(&self, project: &ProjectName, raw: &str) -> Result<()> {
        let path = self.layout.metadata_file(project);
        if !path.parent().is_some_and(Path::is_dir) {
            return Err(WordsError::NotFound(format!("project {}", project)));
        }
        self.write_atomic(&path, raw)?;
        debug!(project = %project, "metadata written");
        Ok(())
    }

    fn read_content(&self, project: &ProjectName, key: &ContentKey) -> Result<Option<String>> {
        self.read_optional(&self.layout.content_file(project, key)?)
    }

    fn write_content(&self, project: &ProjectName, key: &ContentKey, raw: &str) -> Result<()> {
        let path = self.layout.content_file(project, key)?;
        if !path.parent().is_some_and(Path::is_dir) {
            return Err(WordsError::NotFound(format!("project {}", project)));
        }
        self.write_atomic(&path, raw)
    }

    fn delete_content(&self, project: &ProjectName, key: &ContentKey) -> Result<()> {
        let path = self.layout.content_file(project, key)?;
        if path.exists() {
            fs::remove_file(path).map_err(WordsError::Io)?;
        }
        Ok(())
    }

    fn area_exists(&self, area: Area<'_>) -> Result<bool> {
        Ok(self.layout.area_dir(area)?.is_dir())
    }

    fn create_area(&self, area: Area<'_>) -> Result<()> {
        self.ensure_dir(&self.layout.area_dir(area)?)
    }

    fn copy_tree(&self, from: Area<'_>, to: Area<'_>) -> Result<()> {
        let src = self.layout.area_dir(from)?;
        let dst = self.layout.area_dir(to)?;
        if !src.is_dir() {
            return Err(WordsError::NotFound(format!("{:?}", src)));
        }
        copy_dir_recursive(&src, &dst)
    }

    fn remove_tree(&self, area: Area<'_>) -> Result<()> {
        let dir = self.layout.area_dir(area)?;
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(WordsError::Io)?;
        }
        Ok(())
    }

    fn rename_tree(&self, from: Area<'_>, to: Area<'_>) -> Result<()> {
        let src = self.layout.area_dir(from)?;
        let dst = self.layout.area_dir(to)?;
        if dst.exists() {
            return Err(WordsError::Storage(format!("{:?} already exists", dst)));
        }
        if let Some(parent) = dst.parent() {
            self.ensure_dir(parent)?;
        }
        fs::rename(&src, &dst).map_err(WordsError::Io)
    }

    fn ensure_backup_root(&self) -> Result<()> {
        self.ensure_dir(self.layout.backup_root())
    }

    fn list_backup_dirs(&self) -> Result<Vec<String>> {
        self.list_dir_names(self.layout.backup_root())
    }

    fn read_settings(&self) -> Result<Option<String>> {
        self.read_optional(&self.layout.settings_file())
    }

    fn write_settings(&self, raw: &str) -> Result<()> {
        let path = self.layout.settings_file();
        if let Some(dir) = path.parent() {
            self.ensure_dir(dir)?;
        }
        self.write_atomic(&path, raw)
    }
}
