use super::backend::{Area, StorageBackend, StorageLayout};
use crate::error::{Result, WordsError};
use crate::model::{ContentKey, ProjectName};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

/// In-memory storage backend for testing.
///
/// Models a small filesystem (a set of directories plus a map of files) laid
/// out exactly like [`super::fs_backend::FsBackend`], so tree copies and
/// removals behave the same way. Uses `RefCell` for interior mutability since
/// the core is single-threaded.
pub struct MemBackend {
    layout: StorageLayout,
    dirs: RefCell<BTreeSet<PathBuf>>,
    files: RefCell<BTreeMap<PathBuf, String>>,
    simulate_write_error: RefCell<bool>,
    failing_deletes: RefCell<HashSet<ContentKey>>,
    copy_budget: RefCell<Option<usize>>,
}

impl Default for MemBackend {
    fn default() -> Self {
        Self {
            layout: StorageLayout::new("/mem/app", "/mem/backups"),
            dirs: RefCell::new(BTreeSet::new()),
            files: RefCell::new(BTreeMap::new()),
            simulate_write_error: RefCell::new(false),
            failing_deletes: RefCell::new(HashSet::new()),
            copy_budget: RefCell::new(None),
        }
    }
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail until turned off again.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        *self.simulate_write_error.borrow_mut() = simulate;
    }

    /// Make deleting this particular blob fail.
    pub fn fail_delete_of(&self, key: &ContentKey) {
        self.failing_deletes.borrow_mut().insert(key.clone());
    }

    /// Let only `files` more item copies succeed; later ones fail.
    pub fn fail_copies_after(&self, files: usize) {
        *self.copy_budget.borrow_mut() = Some(files);
    }

    /// Number of stored files under a directory (recursively).
    pub fn file_count_under(&self, dir: &Path) -> usize {
        self.files
            .borrow()
            .keys()
            .filter(|p| p.starts_with(dir))
            .count()
    }

    /// Raw access for tests that need to tamper with stored data.
    pub fn put_file(&self, path: impl Into<PathBuf>, content: &str) {
        let path = path.into();
        if let Some(parent) = path.parent() {
            self.mkdir_all(parent);
        }
        self.files.borrow_mut().insert(path, content.to_string());
    }

    fn check_writable(&self) -> Result<()> {
        if *self.simulate_write_error.borrow() {
            return Err(WordsError::Storage("Simulated write error".to_string()));
        }
        Ok(())
    }

    fn mkdir_all(&self, dir: &Path) {
        let mut dirs = self.dirs.borrow_mut();
        for ancestor in dir.ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            dirs.insert(ancestor.to_path_buf());
        }
    }

    fn is_dir(&self, dir: &Path) -> bool {
        self.dirs.borrow().contains(dir)
    }

    fn child_dir_names(&self, dir: &Path) -> Vec<String> {
        self.dirs
            .borrow()
            .iter()
            .filter(|d| d.parent() == Some(dir))
            .filter_map(|d| d.file_name().and_then(|n| n.to_str()).map(String::from))
            .collect()
    }

    fn take_copy_budget(&self) -> Result<()> {
        let mut budget = self.copy_budget.borrow_mut();
        match budget.as_mut() {
            Some(0) => Err(WordsError::Storage("Simulated copy failure".to_string())),
            Some(left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn write_file(&self, path: PathBuf, raw: &str) -> Result<()> {
        self.check_writable()?;
        let parent_exists = path.parent().is_some_and(|p| self.is_dir(p));
        if !parent_exists {
            return Err(WordsError::NotFound(format!("{:?}", path.parent())));
        }
        self.files.borrow_mut().insert(path, raw.to_string());
        Ok(())
    }
}

impl StorageBackend for MemBackend {
    fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    fn list_projects(&self) -> Result<Vec<ProjectName>> {
        Ok(self
            .child_dir_names(&self.layout.projects_dir())
            .into_iter()
            .filter(|name| !name.starts_with('.'))
            .filter_map(|name| ProjectName::new(name).ok())
            .collect())
    }

    fn read_metadata(&self, project: &ProjectName) -> Result<Option<String>> {
        let path = self.layout.metadata_file(project);
        Ok(self.files.borrow().get(&path).cloned())
    }

    fn write_metadata(&self, project: &ProjectName, raw: &str) -> Result<()> {
        self.write_file(self.layout.metadata_file(project), raw)
    }

    fn read_content(&self, project: &ProjectName, key: &ContentKey) -> Result<Option<String>> {
        let path = self.layout.content_file(project, key)?;
        Ok(self.files.borrow().get(&path).cloned())
    }

    fn write_content(&self, project: &ProjectName, key: &ContentKey, raw: &str) -> Result<()> {
        self.write_file(self.layout.content_file(project, key)?, raw)
    }

    fn delete_content(&self, project: &ProjectName, key: &ContentKey) -> Result<()> {
        if self.failing_deletes.borrow().contains(key) {
            return Err(WordsError::Storage(format!(
                "Simulated delete failure for {}",
                key
            )));
        }
        let path = self.layout.content_file(project, key)?;
        self.files.borrow_mut().remove(&path);
        Ok(())
    }

    fn area_exists(&self, area: Area<'_>) -> Result<bool> {
        Ok(self.is_dir(&self.layout.area_dir(area)?))
    }

    fn create_area(&self, area: Area<'_>) -> Result<()> {
        self.check_writable()?;
        self.mkdir_all(&self.layout.area_dir(area)?);
        Ok(())
    }

    fn copy_tree(&self, from: Area<'_>, to: Area<'_>) -> Result<()> {
        let src = self.layout.area_dir(from)?;
        let dst = self.layout.area_dir(to)?;
        if !self.is_dir(&src) {
            return Err(WordsError::NotFound(format!("{:?}", src)));
        }
        self.check_writable()?;
        self.mkdir_all(&dst);

        let sub_dirs: Vec<PathBuf> = self
            .dirs
            .borrow()
            .iter()
            .filter(|d| d.starts_with(&src) && **d != src)
            .cloned()
            .collect();
        for dir in sub_dirs {
            if let Ok(rel) = dir.strip_prefix(&src) {
                self.mkdir_all(&dst.join(rel));
            }
        }

        let items: Vec<(PathBuf, String)> = self
            .files
            .borrow()
            .iter()
            .filter(|(p, _)| p.starts_with(&src))
            .map(|(p, c)| (p.clone(), c.clone()))
            .collect();
        for (path, content) in items {
            self.take_copy_budget()?;
            if let Ok(rel) = path.strip_prefix(&src) {
                self.files.borrow_mut().insert(dst.join(rel), content);
            }
        }
        Ok(())
    }

    fn remove_tree(&self, area: Area<'_>) -> Result<()> {
        self.check_writable()?;
        let dir = self.layout.area_dir(area)?;
        self.dirs.borrow_mut().retain(|d| !d.starts_with(&dir));
        self.files.borrow_mut().retain(|p, _| !p.starts_with(&dir));
        Ok(())
    }

    fn rename_tree(&self, from: Area<'_>, to: Area<'_>) -> Result<()> {
        self.check_writable()?;
        let src = self.layout.area_dir(from)?;
        let dst = self.layout.area_dir(to)?;
        if self.is_dir(&dst) {
            return Err(WordsError::Storage(format!("{:?} already exists", dst)));
        }
        if !self.is_dir(&src) {
            return Err(WordsError::NotFound(format!("{:?}", src)));
        }

        let moved_dirs: Vec<PathBuf> = self
            .dirs
            .borrow()
            .iter()
            .filter(|d| d.starts_with(&src))
            .cloned()
            .collect();
        let moved_files: Vec<(PathBuf, String)> = self
            .files
            .borrow()
            .iter()
            .filter(|(p, _)| p.starts_with(&src))
            .map(|(p, c)| (p.clone(), c.clone()))
            .collect();

        self.remove_tree(from)?;
        self.mkdir_all(&dst);
        for dir in moved_dirs {
            if let Ok(rel) = dir.strip_prefix(&src) {
                self.mkdir_all(&dst.join(rel));
            }
        }
        let mut files = self.files.borrow_mut();
        for (path, content) in moved_files {
            if let Ok(rel) = path.strip_prefix(&src) {
                files.insert(dst.join(rel), content);
            }
        }
        Ok(())
    }

    fn ensure_backup_root(&self) -> Result<()> {
        self.check_writable()?;
        let root = self.layout.backup_root().to_path_buf();
        self.mkdir_all(&root);
        Ok(())
    }

    fn list_backup_dirs(&self) -> Result<Vec<String>> {
        Ok(self.child_dir_names(self.layout.backup_root()))
    }

    fn read_settings(&self) -> Result<Option<String>> {
        Ok(self
            .files
            .borrow()
            .get(&self.layout.settings_file())
            .cloned())
    }

    fn write_settings(&self, raw: &str) -> Result<()> {
        self.check_writable()?;
        let path = self.layout.settings_file();
        if let Some(parent) = path.parent() {
            self.mkdir_all(parent);
        }
        self.files.borrow_mut().insert(path, raw.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_tree_mirrors_nested_items() {
        let backend = MemBackend::new();
        let project = ProjectName::new("Book").unwrap();
        backend.create_area(Area::Project(&project)).unwrap();
        backend
            .write_metadata(&project, "{\"projectName\":\"Book\"}")
            .unwrap();
        backend.put_file("/mem/app/Projects/Book/assets/cover.txt", "cover");

        backend
            .copy_tree(Area::Project(&project), Area::Backup("Book_20240101T000000"))
            .unwrap();

        assert_eq!(
            backend.file_count_under(Path::new("/mem/backups/Book_20240101T000000")),
            2
        );
        assert_eq!(backend.list_backup_dirs().unwrap(), vec!["Book_20240101T000000"]);
    }

    #[test]
    fn writes_into_missing_project_fail() {
        let backend = MemBackend::new();
        let project = ProjectName::new("Ghost").unwrap();
        assert!(matches!(
            backend.write_metadata(&project, "{}"),
            Err(WordsError::NotFound(_))
        ));
    }

    #[test]
    fn staging_dirs_are_not_projects() {
        let backend = MemBackend::new();
        let project = ProjectName::new("Book").unwrap();
        backend.create_area(Area::Staging(&project)).unwrap();
        assert!(backend.list_projects().unwrap().is_empty());
    }
}
