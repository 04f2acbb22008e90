use super::backend::StorageBackend;
use crate::error::{Result, WordsError};
use crate::model::{ContentKey, ProjectName};
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use tracing::debug;

/// On-disk shape of a document body: `{ "content": "..." }`.
#[derive(Debug, Serialize, Deserialize)]
struct ContentBlob {
    #[serde(default)]
    content: String,
}

/// Document bodies of one project, addressed by [`ContentKey`].
pub struct ContentStore<B: StorageBackend> {
    backend: Rc<B>,
    project: ProjectName,
}

impl<B: StorageBackend> ContentStore<B> {
    pub fn new(backend: Rc<B>, project: ProjectName) -> Self {
        Self { backend, project }
    }

    pub fn project(&self) -> &ProjectName {
        &self.project
    }

    /// A blob without a `content` field reads as an empty document.
    pub fn load(&self, key: &ContentKey) -> Result<String> {
        let raw = self
            .backend
            .read_content(&self.project, key)?
            .ok_or_else(|| {
                WordsError::NotFound(format!("content {} in project {}", key, self.project))
            })?;
        let blob: ContentBlob = serde_json::from_str(&raw).map_err(|e| {
            WordsError::Corrupt(format!("content {} is not valid: {}", key, e))
        })?;
        Ok(blob.content)
    }

    pub fn save(&self, key: &ContentKey, body: &str) -> Result<()> {
        let raw = serde_json::to_string(&ContentBlob {
            content: body.to_string(),
        })?;
        self.backend
            .write_content(&self.project, key, &raw)
            .map_err(into_storage)?;
        debug!(project = %self.project, key = %key, bytes = body.len(), "content saved");
        Ok(())
    }

    pub fn delete(&self, key: &ContentKey) -> Result<()> {
        self.backend
            .delete_content(&self.project, key)
            .map_err(into_storage)
    }
}

/// A failed blob write inside an existing project is a storage failure,
/// whatever the backend called it.
fn into_storage(err: WordsError) -> WordsError {
    match err {
        WordsError::NotFound(what) => {
            WordsError::Storage(format!("cannot write into missing {}", what))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::backend::Area;
    use crate::store::mem_backend::MemBackend;

    fn store() -> (Rc<MemBackend>, ContentStore<MemBackend>) {
        let backend = Rc::new(MemBackend::new());
        let project = ProjectName::new("Book").unwrap();
        backend.create_area(Area::Project(&project)).unwrap();
        (backend.clone(), ContentStore::new(backend, project))
    }

    #[test]
    fn save_then_load() {
        let (_backend, store) = store();
        let key = ContentKey::generate();
        store.save(&key, "It was a dark and stormy night.").unwrap();
        assert_eq!(store.load(&key).unwrap(), "It was a dark and stormy night.");
    }

    #[test]
    fn missing_blob_is_not_found() {
        let (_backend, store) = store();
        let err = store.load(&ContentKey::from("nope")).unwrap_err();
        assert!(matches!(err, WordsError::NotFound(_)));
    }

    #[test]
    fn missing_content_field_reads_as_empty() {
        let (backend, store) = store();
        backend.put_file("/mem/app/Projects/Book/k1.json", "{}");
        assert_eq!(store.load(&ContentKey::from("k1")).unwrap(), "");
    }

    #[test]
    fn write_failure_is_a_storage_error() {
        let (backend, store) = store();
        backend.set_simulate_write_error(true);
        let err = store.save(&ContentKey::generate(), "x").unwrap_err();
        assert!(matches!(err, WordsError::Storage(_)));
    }

    #[test]
    fn deleting_twice_is_fine() {
        let (_backend, store) = store();
        let key = ContentKey::generate();
        store.save(&key, "draft").unwrap();
        store.delete(&key).unwrap();
        store.delete(&key).unwrap();
        assert!(store.load(&key).is_err());
    }
}
