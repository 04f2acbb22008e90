//! # Storage Layer
//!
//! Storage is split in two levels:
//!
//! - [`backend::StorageBackend`]: raw I/O on strings and whole directory
//!   trees. Knows nothing about JSON shapes.
//! - [`content::ContentStore`] and [`metadata::MetadataStore`]: encode and
//!   decode document bodies and project snapshots on top of a backend.
//!
//! ## Implementations
//!
//! - [`fs_backend::FsBackend`]: Production file-based storage
//!   - Every file write goes to a temp file first and is renamed into place
//!   - Projects and backups live under two independent roots
//!
//! - [`mem_backend::MemBackend`]: In-memory storage for testing
//!   - Same directory layout, held in maps
//!   - Write, delete and copy failures can be injected
//!
//! ## Storage Format
//!
//! ```text
//! <app root>/
//! ├── Projects/
//! │   └── <project name>/
//! │       ├── metadata.json       # Snapshot: summary fields + treeData
//! │       └── <content key>.json  # { "content": "..." } per document
//! └── User/
//!     └── settings.json
//!
//! <backup root>/
//! └── <project name>_<YYYYMMDDThhmmss>/   # mirror of Projects/<project name>/
//! ```
//!
//! Metadata and content are stored separately so listing projects and
//! walking the tree never reads a document body.

pub mod backend;
pub mod content;
pub mod fs_backend;
pub mod mem_backend;
pub mod metadata;

pub use backend::{Area, StorageBackend, StorageLayout};
pub use content::ContentStore;
pub use fs_backend::FsBackend;
pub use mem_backend::MemBackend;
pub use metadata::MetadataStore;
