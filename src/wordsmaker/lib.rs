//! # WordsMaker Architecture
//!
//! WordsMaker is the persistence core of a long-form writing app: a tree of
//! folders and documents per project, stored as one metadata snapshot plus
//! one content blob per document, with coalesced writes and a rotating set
//! of whole-project backups. It is a library first; the bundled `wordsmaker`
//! binary is one client of it.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI (main.rs, args.rs)                                     │
//! │  - Parses arguments, formats output, handles terminal I/O   │
//! │  - The ONLY place that knows about stdout/stderr/exit codes │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API (api.rs)                                               │
//! │  - Workspace: projects, settings, backups                   │
//! │  - ProjectSession: one open project                         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Core                                                       │
//! │  - engine.rs / tree.rs: structural mutations and invariants │
//! │  - coordinator.rs: debounced snapshot writes                │
//! │  - backup.rs: rotation and staged restore                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage (store/)                                           │
//! │  - StorageBackend trait: FsBackend, MemBackend              │
//! │  - ContentStore, MetadataStore                              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Write Path
//!
//! A mutation is validated and applied to the in-memory tree, then the
//! resulting node list is handed to the coordinator. The coordinator writes
//! it through the metadata store once edits have paused for the quiet period
//! (300 ms by default). Document bodies skip the coordinator and go straight
//! to the content store.
//!
//! ## No Hidden State
//!
//! There are no globals. The backend and the [`clock::Clock`] are passed in
//! when a [`api::Workspace`] is built, which is what lets the tests run the
//! whole stack in memory on a manual clock.
//!
//! ## Module Overview
//!
//! - [`api`]: The facade, entry point for all operations
//! - [`engine`]: Tree mutations kept in step with content blobs
//! - [`tree`]: Flat ordered node list with structural validation
//! - [`coordinator`]: Debounced persistence of tree snapshots
//! - [`backup`]: Backup rotation and restore
//! - [`export`]: tar.gz export of a project
//! - [`store`]: Storage abstraction and implementations
//! - [`model`]: Core data types (`Node`, `Snapshot`, `ProjectName`)
//! - [`config`]: User settings and storage roots
//! - [`clock`]: Time sources
//! - [`error`]: Error types

pub mod api;
pub mod backup;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod export;
pub mod model;
pub mod store;
pub mod tree;
