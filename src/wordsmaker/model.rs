//! # Data Model
//!
//! A project is persisted as a single [`Snapshot`] (summary fields plus the
//! flat, ordered `treeData` list) and one content blob per document.
//!
//! The JSON shape is fixed by existing project folders on disk:
//!
//! ```text
//! { projectName, projectType, createDate, lastModified, lastBackedUp, wordCount,
//!   treeData: [ { id, text, parent, droppable,
//!                 data: { fileType, fileName, fileId, createDate, lastModified, wordCount } } ] }
//! ```
//!
//! Node ids are small integers local to one project; `0` is the root
//! sentinel used as the parent of top-level nodes. Documents are addressed in
//! the content store by their [`ContentKey`], which never changes after
//! creation.

use crate::error::{Result, WordsError};
use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type NodeId = u64;

/// Parent id of top-level nodes. Never assigned to a node.
pub const ROOT_ID: NodeId = 0;

/// A decoded, validated project name. The only form of a project name that
/// reaches a storage path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectName(String);

impl ProjectName {
    /// Accepts a name exactly as typed (no percent-decoding).
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(WordsError::InvalidInput(
                "Project name cannot be empty".to_string(),
            ));
        }
        if name.starts_with('.') {
            return Err(WordsError::InvalidInput(format!(
                "Project name cannot start with '.': {}",
                name
            )));
        }
        if name.chars().any(|c| c == '/' || c == '\\' || c == '\0') {
            return Err(WordsError::InvalidInput(format!(
                "Project name cannot contain path separators: {}",
                name
            )));
        }
        Ok(Self(name))
    }

    /// Decodes a name that may arrive percent-encoded (`My%20Novel`).
    /// Decoding happens once; the result is never decoded again.
    pub fn decode(raw: &str) -> Result<Self> {
        let decoded = percent_decode_str(raw).decode_utf8().map_err(|_| {
            WordsError::InvalidInput(format!("Project name is not valid UTF-8: {}", raw))
        })?;
        Self::new(decoded.into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    Novel,
    Collection,
    Serial,
    Novella,
    #[default]
    #[serde(rename = "")]
    Unset,
}

impl ProjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectType::Novel => "novel",
            ProjectType::Collection => "collection",
            ProjectType::Serial => "serial",
            ProjectType::Novella => "novella",
            ProjectType::Unset => "",
        }
    }
}

impl FromStr for ProjectType {
    type Err = WordsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "novel" => Ok(ProjectType::Novel),
            "collection" => Ok(ProjectType::Collection),
            "serial" => Ok(ProjectType::Serial),
            "novella" => Ok(ProjectType::Novella),
            "" | "none" => Ok(ProjectType::Unset),
            other => Err(WordsError::InvalidInput(format!(
                "Unknown project type: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Folder,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::File => f.write_str("file"),
            NodeKind::Folder => f.write_str("folder"),
        }
    }
}

/// Opaque address of a document body in the content store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentKey(String);

impl ContentKey {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Keys come back from snapshots on disk; only plain file-name-safe keys
    /// may be turned into a blob path.
    pub fn is_path_safe(&self) -> bool {
        !self.0.is_empty()
            && !self.0.starts_with('.')
            && !self.0.chars().any(|c| c == '/' || c == '\\' || c == '\0')
    }
}

impl From<&str> for ContentKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    pub file_type: NodeKind,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<ContentKey>,
    pub create_date: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<u64>,
}

/// One entry of the project tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "text")]
    pub name: String,
    #[serde(rename = "parent")]
    pub parent_id: NodeId,
    pub droppable: bool,
    pub data: NodeData,
}

impl Node {
    pub fn file(id: NodeId, parent_id: NodeId, name: &str, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.to_string(),
            parent_id,
            droppable: false,
            data: NodeData {
                file_type: NodeKind::File,
                file_name: name.to_string(),
                file_id: Some(ContentKey::generate()),
                create_date: now,
                last_modified: now,
                word_count: Some(0),
            },
        }
    }

    pub fn folder(id: NodeId, parent_id: NodeId, name: &str, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.to_string(),
            parent_id,
            droppable: true,
            data: NodeData {
                file_type: NodeKind::Folder,
                file_name: name.to_string(),
                file_id: None,
                create_date: now,
                last_modified: now,
                word_count: None,
            },
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.data.file_type
    }

    pub fn is_file(&self) -> bool {
        self.kind() == NodeKind::File
    }

    pub fn is_folder(&self) -> bool {
        self.kind() == NodeKind::Folder
    }

    /// Folders accept drops; files never do, whatever the stored flag says.
    pub fn accepts_children(&self) -> bool {
        self.is_folder() && self.droppable
    }

    pub fn content_key(&self) -> Option<&ContentKey> {
        if self.is_file() {
            self.data.file_id.as_ref()
        } else {
            None
        }
    }

    /// Stored word count of a document. Folders contribute nothing directly.
    pub fn word_count(&self) -> u64 {
        if self.is_file() {
            self.data.word_count.unwrap_or(0)
        } else {
            0
        }
    }

    pub(crate) fn set_name(&mut self, name: &str, now: DateTime<Utc>) {
        self.name = name.to_string();
        self.data.file_name = name.to_string();
        self.data.last_modified = now;
    }
}

/// The durable structural state of one project.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub project_name: String,
    pub project_type: ProjectType,
    pub create_date: DateTime<Utc>,
    pub last_modified: Option<DateTime<Utc>>,
    pub last_backed_up: Option<DateTime<Utc>>,
    pub word_count: u64,
    pub tree_data: Vec<Node>,
    /// Fields this version does not know about, carried through unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSnapshot {
    project_name: Option<String>,
    #[serde(default)]
    project_type: ProjectType,
    create_date: Option<DateTime<Utc>>,
    #[serde(default)]
    last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    last_backed_up: Option<DateTime<Utc>>,
    // Derived from treeData on load; the stored aggregate is ignored.
    #[serde(default, rename = "wordCount")]
    _word_count: Option<Value>,
    tree_data: Option<Vec<Node>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Snapshot {
    pub fn empty(name: &ProjectName, project_type: ProjectType, now: DateTime<Utc>) -> Self {
        Self {
            project_name: name.as_str().to_string(),
            project_type,
            create_date: now,
            last_modified: None,
            last_backed_up: None,
            word_count: 0,
            tree_data: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Parses `metadata.json`. Anything that is not a usable snapshot is
    /// reported as [`WordsError::Corrupt`].
    pub fn from_json(raw: &str) -> Result<Self> {
        let parsed: RawSnapshot = serde_json::from_str(raw)
            .map_err(|e| WordsError::Corrupt(format!("metadata is not valid: {}", e)))?;

        let project_name = parsed
            .project_name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| WordsError::Corrupt("missing projectName".to_string()))?;
        let tree_data = parsed
            .tree_data
            .ok_or_else(|| WordsError::Corrupt("missing treeData".to_string()))?;
        let create_date = parsed
            .create_date
            .ok_or_else(|| WordsError::Corrupt("missing createDate".to_string()))?;
        let word_count = tree_data.iter().map(Node::word_count).sum();

        Ok(Self {
            project_name,
            project_type: parsed.project_type,
            create_date,
            last_modified: parsed.last_modified,
            last_backed_up: parsed.last_backed_up,
            word_count,
            tree_data,
            extra: parsed.extra,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(WordsError::Serialization)
    }

    pub fn summary(&self) -> ProjectSummary {
        ProjectSummary {
            project_name: self.project_name.clone(),
            project_type: self.project_type,
            create_date: self.create_date,
            last_modified: self.last_modified,
            last_backed_up: self.last_backed_up,
            word_count: self.word_count,
        }
    }
}

/// A partial snapshot, shallow-merged over the stored one.
/// `None` leaves a field alone; nullable fields use a nested `Option`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotPatch {
    pub project_type: Option<ProjectType>,
    pub last_modified: Option<Option<DateTime<Utc>>>,
    pub last_backed_up: Option<Option<DateTime<Utc>>>,
    pub tree_data: Option<Vec<Node>>,
}

impl SnapshotPatch {
    /// The in-memory tree after a mutation.
    pub fn tree_state(nodes: Vec<Node>, now: DateTime<Utc>) -> Self {
        Self {
            last_modified: Some(Some(now)),
            tree_data: Some(nodes),
            ..Default::default()
        }
    }

    pub fn backed_up_at(at: DateTime<Utc>) -> Self {
        Self {
            last_backed_up: Some(Some(at)),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(self, snapshot: &mut Snapshot) {
        if let Some(project_type) = self.project_type {
            snapshot.project_type = project_type;
        }
        if let Some(last_modified) = self.last_modified {
            snapshot.last_modified = last_modified;
        }
        if let Some(last_backed_up) = self.last_backed_up {
            snapshot.last_backed_up = last_backed_up;
        }
        if let Some(tree_data) = self.tree_data {
            snapshot.word_count = tree_data.iter().map(Node::word_count).sum();
            snapshot.tree_data = tree_data;
        }
    }
}

/// Everything about a project except its tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub project_name: String,
    pub project_type: ProjectType,
    pub create_date: DateTime<Utc>,
    pub last_modified: Option<DateTime<Utc>>,
    pub last_backed_up: Option<DateTime<Utc>>,
    pub word_count: u64,
}
