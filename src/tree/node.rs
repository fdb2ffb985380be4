//! Namespace entry types

use crate::tree::hasher::compute_file_id;
use crate::tree::path;
use crate::types::FileId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// File entry: identity and metadata of one file. Content lives in the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    #[serde(rename = "path")]
    pub virtual_path: String,
    pub id: FileId,
    #[serde(rename = "size")]
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl FileEntry {
    /// Create an empty file entry at `virtual_path`.
    pub fn new(name: &str, virtual_path: &str) -> Self {
        let now = Utc::now();
        Self {
            name: name.to_string(),
            virtual_path: virtual_path.to_string(),
            id: compute_file_id(name, virtual_path),
            size_bytes: 0,
            created_at: now,
            modified_at: now,
        }
    }

    /// Move the entry under `parent` with `name`, regenerating its id.
    ///
    /// Returns the id the entry had before the move.
    pub fn relocate(&mut self, parent: &str, name: &str) -> FileId {
        self.name = name.to_string();
        self.virtual_path = path::join(parent, name);
        let new_id = compute_file_id(&self.name, &self.virtual_path);
        std::mem::replace(&mut self.id, new_id)
    }

    pub fn touch(&mut self) {
        self.modified_at = Utc::now();
    }

    /// Whether `id` is the one derived from this entry's name and path.
    pub fn has_consistent_id(&self) -> bool {
        self.id == compute_file_id(&self.name, &self.virtual_path)
    }
}

/// Directory entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    #[serde(default)]
    pub children: BTreeMap<String, Entry>,
}

impl DirectoryEntry {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            children: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// Namespace entry: a file or a directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Entry {
    File(FileEntry),
    Directory(DirectoryEntry),
}

impl Entry {
    pub fn name(&self) -> &str {
        match self {
            Entry::File(file) => &file.name,
            Entry::Directory(dir) => &dir.name,
        }
    }

    pub fn as_file(&self) -> Option<&FileEntry> {
        match self {
            Entry::File(file) => Some(file),
            Entry::Directory(_) => None,
        }
    }

    pub fn as_directory(&self) -> Option<&DirectoryEntry> {
        match self {
            Entry::Directory(dir) => Some(dir),
            Entry::File(_) => None,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Entry::Directory(_))
    }
}
