//! In-memory namespace tree
//!
//! Pure data-structure logic: no I/O and no locking. Callers that share a
//! tree across threads must serialize access themselves (see
//! [`crate::store::FileSystemStore`]).

use crate::error::StorageError;
use crate::tree::node::{DirectoryEntry, Entry, FileEntry};
use crate::tree::path::{self, ROOT};
use crate::types::FileId;

/// Hierarchical mapping from virtual paths to file and directory entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceTree {
    root: Entry,
}

impl Default for NamespaceTree {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceTree {
    /// Create an empty tree rooted at `/`.
    pub fn new() -> Self {
        Self::from_root(DirectoryEntry::new(ROOT))
    }

    pub fn from_root(root: DirectoryEntry) -> Self {
        Self {
            root: Entry::Directory(root),
        }
    }

    pub fn root(&self) -> Result<&DirectoryEntry, StorageError> {
        match &self.root {
            Entry::Directory(dir) => Ok(dir),
            Entry::File(_) => Err(StorageError::NotADirectory(ROOT.to_string())),
        }
    }

    /// Resolve a path to its entry.
    ///
    /// Fails `NotFound` if any intermediate segment is missing or is not a
    /// directory, or if the final segment does not exist.
    pub fn resolve(&self, path: &str) -> Result<&Entry, StorageError> {
        let segments = path::split_path(path)?;
        let mut current = &self.root;
        for segment in &segments {
            current = match current {
                Entry::Directory(dir) => dir
                    .children
                    .get(segment)
                    .ok_or_else(|| StorageError::NotFound(path.to_string()))?,
                Entry::File(_) => return Err(StorageError::NotFound(path.to_string())),
            };
        }
        Ok(current)
    }

    /// Resolve a path that must name a file.
    pub fn resolve_file(&self, path: &str) -> Result<&FileEntry, StorageError> {
        self.resolve(path)?
            .as_file()
            .ok_or_else(|| StorageError::NotFound(format!("{} is not a file", path)))
    }

    /// Create a directory named `name` under `parent`.
    pub fn create_directory(
        &mut self,
        parent: &str,
        name: &str,
    ) -> Result<DirectoryEntry, StorageError> {
        let name = path::validate_name(name)?;
        let parent_path = path::normalize_path(parent)?;
        let dir = self.directory_mut(&parent_path)?;
        if dir.children.contains_key(&name) {
            return Err(StorageError::AlreadyExists(path::join(&parent_path, &name)));
        }
        let created = DirectoryEntry::new(&name);
        dir.children.insert(name, Entry::Directory(created.clone()));
        Ok(created)
    }

    /// Create every missing directory along `path` (including `path` itself).
    ///
    /// Returns the number of directories created.
    pub fn ensure_directories(&mut self, path: &str) -> Result<usize, StorageError> {
        let segments = path::split_path(path)?;
        let mut created = 0;
        let mut current = self.root_mut()?;
        let mut walked = ROOT.to_string();
        for segment in segments {
            walked = path::join(&walked, &segment);
            let child = current
                .children
                .entry(segment.clone())
                .or_insert_with(|| {
                    created += 1;
                    Entry::Directory(DirectoryEntry::new(&segment))
                });
            current = match child {
                Entry::Directory(dir) => dir,
                Entry::File(_) => return Err(StorageError::NotADirectory(walked)),
            };
        }
        Ok(created)
    }

    /// Create an empty file named `name` under `parent`.
    pub fn create_file(&mut self, parent: &str, name: &str) -> Result<FileEntry, StorageError> {
        let name = path::validate_name(name)?;
        let parent_path = path::normalize_path(parent)?;
        let virtual_path = path::join(&parent_path, &name);
        let dir = self.directory_mut(&parent_path)?;
        if dir.children.contains_key(&name) {
            return Err(StorageError::AlreadyExists(virtual_path));
        }
        let created = FileEntry::new(&name, &virtual_path);
        dir.children.insert(name, Entry::File(created.clone()));
        Ok(created)
    }

    /// Replace the file entry `name` under `parent`, stamping `modified_at`.
    pub fn mutate_file(
        &mut self,
        parent: &str,
        name: &str,
        new_entry: FileEntry,
    ) -> Result<FileEntry, StorageError> {
        let dir = self.directory_mut(parent)?;
        match dir.children.get_mut(name) {
            Some(Entry::File(file)) => {
                let mut new_entry = new_entry;
                new_entry.touch();
                *file = new_entry.clone();
                Ok(new_entry)
            }
            _ => Err(StorageError::NotFound(path::join(parent, name))),
        }
    }

    /// Remove and return the file entry `name` under `parent`.
    pub fn delete_file(&mut self, parent: &str, name: &str) -> Result<FileEntry, StorageError> {
        let dir = self.directory_mut(parent)?;
        match dir.children.get(name) {
            Some(Entry::File(_)) => {}
            _ => return Err(StorageError::NotFound(path::join(parent, name))),
        }
        match dir.children.remove(name) {
            Some(Entry::File(file)) => Ok(file),
            _ => Err(StorageError::NotFound(path::join(parent, name))),
        }
    }

    /// Remove the directory `name` under `parent`.
    ///
    /// A non-empty directory is only removed when `recursive` is set; the ids
    /// of every file in the removed subtree are returned so the caller can
    /// delete their blobs.
    pub fn delete_directory(
        &mut self,
        parent: &str,
        name: &str,
        recursive: bool,
    ) -> Result<Vec<FileId>, StorageError> {
        let full_path = path::join(parent, name);
        let dir = self.directory_mut(parent)?;
        let target = match dir.children.get(name) {
            Some(Entry::Directory(target)) => target,
            _ => return Err(StorageError::NotFound(full_path)),
        };

        let mut ids = Vec::new();
        if !target.is_empty() {
            if !recursive {
                return Err(StorageError::NotEmpty(full_path));
            }
            collect_file_ids(target, &mut ids);
        }
        dir.children.remove(name);
        Ok(ids)
    }

    /// Rename file `old_name` under `parent` to `new_name`.
    ///
    /// The file's id changes with its name; the previous id is returned
    /// alongside the updated entry.
    pub fn rename_file(
        &mut self,
        parent: &str,
        old_name: &str,
        new_name: &str,
    ) -> Result<(FileId, FileEntry), StorageError> {
        let new_name = path::validate_name(new_name)?;
        let parent_path = path::normalize_path(parent)?;
        let dir = self.directory_mut(&parent_path)?;
        if !matches!(dir.children.get(old_name), Some(Entry::File(_))) {
            return Err(StorageError::NotFound(path::join(&parent_path, old_name)));
        }
        if dir.children.contains_key(&new_name) {
            return Err(StorageError::AlreadyExists(path::join(&parent_path, &new_name)));
        }

        let Some(Entry::File(mut file)) = dir.children.remove(old_name) else {
            return Err(StorageError::NotFound(path::join(&parent_path, old_name)));
        };
        let old_id = file.relocate(&parent_path, &new_name);
        file.touch();
        dir.children.insert(new_name, Entry::File(file.clone()));
        Ok((old_id, file))
    }

    /// Rename directory `old_name` under `parent` to `new_name`.
    ///
    /// Every descendant file's path and id is rewritten; the returned
    /// `(old_id, new_id)` pairs drive blob migration.
    pub fn rename_directory(
        &mut self,
        parent: &str,
        old_name: &str,
        new_name: &str,
    ) -> Result<Vec<(FileId, FileId)>, StorageError> {
        let new_name = path::validate_name(new_name)?;
        let parent_path = path::normalize_path(parent)?;
        let dir = self.directory_mut(&parent_path)?;
        if !matches!(dir.children.get(old_name), Some(Entry::Directory(_))) {
            return Err(StorageError::NotFound(path::join(&parent_path, old_name)));
        }
        if dir.children.contains_key(&new_name) {
            return Err(StorageError::AlreadyExists(path::join(&parent_path, &new_name)));
        }

        let Some(Entry::Directory(mut moved)) = dir.children.remove(old_name) else {
            return Err(StorageError::NotFound(path::join(&parent_path, old_name)));
        };
        moved.name = new_name.clone();
        let mut migrations = Vec::new();
        rewrite_paths(&mut moved, &path::join(&parent_path, &new_name), &mut migrations);
        dir.children.insert(new_name, Entry::Directory(moved));
        Ok(migrations)
    }

    /// Names of the direct children of the directory at `path`.
    pub fn list(&self, path: &str) -> Result<Vec<String>, StorageError> {
        match self.resolve(path)? {
            Entry::Directory(dir) => Ok(dir.children.keys().cloned().collect()),
            Entry::File(_) => Err(StorageError::NotADirectory(path.to_string())),
        }
    }

    /// Total number of files in the tree.
    pub fn file_count(&self) -> usize {
        self.root()
            .map(|root| {
                let mut ids = Vec::new();
                collect_file_ids(root, &mut ids);
                ids.len()
            })
            .unwrap_or(0)
    }

    fn root_mut(&mut self) -> Result<&mut DirectoryEntry, StorageError> {
        match &mut self.root {
            Entry::Directory(dir) => Ok(dir),
            Entry::File(_) => Err(StorageError::NotADirectory(ROOT.to_string())),
        }
    }

    fn directory_mut(&mut self, path: &str) -> Result<&mut DirectoryEntry, StorageError> {
        let segments = path::split_path(path)?;
        let mut current = self.root_mut()?;
        let mut walked = ROOT.to_string();
        for segment in segments {
            walked = path::join(&walked, &segment);
            current = match current.children.get_mut(&segment) {
                Some(Entry::Directory(dir)) => dir,
                Some(Entry::File(_)) => return Err(StorageError::NotADirectory(walked)),
                None => return Err(StorageError::NotFound(walked)),
            };
        }
        Ok(current)
    }
}

/// Post-order collection of every file id below `dir`.
fn collect_file_ids(dir: &DirectoryEntry, ids: &mut Vec<FileId>) {
    for child in dir.children.values() {
        match child {
            Entry::Directory(sub) => collect_file_ids(sub, ids),
            Entry::File(file) => ids.push(file.id.clone()),
        }
    }
}

fn rewrite_paths(dir: &mut DirectoryEntry, dir_path: &str, migrations: &mut Vec<(FileId, FileId)>) {
    for (name, child) in dir.children.iter_mut() {
        match child {
            Entry::File(file) => {
                let old_id = file.relocate(dir_path, name);
                migrations.push((old_id, file.id.clone()));
            }
            Entry::Directory(sub) => {
                let sub_path = path::join(dir_path, name);
                rewrite_paths(sub, &sub_path, migrations);
            }
        }
    }
}
