//! File system store
//!
//! Owns the namespace tree and the blob directory behind a single mutex.
//! Every operation holds the mutex for its whole duration, so a resolve
//! followed by a mutation is atomic and all operations are linearizable.

pub mod blob;
pub mod persistence;

pub use blob::BlobStore;
pub use persistence::{load_snapshot, save_snapshot, spawn_persister};

use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::tree::namespace::NamespaceTree;
use crate::tree::node::{Entry, FileEntry};
use crate::tree::path;
use crate::types::FileId;
use parking_lot::Mutex;
use std::path::Path;
use tracing::{debug, info, warn};

/// Namespace tree plus blob storage, serialized through one gate
pub struct FileSystemStore {
    tree: Mutex<NamespaceTree>,
    blobs: BlobStore,
}

impl FileSystemStore {
    /// Create a store with an empty namespace and blobs under `blob_dir`.
    pub fn new<P: AsRef<Path>>(blob_dir: P) -> Result<Self, StorageError> {
        Self::with_tree(NamespaceTree::new(), blob_dir)
    }

    pub fn with_tree<P: AsRef<Path>>(tree: NamespaceTree, blob_dir: P) -> Result<Self, StorageError> {
        Ok(Self {
            tree: Mutex::new(tree),
            blobs: BlobStore::new(blob_dir)?,
        })
    }

    /// Open the store described by `config`, loading its snapshot if one exists.
    pub fn open_at(config: &StorageConfig) -> Result<Self, StorageError> {
        let store = Self::new(&config.blob_dir)?;
        if config.snapshot_path.exists() {
            store.load(&config.snapshot_path)?;
            info!(
                snapshot = %config.snapshot_path.display(),
                files = store.file_count(),
                "Loaded namespace snapshot"
            );
        } else {
            info!(
                snapshot = %config.snapshot_path.display(),
                "No snapshot found, starting with an empty namespace"
            );
        }
        Ok(store)
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Return the file at `path`, creating it (and any missing parent
    /// directories) if it does not exist.
    pub fn open(&self, file_path: &str) -> Result<FileEntry, StorageError> {
        let (parent, name) = path::parent_and_name(file_path)?;
        let mut tree = self.tree.lock();

        match tree.resolve(file_path) {
            Ok(Entry::File(file)) => return Ok(file.clone()),
            Ok(Entry::Directory(_)) => {
                return Err(StorageError::InvalidPath(format!(
                    "Cannot open a directory: {}",
                    file_path
                )))
            }
            Err(StorageError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let created_dirs = tree.ensure_directories(&parent)?;
        let entry = tree.create_file(&parent, &name)?;
        if let Err(e) = self.blobs.write(&entry.id, &[]) {
            tree.delete_file(&parent, &name)?;
            return Err(e);
        }

        info!(
            path = %entry.virtual_path,
            id = %entry.id,
            created_dirs,
            "Created file on open"
        );
        Ok(entry)
    }

    /// Create a file under an existing parent with initial `content`.
    pub fn create_file(&self, file_path: &str, content: &[u8]) -> Result<FileEntry, StorageError> {
        let (parent, name) = path::parent_and_name(file_path)?;
        let mut tree = self.tree.lock();

        let mut entry = tree.create_file(&parent, &name)?;
        if let Err(e) = self.blobs.write(&entry.id, content) {
            tree.delete_file(&parent, &name)?;
            return Err(e);
        }
        entry.size_bytes = content.len() as u64;
        let entry = tree.mutate_file(&parent, &name, entry)?;

        info!(path = %entry.virtual_path, id = %entry.id, size = entry.size_bytes, "Created file");
        Ok(entry)
    }

    pub fn create_directory(&self, dir_path: &str) -> Result<(), StorageError> {
        let (parent, name) = path::parent_and_name(dir_path)?;
        self.tree.lock().create_directory(&parent, &name)?;
        info!(path = %path::join(&parent, &name), "Created directory");
        Ok(())
    }

    /// Replace the metadata of the file at `path`.
    ///
    /// The new entry must keep the stored name, path and id.
    pub fn mutate(&self, file_path: &str, new_entry: FileEntry) -> Result<FileEntry, StorageError> {
        let (parent, name) = path::parent_and_name(file_path)?;
        let mut tree = self.tree.lock();

        check_identity(file_path, tree.resolve_file(file_path)?, &new_entry)?;
        let entry = tree.mutate_file(&parent, &name, new_entry)?;
        debug!(path = %entry.virtual_path, size = entry.size_bytes, "Mutated file entry");
        Ok(entry)
    }

    /// Replace both metadata and content of the file at `path` as one step.
    pub fn commit(
        &self,
        file_path: &str,
        new_entry: FileEntry,
        bytes: &[u8],
    ) -> Result<(FileEntry, usize), StorageError> {
        let (parent, name) = path::parent_and_name(file_path)?;
        let mut tree = self.tree.lock();

        check_identity(file_path, tree.resolve_file(file_path)?, &new_entry)?;
        let written = self.blobs.write(&new_entry.id, bytes)?;
        let entry = tree.mutate_file(&parent, &name, new_entry)?;
        debug!(path = %entry.virtual_path, bytes = written, "Committed file");
        Ok((entry, written))
    }

    /// Write `bytes` as the content of the file at `path`.
    pub fn save_file(&self, file_path: &str, bytes: &[u8]) -> Result<usize, StorageError> {
        let tree = self.tree.lock();
        let id = tree.resolve_file(file_path)?.id.clone();
        let written = self.blobs.write(&id, bytes)?;
        debug!(path = file_path, id = %id, bytes = written, "Saved file content");
        Ok(written)
    }

    /// Read the content of the file at `path`.
    pub fn get_file(&self, file_path: &str) -> Result<Vec<u8>, StorageError> {
        let tree = self.tree.lock();
        let id = tree.resolve_file(file_path)?.id.clone();
        self.blobs.read(&id)
    }

    /// Read the entry and content of the file at `path` as one snapshot.
    pub fn read(&self, file_path: &str) -> Result<(FileEntry, Vec<u8>), StorageError> {
        let tree = self.tree.lock();
        let entry = tree.resolve_file(file_path)?.clone();
        let data = self.blobs.read(&entry.id)?;
        Ok((entry, data))
    }

    pub fn stat(&self, file_path: &str) -> Result<FileEntry, StorageError> {
        Ok(self.tree.lock().resolve_file(file_path)?.clone())
    }

    pub fn list(&self, dir_path: &str) -> Result<Vec<String>, StorageError> {
        self.tree.lock().list(dir_path)
    }

    pub fn file_count(&self) -> usize {
        self.tree.lock().file_count()
    }

    /// Remove the file at `path` and its blob.
    pub fn delete_file(&self, file_path: &str) -> Result<FileEntry, StorageError> {
        let (parent, name) = path::parent_and_name(file_path)?;
        let mut tree = self.tree.lock();

        let entry = tree.delete_file(&parent, &name)?;
        self.remove_blob(&entry.id);
        info!(path = %entry.virtual_path, id = %entry.id, "Deleted file");
        Ok(entry)
    }

    /// Remove the directory at `path` and the blobs of every file below it.
    ///
    /// Returns the ids of the removed files.
    pub fn delete_directory(
        &self,
        dir_path: &str,
        recursive: bool,
    ) -> Result<Vec<FileId>, StorageError> {
        let (parent, name) = path::parent_and_name(dir_path)?;
        let mut tree = self.tree.lock();

        let ids = tree.delete_directory(&parent, &name, recursive)?;
        for id in &ids {
            self.remove_blob(id);
        }
        info!(path = dir_path, files = ids.len(), "Deleted directory");
        Ok(ids)
    }

    /// Rename the file at `path` to `new_name`, migrating its blob.
    pub fn rename_file(&self, file_path: &str, new_name: &str) -> Result<FileEntry, StorageError> {
        let (parent, name) = path::parent_and_name(file_path)?;
        let mut tree = self.tree.lock();

        let (old_id, entry) = tree.rename_file(&parent, &name, new_name)?;
        self.migrate_blob(&old_id, &entry.id);
        info!(from = file_path, to = %entry.virtual_path, "Renamed file");
        Ok(entry)
    }

    /// Rename the directory at `path` to `new_name`, migrating every
    /// descendant blob.
    pub fn rename_directory(
        &self,
        dir_path: &str,
        new_name: &str,
    ) -> Result<Vec<(FileId, FileId)>, StorageError> {
        let (parent, name) = path::parent_and_name(dir_path)?;
        let mut tree = self.tree.lock();

        let migrations = tree.rename_directory(&parent, &name, new_name)?;
        for (old_id, new_id) in &migrations {
            self.migrate_blob(old_id, new_id);
        }
        info!(
            from = dir_path,
            to = %path::join(&parent, new_name),
            files = migrations.len(),
            "Renamed directory"
        );
        Ok(migrations)
    }

    /// Write the namespace snapshot to `snapshot_path`.
    pub fn save<P: AsRef<Path>>(&self, snapshot_path: P) -> Result<(), StorageError> {
        let tree = self.tree.lock();
        save_snapshot(tree.root()?, snapshot_path)
    }

    /// Replace the namespace with the snapshot at `snapshot_path`.
    pub fn load<P: AsRef<Path>>(&self, snapshot_path: P) -> Result<(), StorageError> {
        let root = load_snapshot(snapshot_path)?;
        *self.tree.lock() = NamespaceTree::from_root(root);
        Ok(())
    }

    /// Copy of the current namespace tree.
    pub fn tree_snapshot(&self) -> NamespaceTree {
        self.tree.lock().clone()
    }

    fn remove_blob(&self, id: &FileId) {
        if let Err(e) = self.blobs.remove(id) {
            warn!(id = %id, error = %e, "Failed to remove blob");
        }
    }

    fn migrate_blob(&self, old_id: &FileId, new_id: &FileId) {
        match self.blobs.rename(old_id, new_id) {
            Ok(()) => debug!(from = %old_id, to = %new_id, "Migrated blob"),
            Err(StorageError::NotFound(_)) => {
                warn!(id = %old_id, "Blob missing during rename, skipping")
            }
            Err(e) => warn!(from = %old_id, to = %new_id, error = %e, "Failed to migrate blob"),
        }
    }
}

fn check_identity(
    file_path: &str,
    stored: &FileEntry,
    new_entry: &FileEntry,
) -> Result<(), StorageError> {
    if stored.id != new_entry.id
        || stored.name != new_entry.name
        || stored.virtual_path != new_entry.virtual_path
    {
        return Err(StorageError::IdentityMismatch {
            path: file_path.to_string(),
            expected: stored.id.clone(),
            actual: new_entry.id.clone(),
        });
    }
    Ok(())
}
