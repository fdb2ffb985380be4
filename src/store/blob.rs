//! Blob storage
//!
//! Stores raw file content on the host filesystem, one file per FileId:
//! `{root}/{file_id}`. Namespace metadata lives in the snapshot, never here.

use crate::error::StorageError;
use crate::types::FileId;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Id-addressed blob storage
#[derive(Debug)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Create a BlobStore rooted at `root`, creating the directory if needed.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to create blob directory at {:?}: {}", root, e),
            ))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write the blob for `id`, replacing any previous content.
    ///
    /// Uses atomic writes (write to .tmp, then rename). Returns the number of
    /// bytes written.
    pub fn write(&self, id: &FileId, bytes: &[u8]) -> Result<usize, StorageError> {
        let blob_path = self.blob_path(id);
        let temp_path = blob_path.with_extension("tmp");

        fs::write(&temp_path, bytes).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to write blob to {:?}: {}", temp_path, e),
            ))
        })?;

        fs::rename(&temp_path, &blob_path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            StorageError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to rename temp file to {:?}: {}", blob_path, e),
            ))
        })?;

        Ok(bytes.len())
    }

    /// Read the blob for `id`.
    ///
    /// A missing blob is `NotFound`.
    pub fn read(&self, id: &FileId) -> Result<Vec<u8>, StorageError> {
        let blob_path = self.blob_path(id);
        fs::read(&blob_path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(format!("blob {}", id)),
            kind => StorageError::IoError(std::io::Error::new(
                kind,
                format!("Failed to read blob from {:?}: {}", blob_path, e),
            )),
        })
    }

    pub fn remove(&self, id: &FileId) -> Result<(), StorageError> {
        let blob_path = self.blob_path(id);
        fs::remove_file(&blob_path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(format!("blob {}", id)),
            kind => StorageError::IoError(std::io::Error::new(
                kind,
                format!("Failed to remove blob {:?}: {}", blob_path, e),
            )),
        })
    }

    /// Move the blob stored under `old` to `new`.
    pub fn rename(&self, old: &FileId, new: &FileId) -> Result<(), StorageError> {
        let from = self.blob_path(old);
        let to = self.blob_path(new);
        fs::rename(&from, &to).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(format!("blob {}", old)),
            kind => StorageError::IoError(std::io::Error::new(
                kind,
                format!("Failed to rename blob {:?} to {:?}: {}", from, to, e),
            )),
        })
    }

    pub fn exists(&self, id: &FileId) -> bool {
        self.blob_path(id).exists()
    }

    fn blob_path(&self, id: &FileId) -> PathBuf {
        self.root.join(id)
    }
}
