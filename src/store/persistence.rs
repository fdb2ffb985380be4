//! Snapshot persistence for the namespace tree
//!
//! The snapshot is a single JSON document: the root directory entry with its
//! children nested inside, each entry tagged by `type`. Blob content is never
//! part of the snapshot.

use crate::error::StorageError;
use crate::store::FileSystemStore;
use crate::tree::node::{DirectoryEntry, Entry};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Serialize `root` and write it to `path` atomically.
///
/// Uses temporary file + rename so a crash mid-write leaves the previous
/// snapshot intact.
pub fn save_snapshot<P: AsRef<Path>>(root: &DirectoryEntry, path: P) -> Result<(), StorageError> {
    let path = path.as_ref();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to create parent directory {:?}: {}", parent, e),
            ))
        })?;
    }

    let document = Entry::Directory(root.clone());
    let serialized = serde_json::to_vec_pretty(&document)
        .map_err(|e| StorageError::Snapshot(format!("Failed to serialize snapshot: {}", e)))?;

    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, &serialized).map_err(|e| {
        StorageError::IoError(std::io::Error::new(
            e.kind(),
            format!("Failed to write snapshot to {:?}: {}", temp_path, e),
        ))
    })?;

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        StorageError::IoError(std::io::Error::new(
            e.kind(),
            format!("Failed to rename temp file to {:?}: {}", path, e),
        ))
    })?;

    Ok(())
}

/// Read the snapshot at `path` and return its root directory.
pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<DirectoryEntry, StorageError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            StorageError::NotFound(format!("snapshot {}", path.display()))
        }
        kind => StorageError::IoError(std::io::Error::new(
            kind,
            format!("Failed to read snapshot from {:?}: {}", path, e),
        )),
    })?;

    match serde_json::from_slice::<Entry>(&bytes) {
        Ok(Entry::Directory(root)) => Ok(root),
        Ok(Entry::File(_)) => Err(StorageError::Snapshot(format!(
            "Snapshot root in {:?} is a file",
            path
        ))),
        Err(e) => Err(StorageError::Snapshot(format!(
            "Failed to parse snapshot {:?}: {}",
            path, e
        ))),
    }
}

/// Periodically save `store` to `path` on a tokio task.
///
/// Failures are logged and the next tick tries again. Abort the returned
/// handle to stop persisting.
pub fn spawn_persister(
    store: Arc<FileSystemStore>,
    path: PathBuf,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick completes immediately; nothing has changed yet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let store = Arc::clone(&store);
            let target = path.clone();
            match tokio::task::spawn_blocking(move || store.save(&target)).await {
                Ok(Ok(())) => debug!(path = %path.display(), "Persisted snapshot"),
                Ok(Err(e)) => warn!(path = %path.display(), error = %e, "Periodic persist failed"),
                Err(e) => warn!(error = %e, "Persist task panicked"),
            }
        }
    })
}
