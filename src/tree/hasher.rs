//! File identity derivation using BLAKE3
//!
//! A file's id is derived from where it lives, not from what it holds:
//! renaming or moving a file yields a new id and therefore a new blob name.
//! Every id in the crate comes from [`compute_file_id`].

use crate::types::FileId;
use blake3::Hasher;

/// Compute the FileId for a file
///
/// FileId = hex(blake3(name || virtual_path))
pub fn compute_file_id(name: &str, virtual_path: &str) -> FileId {
    let mut hasher = Hasher::new();
    hasher.update(name.as_bytes());
    hasher.update(virtual_path.as_bytes());
    hasher.finalize().to_hex().to_string()
}
