//! Virtual path parsing and normalization
//!
//! Virtual paths are absolute, `/`-separated, and never touch the host
//! filesystem. Repeated separators collapse, trailing separators are dropped,
//! and every segment is normalized to Unicode NFC so that visually identical
//! names map to one entry (and one file id).

use crate::error::StorageError;
use unicode_normalization::UnicodeNormalization;

/// Root of every namespace
pub const ROOT: &str = "/";

/// Split an absolute virtual path into normalized segments.
///
/// `"/"` yields an empty list. Relative paths and `.`/`..` segments are rejected.
pub fn split_path(path: &str) -> Result<Vec<String>, StorageError> {
    if !path.starts_with('/') {
        return Err(StorageError::InvalidPath(format!(
            "Path must be absolute: {}",
            path
        )));
    }

    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(validate_name)
        .collect()
}

/// Validate and normalize a single entry name.
pub fn validate_name(name: &str) -> Result<String, StorageError> {
    let normalized: String = name.nfc().collect();
    if normalized.is_empty() || normalized == "." || normalized == ".." {
        return Err(StorageError::InvalidPath(format!(
            "Invalid entry name: {:?}",
            name
        )));
    }
    if normalized.contains('/') {
        return Err(StorageError::InvalidPath(format!(
            "Entry name may not contain '/': {}",
            name
        )));
    }
    Ok(normalized)
}

/// Build the canonical string form from segments.
pub fn join_segments<S: AsRef<str>>(segments: &[S]) -> String {
    if segments.is_empty() {
        return ROOT.to_string();
    }
    let mut out = String::new();
    for segment in segments {
        out.push('/');
        out.push_str(segment.as_ref());
    }
    out
}

/// Join a (canonical) parent path and a child name.
pub fn join(parent: &str, name: &str) -> String {
    if parent == ROOT || parent.is_empty() {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent.trim_end_matches('/'), name)
    }
}

/// Normalize a virtual path to its canonical string form.
pub fn normalize_path(path: &str) -> Result<String, StorageError> {
    Ok(join_segments(&split_path(path)?))
}

/// Split a path into its canonical parent path and final segment.
///
/// Fails for the root, which has no parent.
pub fn parent_and_name(path: &str) -> Result<(String, String), StorageError> {
    let mut segments = split_path(path)?;
    let name = segments.pop().ok_or_else(|| {
        StorageError::InvalidPath("The root directory has no parent".to_string())
    })?;
    Ok((join_segments(&segments), name))
}
