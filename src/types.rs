//! Core types shared across the namespace, store, lock, and session layers.

/// FileId: lowercase hex of the BLAKE3 hash of a file's name and virtual path.
///
/// Also the name of the file's blob on disk.
pub type FileId = String;

/// SessionId: identity of one client session as seen by the lock coordinator.
pub type SessionId = String;

/// Generate a fresh session id.
///
/// Unique per process invocation and call; not a secret.
pub fn new_session_id() -> SessionId {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mut hasher = blake3::Hasher::new();
    hasher.update(&std::process::id().to_le_bytes());
    hasher.update(&nanos.to_le_bytes());
    hasher.update(&COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    let hex = hasher.finalize().to_hex();
    hex.as_str()[..16].to_string()
}
