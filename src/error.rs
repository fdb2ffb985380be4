//! Error types for the checkout file service.

use thiserror::Error;

/// Namespace and blob storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Directory not empty: {0}")]
    NotEmpty(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Entry identity mismatch for {path}: expected id {expected}, got {actual}")]
    IdentityMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Lock coordinator errors
#[derive(Debug, Error)]
pub enum LockError {
    #[error("Lock denied on {key}: {reason}")]
    Denied { key: String, reason: String },

    #[error("Timed out waiting for lock on {0}")]
    Timeout(String),

    #[error("Session {session} does not hold lock on {key}")]
    NotHeld { key: String, session: String },

    #[error("Session {0} expired")]
    SessionExpired(String),

    #[error("Lock service unavailable: {0}")]
    Unavailable(String),
}

/// Wire protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Connection closed by peer")]
    UnexpectedEof,

    #[error("Transport I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Session and server level errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Lock error: {0}")]
    LockError(#[from] LockError),

    #[error("Protocol error: {0}")]
    ProtocolError(#[from] ProtocolError),

    #[error("Size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Server rejected request: {0}")]
    Remote(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
