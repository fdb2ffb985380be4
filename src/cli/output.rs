//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::ApiError;
use owo_colors::OwoColorize;

/// Map domain/service errors to a string for CLI output.
pub fn map_error(e: &ApiError) -> String {
    let category = match e {
        ApiError::ConfigError(_) => "configuration",
        ApiError::LockError(_) => "lock",
        ApiError::StorageError(_) => "storage",
        ApiError::ProtocolError(_) | ApiError::Remote(_) => "connection",
        ApiError::SizeMismatch { .. } | ApiError::InvalidState(_) => "session",
    };
    format!("{} {}", format!("[{}]", category).red().bold(), e)
}
